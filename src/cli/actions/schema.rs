use crate::session::PgSessionStore;
use anyhow::{Context, Result};

/// Print the session table DDL to stdout.
/// # Errors
/// Returns an error if `table` is not a plain SQL identifier.
pub fn execute(table: &str) -> Result<()> {
    let script = PgSessionStore::schema_for(table).context("Failed to render session schema")?;
    print!("{script}");
    Ok(())
}
