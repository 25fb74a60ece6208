//! Turns validated CLI matches into an [`Action`].

use crate::cli::{
    actions::{Action, server::Args},
    commands::{self, session},
};
use anyhow::{Context, Result};
use url::Url;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(schema) = matches.subcommand_matches(commands::CMD_SCHEMA) {
        return Ok(Action::Schema {
            table: read_table(schema)?,
        });
    }

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);

    let dsn = matches.get_one::<String>(commands::ARG_DSN).cloned();
    if let Some(dsn) = &dsn {
        Url::parse(dsn).context("invalid SESSIONGATE_DSN")?;
    }

    let session = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        table: read_table(matches)?,
        session,
    }))
}

fn read_table(matches: &clap::ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(commands::ARG_TABLE)
        .cloned()
        .context("missing required argument: --table")
}
