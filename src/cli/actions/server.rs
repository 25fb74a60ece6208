use crate::{
    api::{self, StoreBackend, UserSession},
    cli::commands::session::Options,
    session::{
        CookieParams, MemoryStore, PgSessionStore, SessionAuth, SessionConfig, SessionStore,
        spawn_expiry_sweeper,
    },
};
use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub table: String,
    pub session: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the session settings are invalid, the database cannot be
/// reached, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let secret = match args.session.secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("No session secret configured; using a random one, sessions will not survive a restart");
            generate_secret()?
        }
    };
    let config = session_config(&args.session, secret);
    let ttl = Duration::from_secs(args.session.session_ttl_seconds);

    let (store, backend): (Arc<dyn SessionStore<UserSession>>, StoreBackend) =
        if let Some(dsn) = &args.dsn {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn)
                .await
                .context("Failed to connect to database")?;

            let store = PgSessionStore::new(pool)
                .with_table(args.table.as_str())?
                .with_ttl(ttl);
            store
                .ping()
                .await
                .context("Database is not answering")?;

            let shared: Arc<dyn SessionStore<UserSession>> = Arc::new(store.clone());
            (shared, StoreBackend::Postgres(store))
        } else {
            warn!("No DSN configured; sessions are kept in memory");
            let shared: Arc<dyn SessionStore<UserSession>> =
                Arc::new(MemoryStore::new().with_ttl(ttl));
            (shared, StoreBackend::Memory)
        };

    if args.session.sweep_interval_seconds > 0 {
        let interval = Duration::from_secs(args.session.sweep_interval_seconds);
        spawn_expiry_sweeper(Arc::clone(&store), interval);
        info!("Expired sessions are purged every {}s", interval.as_secs());
    }

    let auth = SessionAuth::new(config, store).context("Invalid session configuration")?;

    api::new(args.port, Arc::new(auth), backend).await
}

fn session_config(options: &Options, secret: SecretString) -> SessionConfig {
    let mut cookie = CookieParams::default()
        .with_secure(!options.insecure_cookie)
        .with_same_site(options.same_site);
    if let Some(max_age) = options.cookie_max_age {
        cookie = cookie.with_max_age(max_age);
    }
    if let Some(domain) = &options.cookie_domain {
        cookie = cookie.with_domain(domain.clone());
    }

    SessionConfig::new(secret)
        .with_cookie_name(options.cookie_name.clone())
        .with_namespace(options.namespace.clone())
        .with_auto_error(options.auto_error)
        .with_cookie_params(cookie)
}

fn generate_secret() -> Result<SecretString> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session secret")?;
    Ok(SecretString::from(Base64UrlUnpadded::encode_string(&bytes)))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "store",
            args.dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        ("table", args.table.clone()),
        ("cookie_name", args.session.cookie_name.clone()),
        ("namespace", args.session.namespace.clone()),
        ("secret_set", args.session.secret.is_some().to_string()),
        (
            "session_ttl_seconds",
            args.session.session_ttl_seconds.to_string(),
        ),
        ("secure_cookie", (!args.session.insecure_cookie).to_string()),
        ("same_site", args.session.same_site.to_string()),
        ("auto_error", args.session.auto_error.to_string()),
        (
            "sweep_interval_seconds",
            args.session.sweep_interval_seconds.to_string(),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "sessiongate {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
