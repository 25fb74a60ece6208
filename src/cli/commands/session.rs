use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};
use secrecy::SecretString;

use crate::session::{MAX_TTL, SameSite, config};

pub const ARG_SECRET: &str = "secret";
pub const ARG_COOKIE_NAME: &str = "cookie-name";
pub const ARG_NAMESPACE: &str = "namespace";
pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";
pub const ARG_COOKIE_MAX_AGE: &str = "cookie-max-age";
pub const ARG_SAME_SITE: &str = "same-site";
pub const ARG_COOKIE_DOMAIN: &str = "cookie-domain";
pub const ARG_INSECURE_COOKIE: &str = "insecure-cookie";
pub const ARG_AUTO_ERROR: &str = "auto-error";
pub const ARG_SWEEP_INTERVAL: &str = "sweep-interval-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: Option<SecretString>,
    pub cookie_name: String,
    pub namespace: String,
    pub session_ttl_seconds: u64,
    pub cookie_max_age: Option<u64>,
    pub same_site: SameSite,
    pub cookie_domain: Option<String>,
    pub insecure_cookie: bool,
    pub auto_error: bool,
    pub sweep_interval_seconds: u64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a value with a default is missing or the secret is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let secret = match matches.get_one::<String>(ARG_SECRET) {
            Some(secret) if secret.trim().is_empty() => {
                return Err(anyhow::anyhow!("--{ARG_SECRET} must not be blank"));
            }
            Some(secret) => Some(SecretString::from(secret.clone())),
            None => None,
        };

        Ok(Self {
            secret,
            cookie_name: read_required(ARG_COOKIE_NAME)?,
            namespace: read_required(ARG_NAMESPACE)?,
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL)
                .copied()
                .unwrap_or(43_200),
            cookie_max_age: matches.get_one::<u64>(ARG_COOKIE_MAX_AGE).copied(),
            same_site: matches
                .get_one::<SameSite>(ARG_SAME_SITE)
                .copied()
                .unwrap_or_default(),
            cookie_domain: matches.get_one::<String>(ARG_COOKIE_DOMAIN).cloned(),
            insecure_cookie: matches.get_flag(ARG_INSECURE_COOKIE),
            auto_error: matches.get_one::<bool>(ARG_AUTO_ERROR).copied().unwrap_or(true),
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL)
                .copied()
                .unwrap_or(0),
        })
    }
}

fn validator_same_site() -> ValueParser {
    ValueParser::from(|value: &str| value.parse::<SameSite>())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_cookie_args(command);
    with_lifetime_args(command)
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET)
                .long(ARG_SECRET)
                .help("HMAC secret for session cookies, at least 32 bytes")
                .long_help(
                    "HMAC secret for session cookies, at least 32 bytes. When omitted a random secret is generated and every restart logs all users out.",
                )
                .env("SESSIONGATE_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_COOKIE_NAME)
                .long(ARG_COOKIE_NAME)
                .help("Session cookie name")
                .env("SESSIONGATE_COOKIE_NAME")
                .default_value(config::DEFAULT_COOKIE_NAME),
        )
        .arg(
            Arg::new(ARG_NAMESPACE)
                .long(ARG_NAMESPACE)
                .help("Signature namespace; cookies signed for another namespace are rejected")
                .env("SESSIONGATE_NAMESPACE")
                .default_value(config::DEFAULT_NAMESPACE),
        )
        .arg(
            Arg::new(ARG_COOKIE_MAX_AGE)
                .long(ARG_COOKIE_MAX_AGE)
                .help("Cookie Max-Age in seconds (default: browser session)")
                .env("SESSIONGATE_COOKIE_MAX_AGE")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SAME_SITE)
                .long(ARG_SAME_SITE)
                .help("Cookie SameSite attribute: strict, lax or none")
                .env("SESSIONGATE_SAME_SITE")
                .default_value("lax")
                .value_parser(validator_same_site()),
        )
        .arg(
            Arg::new(ARG_COOKIE_DOMAIN)
                .long(ARG_COOKIE_DOMAIN)
                .help("Cookie Domain attribute")
                .env("SESSIONGATE_COOKIE_DOMAIN"),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIE)
                .long(ARG_INSECURE_COOKIE)
                .help("Omit the Secure attribute, for plain HTTP development setups")
                .env("SESSIONGATE_INSECURE_COOKIE")
                .action(ArgAction::SetTrue),
        )
}

fn with_lifetime_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Server-side session lifetime in seconds, 1 to 31622400 (366 days)")
                .env("SESSIONGATE_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_TTL.as_secs())),
        )
        .arg(
            Arg::new(ARG_AUTO_ERROR)
                .long(ARG_AUTO_ERROR)
                .help("Answer 401 for requests without a valid session (false: treat as anonymous)")
                .env("SESSIONGATE_AUTO_ERROR")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL)
                .long(ARG_SWEEP_INTERVAL)
                .help("Purge expired sessions every N seconds (0 disables the sweeper)")
                .env("SESSIONGATE_SWEEP_INTERVAL_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64)),
        )
}
