use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_INVITE_SECRET: &str = "invite-secret";
pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";
pub const ARG_INVITE_TTL_SECONDS: &str = "invite-ttl-seconds";
pub const ARG_BOOTSTRAP_TTL_SECONDS: &str = "bootstrap-ttl-seconds";

#[derive(Debug, Clone)]
pub struct OutboxOptions {
    pub poll_seconds: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

#[derive(Clone)]
pub struct Options {
    pub session_secret: SecretString,
    pub invite_secret: SecretString,
    pub base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub invite_ttl_seconds: i64,
    pub bootstrap_ttl_seconds: i64,
    pub outbox: OutboxOptions,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required secret is missing or empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Secrets have no compiled-in fallback; an empty value from an env
        // var set to "" is treated the same as unset.
        let secret = |id: &str| -> anyhow::Result<SecretString> {
            match matches.get_one::<String>(id) {
                Some(value) if !value.trim().is_empty() => {
                    Ok(SecretString::from(value.trim().to_string()))
                }
                _ => anyhow::bail!("missing required argument: --{id}"),
            }
        };

        let ttl = |id: &str, default: i64| {
            matches.get_one::<i64>(id).copied().unwrap_or(default)
        };

        Ok(Self {
            session_secret: secret(ARG_SESSION_SECRET)?,
            invite_secret: secret(ARG_INVITE_SECRET)?,
            base_url: matches
                .get_one::<String>(ARG_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            access_ttl_seconds: ttl(ARG_ACCESS_TTL_SECONDS, 900),
            refresh_ttl_seconds: ttl(ARG_REFRESH_TTL_SECONDS, 30 * 24 * 60 * 60),
            invite_ttl_seconds: ttl(ARG_INVITE_TTL_SECONDS, 7 * 24 * 60 * 60),
            bootstrap_ttl_seconds: ttl(ARG_BOOTSTRAP_TTL_SECONDS, 900),
            outbox: OutboxOptions {
                poll_seconds: matches
                    .get_one::<u64>("email-outbox-poll-seconds")
                    .copied()
                    .unwrap_or(5),
                batch_size: matches
                    .get_one::<usize>("email-outbox-batch-size")
                    .copied()
                    .unwrap_or(10),
                max_attempts: matches
                    .get_one::<u32>("email-outbox-max-attempts")
                    .copied()
                    .unwrap_or(5),
                backoff_base_seconds: matches
                    .get_one::<u64>("email-outbox-backoff-base-seconds")
                    .copied()
                    .unwrap_or(5),
                backoff_max_seconds: matches
                    .get_one::<u64>("email-outbox-backoff-max-seconds")
                    .copied()
                    .unwrap_or(300),
            },
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_secret_args(command);
    let command = with_ttl_args(command);
    with_outbox_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Signing secret for access tokens")
                .long_help(
                    "Signing secret for access tokens (HS256). Required; the server refuses to start without it. Independent from the invite secret so compromise of one does not compromise the other.",
                )
                .env("ENIREJO_SESSION_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_INVITE_SECRET)
                .long(ARG_INVITE_SECRET)
                .help("Signing secret for invitation capability tokens")
                .env("ENIREJO_INVITE_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL used for invite and bootstrap links")
                .long_help(
                    "Public base URL used for invite and bootstrap links. Cookies are marked Secure when this is an https URL.",
                )
                .env("ENIREJO_BASE_URL")
                .default_value("http://localhost:8080"),
        )
}

fn with_ttl_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long(ARG_ACCESS_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("ENIREJO_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long(ARG_REFRESH_TTL_SECONDS)
                .help("Refresh token lifetime in seconds")
                .env("ENIREJO_REFRESH_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_INVITE_TTL_SECONDS)
                .long(ARG_INVITE_TTL_SECONDS)
                .help("Invitation token lifetime in seconds")
                .env("ENIREJO_INVITE_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_TTL_SECONDS)
                .long(ARG_BOOTSTRAP_TTL_SECONDS)
                .help("Single-use bootstrap token lifetime in seconds")
                .env("ENIREJO_BOOTSTRAP_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_outbox_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email-outbox-poll-seconds")
                .long("email-outbox-poll-seconds")
                .help("Email outbox poll interval in seconds")
                .env("ENIREJO_EMAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-batch-size")
                .long("email-outbox-batch-size")
                .help("Email outbox batch size per poll")
                .env("ENIREJO_EMAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("email-outbox-max-attempts")
                .long("email-outbox-max-attempts")
                .help("Max attempts before marking an email as failed")
                .env("ENIREJO_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("email-outbox-backoff-base-seconds")
                .long("email-outbox-backoff-base-seconds")
                .help("Base delay for email outbox retry backoff")
                .env("ENIREJO_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-backoff-max-seconds")
                .long("email-outbox-backoff-max-seconds")
                .help("Max delay for email outbox retry backoff")
                .env("ENIREJO_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
