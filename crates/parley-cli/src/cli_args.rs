use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use parley_gateway::DEFAULT_REQUEST_TIMEOUT_MS;

use crate::CliTrackerStore;

const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30_000;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_jwt_method(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    match trimmed {
        "HS256" | "HS384" | "HS512" | "EdDSA" => Ok(trimmed.to_string()),
        other => Err(format!(
            "unsupported jwt method '{other}' (expected HS256, HS384, HS512, or EdDSA)"
        )),
    }
}

fn parse_log_level(value: &str) -> Result<LevelFilter, String> {
    value
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| {
            format!("unknown log level '{value}' (expected off, error, warn, info, debug, or trace)")
        })
}

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Access-controlled HTTP gateway for conversation trackers and bulk dispatch",
    version
)]
/// Public struct `Cli` used across Parley components.
pub struct Cli {
    #[arg(
        long,
        env = "PARLEY_BIND",
        default_value = "127.0.0.1:5005",
        help = "Socket address the gateway listens on (host:port)"
    )]
    pub bind: String,

    #[arg(
        long = "auth-token",
        env = "PARLEY_AUTH_TOKEN",
        hide_env_values = true,
        help = "Shared secret accepted via the ?token= query parameter"
    )]
    pub auth_token: Option<String>,

    #[arg(
        long = "jwt-secret",
        env = "PARLEY_JWT_SECRET",
        hide_env_values = true,
        help = "JWT verification key: HMAC secret, or base64 Ed25519 public key for EdDSA"
    )]
    pub jwt_secret: Option<String>,

    #[arg(
        long = "jwt-method",
        env = "PARLEY_JWT_METHOD",
        default_value = "HS256",
        value_parser = parse_jwt_method,
        help = "JWT signing algorithm: HS256, HS384, HS512, or EdDSA"
    )]
    pub jwt_method: String,

    #[arg(
        long = "cors-origins",
        env = "PARLEY_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*",
        help = "Comma separated list of allowed CORS origins; '*' allows any"
    )]
    pub cors_origins: Vec<String>,

    #[arg(
        long = "tracker-store",
        env = "PARLEY_TRACKER_STORE",
        value_enum,
        default_value_t = CliTrackerStore::Memory,
        help = "Conversation tracker backend: memory or file"
    )]
    pub tracker_store: CliTrackerStore,

    #[arg(
        long = "state-dir",
        env = "PARLEY_STATE_DIR",
        default_value = ".parley/trackers",
        help = "Directory holding tracker records when --tracker-store=file"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "channels-file",
        env = "PARLEY_CHANNELS_FILE",
        help = "TOML file listing registered input channels"
    )]
    pub channels_file: Option<PathBuf>,

    #[arg(
        long = "agent-url",
        env = "PARLEY_AGENT_URL",
        help = "Base URL of the upstream dialogue runtime; omit to start without an agent"
    )]
    pub agent_url: Option<String>,

    #[arg(
        long = "agent-fingerprint",
        env = "PARLEY_AGENT_FINGERPRINT",
        requires = "agent_url",
        help = "Fingerprint reported for the agent loaded at startup"
    )]
    pub agent_fingerprint: Option<String>,

    #[arg(
        long = "agent-timeout-ms",
        env = "PARLEY_AGENT_TIMEOUT_MS",
        default_value_t = DEFAULT_AGENT_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for calls to the dialogue runtime"
    )]
    pub agent_timeout_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "PARLEY_REQUEST_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        help = "Deadline for each gateway request; 0 disables it"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "log-level",
        env = "PARLEY_LOG",
        default_value = "info",
        value_parser = parse_log_level,
        help = "Default log level when RUST_LOG is unset; access denials always log at warn"
    )]
    pub log_level: LevelFilter,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use tracing::level_filters::LevelFilter;

    use super::{parse_jwt_method, parse_log_level, parse_positive_u64, Cli};
    use crate::CliTrackerStore;

    #[test]
    fn unit_cli_defaults_start_open_in_memory_gateway() {
        let cli = Cli::try_parse_from(["parley"]).expect("parse defaults");
        assert_eq!(cli.bind, "127.0.0.1:5005");
        assert_eq!(cli.jwt_method, "HS256");
        assert_eq!(cli.cors_origins, vec!["*".to_string()]);
        assert_eq!(cli.tracker_store, CliTrackerStore::Memory);
        assert_eq!(cli.request_timeout_ms, 3_600_000);
        assert!(cli.agent_url.is_none());
        assert_eq!(cli.log_level, LevelFilter::INFO);
    }

    #[test]
    fn functional_cli_splits_cors_origins_and_reads_store_mode() {
        let cli = Cli::try_parse_from([
            "parley",
            "--cors-origins",
            "https://a.example,https://b.example",
            "--tracker-store",
            "file",
            "--state-dir",
            "/tmp/parley",
            "--agent-url",
            "http://127.0.0.1:5055",
            "--agent-fingerprint",
            "model-7",
        ])
        .expect("parse flags");
        assert_eq!(
            cli.cors_origins,
            vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ]
        );
        assert_eq!(cli.tracker_store.as_str(), "file");
        assert_eq!(cli.agent_fingerprint.as_deref(), Some("model-7"));
    }

    #[test]
    fn regression_cli_rejects_fingerprint_without_agent_url() {
        let error = Cli::try_parse_from(["parley", "--agent-fingerprint", "model-7"])
            .expect_err("fingerprint requires agent url");
        assert!(error.to_string().contains("--agent-url"));
    }

    #[test]
    fn unit_value_parsers_reject_invalid_inputs() {
        assert_eq!(parse_positive_u64("15"), Ok(15));
        assert!(parse_positive_u64("0").is_err());
        assert_eq!(parse_jwt_method(" HS512 "), Ok("HS512".to_string()));
        assert!(parse_jwt_method("RS256").is_err());
        assert_eq!(parse_log_level(" debug "), Ok(LevelFilter::DEBUG));
        assert_eq!(parse_log_level("OFF"), Ok(LevelFilter::OFF));
        assert!(parse_log_level("loud").is_err());
    }
}
