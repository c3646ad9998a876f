//! Process-wide log subscriber for the gateway binary.
use anyhow::{anyhow, Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Target the access gate writes denial records to.
pub const AUDIT_LOG_TARGET: &str = "parley::audit";

/// Builds the event filter. Explicit `RUST_LOG` directives win; otherwise
/// every target logs at `default_level` and gate denials stay visible at
/// warn even when the default is quieter.
pub fn gateway_log_filter(
    default_level: LevelFilter,
    rust_log: Option<&str>,
) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.map(str::trim).filter(|raw| !raw.is_empty()) {
        return EnvFilter::builder()
            .parse(directives)
            .with_context(|| format!("invalid RUST_LOG directives '{directives}'"));
    }
    let audit_level = default_level.max(LevelFilter::WARN);
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse(format!("{AUDIT_LOG_TARGET}={audit_level}"))
        .context("failed to build default log filter")
}

pub fn init_gateway_logging(default_level: LevelFilter) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = gateway_log_filter(default_level, rust_log.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}
