//! CLI argument models and startup wiring for the Parley gateway binary.
//!
//! Turns flags and `PARLEY_*` environment variables into a ready
//! [`parley_gateway::GatewayServerConfig`].

pub mod cli_args;
pub mod cli_types;
pub mod gateway_logging;
pub mod gateway_startup;

pub use cli_args::Cli;
pub use cli_types::*;
pub use gateway_logging::*;
pub use gateway_startup::*;
