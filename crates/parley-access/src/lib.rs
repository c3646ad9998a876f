//! Access control for the Parley conversation gateway.
//!
//! Authenticates callers under a startup-selected [`AuthMode`] (shared secret,
//! signed bearer token, or explicitly disabled) and scopes non-admin
//! principals to the conversations they own.

pub mod access_error;
pub mod auth_mode;
pub mod authorization_gate;
pub mod jwt;
pub mod operation;
pub mod principal;

pub use access_error::*;
pub use auth_mode::*;
pub use authorization_gate::*;
pub use jwt::*;
pub use operation::*;
pub use principal::*;
