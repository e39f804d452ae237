//! Core configuration types for staticproxy.
//!
//! This crate owns everything that is decided before the first request is
//! served:
//!
//! - **Rules** ([`rules`]): the on-disk routing table schema, the shallow
//!   defaults merge, and per-rule validation.
//! - **Backends** ([`backend`]): which object store a rule is bound to.
//! - **Process configuration** ([`config`]): listener, environment, timeouts,
//!   and cache settings loaded from environment variables.

pub mod backend;
pub mod config;
pub mod error;
pub mod rules;

pub use backend::BackendSpec;
pub use config::{Environment, GatewayConfig, RejectedValue};
pub use error::{ConfigError, ConfigResult};
pub use rules::{ConfigRoot, HandlerRule, RuleOptions};
