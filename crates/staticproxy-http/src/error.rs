//! Route construction errors.

use staticproxy_core::ConfigError;
use staticproxy_store::StoreError;

/// Failure to build the route table. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The rule itself is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The rule's backend could not be constructed.
    #[error("handler #{index}: cannot connect {backend} backend: {source}")]
    Connect {
        /// Position of the rule in the `handlers` sequence.
        index: usize,
        /// Backend kind.
        backend: &'static str,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

/// Result alias for route construction.
pub type RouteResult<T> = Result<T, RouteError>;
