//! CLI errors.

use dhlab_core::{ExchangeError, LifecycleError};
use dhlab_crypto::CryptoError;
use thiserror::Error;

/// Errors surfaced by a subcommand.
#[derive(Error, Debug)]
pub enum CliError {
    /// Parameter, key or exchange failure
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Lifecycle manager failure
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Provider or hybrid demo failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// JSON rendering failed
    #[error("json output: {0}")]
    Json(#[from] serde_json::Error),

    /// Text rendering failed
    #[error("text output: {0}")]
    Format(#[from] std::fmt::Error),
}
