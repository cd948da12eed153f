//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the process. `main`
//! reports it through `anyhow`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tycoon_core::config::ConfigError,
    },

    /// The progress store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: tycoon_store::StoreError,
    },

    /// The tick loop stopped on an unrecoverable error.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: tycoon_core::RunnerError,
    },

    /// The status API could not be started.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: tycoon_observer::ServerError,
    },

    /// The HTTP bridge client could not be built.
    #[error("bridge error: {message}")]
    Bridge {
        /// Description of the failure.
        message: String,
    },

    /// One-shot provisioning failed.
    #[error("provisioning failed: {message}")]
    Provision {
        /// Description of the failure.
        message: String,
    },
}
