use thiserror::Error;

/// Errors raised while bringing an engine up against an endpoint.
///
/// Fatal to that engine instance; the caller decides whether to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("endpoint activation failed: {0}")]
    ActivationFailed(String),

    #[error("format unsupported: {0}")]
    FormatUnsupported(String),

    #[error("transport service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors raised by engine control operations and hardware transports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error("engine is not initialized")]
    NotInitialized,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("failed to spawn engine thread: {0}")]
    ThreadSpawn(String),
}
