use thiserror::Error;

/// Unified result type for the gadget canvas crate.
pub type Result<T> = std::result::Result<T, CanvasError>;

/// Errors surfaced by the canvas host.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("illegal state: {0}")]
    State(String),
    #[error("rpc method `{0}` is not registered")]
    UnknownRpcMethod(String),
    #[error("element `{0}` not found")]
    ElementNotFound(String),
    #[error("gadget instance `{0}` not found")]
    GadgetNotFound(String),
    #[error("circular dependency: `{file}` is among its own ancestors {ancestors:?}")]
    CircularDependency { file: String, ancestors: Vec<String> },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CanvasError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }
}
