use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasslineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Venue scope mismatch: token is for {token_venue}, requested {requested}")]
    VenueMismatch {
        token_venue: String,
        requested: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Illegal status transition: {from} → {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PasslineError {
    /// Short error code string surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            PasslineError::Config(_) => "CONFIG_ERROR",
            PasslineError::AuthFailed(_) => "AUTH_FAILED",
            PasslineError::VenueMismatch { .. } => "VENUE_MISMATCH",
            PasslineError::Protocol(_) => "PROTOCOL_ERROR",
            PasslineError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            PasslineError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            PasslineError::Serialization(_) => "SERIALIZATION_ERROR",
            PasslineError::Io(_) => "IO_ERROR",
            PasslineError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            PasslineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PasslineError>;
