use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Thing not found: {0:?}")]
    ThingNotFound(crate::core::types::ThingIndex),

    #[error("Thing pool exhausted")]
    ThingPoolExhausted,

    #[error("Invalid player slot: {0}")]
    InvalidPlayer(u8),

    #[error("Invalid level setup: {0}")]
    InvalidLevel(String),

    #[error("Unknown creature model: {0}")]
    UnknownModel(u16),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
