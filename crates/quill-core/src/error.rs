use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuillError {
    /// Short, stable error code for log aggregation.
    pub fn code(&self) -> &'static str {
        match self {
            QuillError::Config(_) => "CONFIG_ERROR",
            QuillError::InvalidValue { .. } => "INVALID_VALUE",
            QuillError::Serialization(_) => "SERIALIZATION_ERROR",
            QuillError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuillError>;
