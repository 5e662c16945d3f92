use thiserror::Error;

pub type Result<T> = std::result::Result<T, TapeLibraryError>;

#[derive(Error, Debug)]
pub enum TapeLibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog access error: {0}")]
    Catalog(String),

    #[error("Tape command error: {0}")]
    TapeCommand(String),

    #[error("Parameter validation error: {0}")]
    ParameterValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl TapeLibraryError {
    pub fn catalog<T: Into<String>>(msg: T) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn tape_command<T: Into<String>>(msg: T) -> Self {
        Self::TapeCommand(msg.into())
    }

    pub fn parameter_validation<T: Into<String>>(msg: T) -> Self {
        Self::ParameterValidation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}
