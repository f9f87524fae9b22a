use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("No ROM source for console: {0}")]
    ConsoleUnsupported(String),

    #[error("No match found for {0}")]
    NoMatch(String),

    #[error("Failed to download {filename}: {cause}")]
    DownloadFailed { filename: String, cause: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
