use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NamingError {
    #[error("No archive product covers {0}")]
    UnsupportedTimestamp(String),

    #[error("Malformed snapshot filename '{filename}': {reason}")]
    MalformedFilename { filename: String, reason: String },
}
