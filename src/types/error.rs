use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid bounding box: {reason}")]
    InvalidBoundingBox { reason: String },

    #[error("Invalid timestamp {timestamp}: {reason}")]
    InvalidTimestamp { timestamp: String, reason: String },

    #[error("Could not interpret '{0}' as a UTC datetime")]
    DateParsing(String),
}
