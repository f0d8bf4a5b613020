pub mod convention;
pub mod error;
