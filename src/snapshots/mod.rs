pub mod artifact_store;
pub mod codec;
pub mod error;
pub mod retry;
pub mod snapshot;
pub mod transport;
pub mod validity;
