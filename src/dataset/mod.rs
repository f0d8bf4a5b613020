pub mod assembler;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod precip_frame;
