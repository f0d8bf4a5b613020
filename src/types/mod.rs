pub mod any_datetime;
pub mod artifact;
pub mod bounding_box;
pub mod error;
pub mod grid;
pub mod missing_snapshots;
pub mod time_range;
pub mod year;
