//! S3 API handlers.

pub mod bucket;
pub mod object;
