//! Application services: query validation, the comment pipeline and its
//! upstream port.

pub mod error;
pub mod pipeline;
pub mod query;
pub mod upstream;
