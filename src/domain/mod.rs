//! Domain values: comments and their sentiment.

pub mod comments;
pub mod sentiment;
