//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod feddit;
pub mod http;
pub mod telemetry;
