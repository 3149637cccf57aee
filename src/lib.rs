//! Feddit comment service: fetches subfeddit comments, annotates them with
//! sentiment, and serves cached, sorted and filtered pages over HTTP.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
