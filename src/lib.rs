//! Varco: a caching backend-for-frontend in front of a remote domain API.
//!
//! Reads flow through a scoped, TTL-bounded fetch-through cache; writes
//! forward upstream and invalidate synchronously; an SSE subscription to the
//! upstream evicts proactively and re-broadcasts changes to browsers.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
