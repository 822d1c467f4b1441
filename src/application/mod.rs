//! Application-level concerns shared across the HTTP surface.

pub mod error;
pub mod locale;
