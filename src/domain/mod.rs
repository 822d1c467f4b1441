//! Domain vocabulary shared by the cache core and the HTTP surface.

pub mod types;
