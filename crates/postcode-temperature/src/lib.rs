//! Current temperature by German postal code, cached in front of Meteomatics
//!
//! Lookups are served cache-aside: a Redis hash per postal code holds the last
//! upstream outcome for a fixed TTL, and only misses reach the rate-limited,
//! token-authenticated Meteomatics API.

pub mod codec;
pub mod config;
pub mod error;
pub mod lookup;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{Result, ServiceError};
pub use lookup::LookupOrchestrator;
