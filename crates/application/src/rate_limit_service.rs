//! Fixed-window rate limiting over an injected counter store.

mod config;
mod ports;
mod service;

pub use config::RateLimitRule;
pub use ports::{AttemptInfo, RateLimitRepository};
pub use service::RateLimitService;

#[cfg(test)]
mod tests;
