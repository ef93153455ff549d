//! HTTP fetcher for widget APIs.
//!
//! - `ResponseCache`: URL-keyed payload cache with per-entry TTL
//! - `RateLimiter`: fixed-window admission control per URL
//! - `ApiClient`: one GET through cache and limiter, with errors normalized
//!   into `FeedError`

pub mod cache;
pub mod client;
pub mod rate_limiter;

pub use cache::{cache_key, ResponseCache};
pub use client::{ApiClient, ApiClientConfig};
pub use rate_limiter::RateLimiter;
