//! Realtime subscription layer.
//!
//! Keeps exactly one live feed per widget id:
//! - Poll feeds fetch immediately, then on a fixed interval
//! - Stream feeds hold one reconnecting socket, re-subscribed after the
//!   client gives up
//! - Manual refresh runs one out-of-band fetch
//! - Unsubscribe cancels timers, in-flight fetches and sockets

mod feed;
pub mod manager;
pub mod source;

pub use manager::{RealtimeConfig, SubscriptionManager, UpdateCallback};
pub use source::FeedSource;
