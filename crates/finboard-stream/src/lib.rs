//! Reconnecting WebSocket stream client for widget feeds.
//!
//! Provides one outbound stream connection per widget with:
//! - Automatic reconnection at a fixed interval with a bounded attempt budget
//! - A closed event set (`Opened`, `Message`, `Error`, `Closed`) behind one handler
//! - Lenient payload handling (non-JSON text is delivered raw)
//! - Manual disconnect that permanently suppresses reconnects

pub mod connection;
pub mod error;
pub mod event;

pub use connection::{StreamClient, StreamConfig, StreamState};
pub use error::{StreamError, StreamResult};
pub use event::{EventHandler, StreamEvent, StreamPayload};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
