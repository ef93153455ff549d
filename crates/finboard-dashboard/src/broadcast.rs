//! Push channel to connected WebSocket clients.

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::types::DashboardMessage;

/// Buffer for slow clients before they start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Serializes dashboard messages once and fans them out.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, msg: &DashboardMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => match self.tx.send(json) {
                Ok(n) => trace!(receivers = n, "Broadcast sent"),
                // No clients connected
                Err(_) => trace!("No WebSocket receivers connected"),
            },
            Err(e) => debug!(error = %e, "Failed to serialize dashboard message"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
