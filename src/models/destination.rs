use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Where outbound notifications go: the conversation observed on the most
/// recent inbound turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub conversation_id: String,
    pub channel_id: String,
    pub service_url: String,
}

/// Single-slot, last-writer-wins store for the current destination. Written
/// by the inbound-turn handler, read by the dispatcher; the two run on
/// separate tasks, so the slot sits behind a lock and values are cloned out.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    current: RwLock<Option<Destination>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, destination: Destination) {
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(destination);
    }

    /// `None` until the first inbound conversational turn has been observed.
    pub fn get(&self) -> Option<Destination> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
