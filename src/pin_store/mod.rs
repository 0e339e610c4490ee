//! PinStore - In-memory Pin Collection
//!
//! ## Responsibilities
//!
//! - Hold pins in insertion order for the life of the process
//! - Append, read all, clear, remove by exact coordinates
//! - Emit the matching realtime event for every mutation
//!
//! ## Design
//!
//! - Single writer: mutations take the write lock
//! - The broadcast happens before the write lock is released, so events
//!   reach the hub in the same order as the mutations

use crate::models::{Coordinates, Pin};
use crate::realtime_hub::{HubMessage, RealtimeHub};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered pin list
#[derive(Debug, Default)]
struct PinList {
    pins: Vec<Pin>,
}

impl PinList {
    fn push(&mut self, pin: Pin) {
        self.pins.push(pin);
    }

    fn clear(&mut self) -> usize {
        let removed = self.pins.len();
        self.pins.clear();
        removed
    }

    fn remove_matching(&mut self, latitude: f64, longitude: f64) -> usize {
        let before = self.pins.len();
        self.pins.retain(|pin| !pin.is_at(latitude, longitude));
        before - self.pins.len()
    }
}

/// PinStore instance
pub struct PinStore {
    list: RwLock<PinList>,
    realtime: Arc<RealtimeHub>,
}

impl PinStore {
    /// Create new PinStore publishing to the given hub
    pub fn new(realtime: Arc<RealtimeHub>) -> Self {
        Self {
            list: RwLock::new(PinList::default()),
            realtime,
        }
    }

    /// Append a pin and announce it
    pub async fn append(&self, pin: Pin) {
        let mut list = self.list.write().await;
        list.push(pin.clone());
        tracing::debug!(
            latitude = pin.latitude,
            longitude = pin.longitude,
            total = list.pins.len(),
            "Pin appended"
        );
        self.realtime.broadcast(HubMessage::NewBarricade(pin)).await;
    }

    /// All pins in insertion order
    pub async fn all(&self) -> Vec<Pin> {
        self.list.read().await.pins.clone()
    }

    /// Remove every pin and announce the clear
    pub async fn clear(&self) -> usize {
        let mut list = self.list.write().await;
        let removed = list.clear();
        tracing::debug!(removed, "Pins cleared");
        self.realtime.broadcast(HubMessage::ClearBarricades).await;
        removed
    }

    /// Remove all pins at exactly (latitude, longitude)
    ///
    /// The removal event is sent even when nothing matched.
    pub async fn remove_matching(&self, latitude: f64, longitude: f64) -> usize {
        let mut list = self.list.write().await;
        let removed = list.remove_matching(latitude, longitude);
        tracing::debug!(latitude, longitude, removed, "Pins removed by coordinates");
        self.realtime
            .broadcast(HubMessage::RemoveBarricade(Coordinates {
                latitude,
                longitude,
            }))
            .await;
        removed
    }

    /// Number of stored pins
    pub async fn len(&self) -> usize {
        self.list.read().await.pins.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
