//! Shared models and types
//!
//! Types used by the store, the adapters and the web layer live here
//! to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// One localized object found in an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Category id from the model's label set
    pub class_id: i64,
    /// Score in [0, 1]
    pub confidence: f64,
    /// Pixel box: left, top, right, bottom
    pub bbox: [f64; 4],
}

/// A submitted or detected location record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    /// Empty for manually placed pins
    #[serde(default)]
    pub detection: Vec<Detection>,
}

impl Pin {
    /// Pin placed by hand, without image evidence
    pub fn manual(latitude: f64, longitude: f64, address: String) -> Self {
        Self {
            latitude,
            longitude,
            address,
            detection: Vec::new(),
        }
    }

    /// Exact coordinate match, no tolerance
    pub fn is_at(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }
}

/// Coordinate pair carried by removal events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Response for a created pin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinCreatedResponse {
    pub message: String,
    pub address: String,
    pub detection: Vec<Detection>,
}

/// Response when an image yielded nothing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoDetectionResponse {
    pub message: String,
    pub detection: Vec<Detection>,
}

/// Plain message response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub detector_connected: bool,
    pub pin_count: usize,
    pub realtime_clients: u64,
}
