//! Geocoder - Reverse Geocoding Adapter
//!
//! ## Responsibilities
//!
//! - Turn a coordinate pair into a human-readable address (English)
//! - Absorb every provider failure into [`UNKNOWN_ADDRESS`]

mod nominatim;

pub use nominatim::NominatimGeocoder;

use crate::error::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Address used when resolution fails
pub const UNKNOWN_ADDRESS: &str = "Unknown Address";

/// Reverse geocoding provider
pub trait ReverseGeocoder: Send + Sync {
    /// Formatted address for the point, `None` when the provider has no result
    fn reverse(&self, latitude: f64, longitude: f64) -> BoxFuture<'_, Result<Option<String>>>;
}

/// Geocoding adapter instance
pub struct GeocodingAdapter {
    provider: Arc<dyn ReverseGeocoder>,
    timeout: Duration,
}

impl GeocodingAdapter {
    /// Create new adapter
    pub fn new(provider: Arc<dyn ReverseGeocoder>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Resolve an address, never failing
    pub async fn resolve(&self, latitude: f64, longitude: f64) -> String {
        match timeout(self.timeout, self.provider.reverse(latitude, longitude)).await {
            Ok(Ok(Some(address))) => {
                tracing::debug!(latitude, longitude, address = %address, "Address resolved");
                address
            }
            Ok(Ok(None)) => {
                tracing::warn!(latitude, longitude, "Geocoding returned no result");
                UNKNOWN_ADDRESS.to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!(latitude, longitude, error = %e, "Geocoding error");
                UNKNOWN_ADDRESS.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    latitude,
                    longitude,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Geocoding timeout"
                );
                UNKNOWN_ADDRESS.to_string()
            }
        }
    }
}
