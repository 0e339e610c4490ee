//! Application state
//!
//! Holds all shared components and state

use crate::detector::{DetectionAdapter, Detector, RemoteDetector};
use crate::error::Result;
use crate::geocoder::{GeocodingAdapter, NominatimGeocoder, ReverseGeocoder};
use crate::pin_store::PinStore;
use crate::realtime_hub::RealtimeHub;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Inference server URL
    pub detector_url: String,
    /// Weights artifact the inference server should use
    pub detector_model: String,
    /// Per-inference deadline
    pub detector_timeout: Duration,
    /// Concurrent inferences allowed
    pub inference_workers: usize,
    /// Nominatim-compatible base URL
    pub geocoder_url: String,
    /// User-Agent sent to the geocoder
    pub geocoder_user_agent: String,
    /// Per-lookup deadline
    pub geocoder_timeout: Duration,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 5001),
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            detector_model: std::env::var("DETECTOR_MODEL")
                .unwrap_or_else(|_| "best.pt".to_string()),
            detector_timeout: Duration::from_secs(env_or("DETECTOR_TIMEOUT_SECS", 30)),
            inference_workers: env_or("INFERENCE_WORKERS", 2),
            geocoder_url: std::env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            geocoder_user_agent: std::env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| "barricade-detector".to_string()),
            geocoder_timeout: Duration::from_secs(env_or("GEOCODER_TIMEOUT_SECS", 10)),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// PinStore (in-memory pins)
    pub pins: Arc<PinStore>,
    /// RealtimeHub (WebSocket)
    pub realtime: Arc<RealtimeHub>,
    /// Detection adapter
    pub detection: Arc<DetectionAdapter>,
    /// Geocoding adapter
    pub geocoding: Arc<GeocodingAdapter>,
    /// Server start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the state around the given model and geocoding provider
    pub fn with_providers(
        config: AppConfig,
        detector: Arc<dyn Detector>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        let realtime = Arc::new(RealtimeHub::new());
        let pins = Arc::new(PinStore::new(realtime.clone()));
        let detection = Arc::new(DetectionAdapter::new(
            detector,
            config.inference_workers,
            config.detector_timeout,
        ));
        let geocoding = Arc::new(GeocodingAdapter::new(geocoder, config.geocoder_timeout));

        Self {
            config,
            pins,
            realtime,
            detection,
            geocoding,
            started_at: Utc::now(),
        }
    }

    /// Build the production state: remote inference server and Nominatim
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let detector = RemoteDetector::with_timeout(
            config.detector_url.clone(),
            config.detector_model.clone(),
            config.detector_timeout,
        )?;
        tracing::debug!(
            url = detector.base_url(),
            model = detector.model(),
            "Remote detector configured"
        );
        let geocoder = NominatimGeocoder::new(
            config.geocoder_url.clone(),
            &config.geocoder_user_agent,
            config.geocoder_timeout,
        )?;

        Ok(Self::with_providers(
            config,
            Arc::new(detector),
            Arc::new(geocoder),
        ))
    }

    /// Seconds since start, for `/healthz`
    pub fn uptime_sec(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
