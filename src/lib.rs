//! Barricade Server Library
//!
//! Collects barricade reports as map pins and pushes every change to
//! connected map clients.
//!
//! ## Architecture (5 Components)
//!
//! 1. WebAPI - REST endpoints and WebSocket gateway
//! 2. RealtimeHub - WebSocket event distribution
//! 3. Detector - Image decoding and barricade detection adapter
//! 4. Geocoder - Reverse geocoding adapter with sentinel fallback
//! 5. PinStore - In-memory ordered pin collection
//!
//! ## Request Flow
//!
//! request → detection (image submissions) → geocoding → store → broadcast → response

pub mod detector;
pub mod error;
pub mod geocoder;
pub mod models;
pub mod pin_store;
pub mod realtime_hub;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
