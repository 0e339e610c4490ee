//! Nominatim reverse geocoding client

use super::ReverseGeocoder;
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

/// Nominatim `/reverse` client
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Create new client. Nominatim's usage policy requires an identifying User-Agent.
    pub fn new(base_url: String, user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| Error::Config(format!("Invalid geocoder user agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Option<String>> {
        let url = format!("{}/reverse", self.base_url);
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let params = [
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("format", "jsonv2"),
            ("accept-language", "en"),
        ];

        let resp = self.client.get(&url).query(&params).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Internal(format!(
                "Nominatim reverse failed: {}",
                resp.status()
            )));
        }

        let json: Value = resp.json().await?;
        Ok(json_to_address(&json))
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(self.lookup(latitude, longitude))
    }
}

/// `display_name` of a reverse response; `None` for error bodies
fn json_to_address(json: &Value) -> Option<String> {
    if json.get("error").is_some() {
        return None;
    }
    json.get("display_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_address_valid() {
        let json_response = r#"
{
  "place_id": 240109189,
  "licence": "Data © OpenStreetMap contributors, ODbL 1.0. http://osm.org/copyright",
  "osm_type": "way",
  "osm_id": 280940520,
  "lat": "-34.4391708",
  "lon": "-58.7064573",
  "category": "highway",
  "type": "motorway",
  "place_rank": 26,
  "addresstype": "road",
  "name": "Autopista Pedro Eugenio Aramburu",
  "display_name": "Autopista Pedro Eugenio Aramburu, El Triángulo, Partido de Malvinas Argentinas, Buenos Aires, B1619AGS, Argentina",
  "boundingbox": ["-34.4400353", "-34.4382827", "-58.7141295", "-58.6998924"]
}
"#;
        let json: Value = serde_json::from_str(json_response).unwrap();
        assert_eq!(
            json_to_address(&json).as_deref(),
            Some("Autopista Pedro Eugenio Aramburu, El Triángulo, Partido de Malvinas Argentinas, Buenos Aires, B1619AGS, Argentina")
        );
    }

    #[test]
    fn json_to_address_unable_to_geocode() {
        let json: Value = serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert_eq!(json_to_address(&json), None);
    }

    #[test]
    fn json_to_address_missing_or_blank() {
        let json: Value = serde_json::from_str(r#"{"place_id": 1}"#).unwrap();
        assert_eq!(json_to_address(&json), None);

        let json: Value = serde_json::from_str(r#"{"display_name": "  "}"#).unwrap();
        assert_eq!(json_to_address(&json), None);
    }

    #[test]
    fn new_rejects_bad_user_agent() {
        let result = NominatimGeocoder::new(
            "https://nominatim.openstreetmap.org".to_string(),
            "bad\nagent",
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
