//! RemoteDetector - Inference Server Client
//!
//! The model weights are loaded once by the inference server at its start;
//! this side only ships images and reads back boxes.

use super::{DetectionParams, Detector};
use crate::error::{Error, Result};
use crate::models::Detection;
use futures::future::BoxFuture;
use image::{ImageFormat, RgbImage};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;

/// Response of `POST /v1/detect`
#[derive(Debug, Clone, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// HTTP client for the inference server
pub struct RemoteDetector {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl RemoteDetector {
    /// Create new client with custom timeout
    pub fn with_timeout(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Send one image for inference
    pub async fn predict(&self, image: RgbImage, params: DetectionParams) -> Result<Vec<Detection>> {
        let url = format!("{}/v1/detect", self.base_url);

        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| Error::Internal(format!("Encode task failed: {}", e)))??;

        let form = Form::new()
            .part(
                "image",
                Part::bytes(png)
                    .file_name("upload.png")
                    .mime_str("image/png")?,
            )
            .text("imgsz", params.input_size.to_string())
            .text("conf", params.conf_threshold.to_string())
            .text("model", self.model.clone());

        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Detection(format!(
                "Inference failed: {} - {}",
                status, body
            )));
        }

        let result: DetectResponse = resp.json().await?;
        Ok(result.detections)
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Weights name sent with each request
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Detector for RemoteDetector {
    fn detect(
        &self,
        image: RgbImage,
        params: DetectionParams,
    ) -> BoxFuture<'_, Result<Vec<Detection>>> {
        Box::pin(self.predict(image, params))
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let url = format!("{}/healthz", self.base_url);
            match self.client.get(&url).send().await {
                Ok(resp) => resp.status().is_success(),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Detector health check failed");
                    false
                }
            }
        })
    }
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detect_response() {
        let body = r#"{
            "detections": [
                {"class_id": 0, "confidence": 0.91, "bbox": [10.5, 20.0, 110.0, 220.25]},
                {"class_id": 3, "confidence": 0.55, "bbox": [0, 0, 5, 5]}
            ]
        }"#;

        let resp: DetectResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.detections.len(), 2);
        assert_eq!(resp.detections[0].class_id, 0);
        assert_eq!(resp.detections[0].bbox, [10.5, 20.0, 110.0, 220.25]);
        assert_eq!(resp.detections[1].class_id, 3);
    }

    #[test]
    fn test_parse_empty_response() {
        let resp: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.detections.is_empty());
    }

    #[test]
    fn test_bbox_must_have_four_values() {
        let body = r#"{"detections": [{"class_id": 0, "confidence": 0.9, "bbox": [1, 2, 3]}]}"#;
        assert!(serde_json::from_str::<DetectResponse>(body).is_err());
    }

    #[test]
    fn test_encode_png_decodes_back() {
        let image = RgbImage::from_pixel(5, 3, image::Rgb([1, 2, 3]));
        let png = encode_png(&image).unwrap();
        let decoded = super::super::decode_image(&png).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let detector = RemoteDetector::with_timeout(
            "http://localhost:9000/".to_string(),
            "best.pt".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(detector.base_url(), "http://localhost:9000");
        assert_eq!(detector.model(), "best.pt");
    }
}
