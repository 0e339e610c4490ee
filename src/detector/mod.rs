//! Detector - Barricade Detection Adapter
//!
//! ## Responsibilities
//!
//! - Decode uploaded image bytes and convert them to RGB8
//! - Run the detection model at a fixed input size and confidence threshold
//! - Normalize results into [`Detection`] records, keeping model order
//!
//! ## Design
//!
//! - The model itself is opaque and sits behind the [`Detector`] trait
//! - Decoding runs on the blocking pool
//! - A semaphore bounds concurrent inferences, each call has a deadline

mod client;

pub use client::RemoteDetector;

use crate::error::{Error, Result};
use crate::models::Detection;
use futures::future::BoxFuture;
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Model input resolution (square)
pub const INPUT_SIZE: u32 = 640;

/// Minimum confidence for a box to be reported
pub const CONF_THRESHOLD: f32 = 0.5;

/// Inference parameters passed to the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    pub input_size: u32,
    pub conf_threshold: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE,
            conf_threshold: CONF_THRESHOLD,
        }
    }
}

/// Object detection model
pub trait Detector: Send + Sync {
    /// Run inference on a decoded RGB image
    fn detect(
        &self,
        image: RgbImage,
        params: DetectionParams,
    ) -> BoxFuture<'_, Result<Vec<Detection>>>;

    /// Whether the model backend is reachable
    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

/// Decode any supported image format into RGB8
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Detection adapter instance
pub struct DetectionAdapter {
    detector: Arc<dyn Detector>,
    workers: Semaphore,
    timeout: Duration,
    params: DetectionParams,
}

impl DetectionAdapter {
    /// Create new adapter allowing `workers` concurrent inferences
    pub fn new(detector: Arc<dyn Detector>, workers: usize, timeout: Duration) -> Self {
        Self {
            detector,
            workers: Semaphore::new(workers.max(1)),
            timeout,
            params: DetectionParams::default(),
        }
    }

    /// Decode `image_bytes` and run the model on it
    pub async fn run(&self, image_bytes: Vec<u8>) -> Result<Vec<Detection>> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("Inference pool closed: {}", e)))?;

        let size = image_bytes.len();
        let image = tokio::task::spawn_blocking(move || decode_image(&image_bytes))
            .await
            .map_err(|e| Error::Internal(format!("Decode task failed: {}", e)))??;
        let (width, height) = image.dimensions();
        tracing::debug!(bytes = size, width, height, "Image decoded");

        let detections = timeout(self.timeout, self.detector.detect(image, self.params))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Detector did not answer within {}s",
                    self.timeout.as_secs_f32()
                ))
            })??;

        tracing::info!(
            width,
            height,
            detections = detections.len(),
            "Detection finished"
        );

        Ok(detections)
    }

    /// Check model backend
    pub async fn health_check(&self) -> bool {
        self.detector.health_check().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// Detector returning a fixed answer and recording what it was given
    pub(crate) struct FixedDetector {
        pub detections: Vec<Detection>,
        pub seen: Mutex<Vec<(u32, u32, DetectionParams)>>,
    }

    impl FixedDetector {
        pub(crate) fn new(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Detector for FixedDetector {
        fn detect(
            &self,
            image: RgbImage,
            params: DetectionParams,
        ) -> BoxFuture<'_, Result<Vec<Detection>>> {
            self.seen
                .lock()
                .unwrap()
                .push((image.width(), image.height(), params));
            let detections = self.detections.clone();
            Box::pin(async move { Ok(detections) })
        }
    }

    struct SlowDetector;

    impl Detector for SlowDetector {
        fn detect(&self, _: RgbImage, _: DetectionParams) -> BoxFuture<'_, Result<Vec<Detection>>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Vec::new())
            })
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _: RgbImage, _: DetectionParams) -> BoxFuture<'_, Result<Vec<Detection>>> {
            Box::pin(async { Err(Error::Detection("model offline".to_string())) })
        }

        fn health_check(&self) -> BoxFuture<'_, bool> {
            Box::pin(async { false })
        }
    }

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, image::Rgb([200, 80, 10]));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn det(class_id: i64, confidence: f64) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: [1.0, 2.0, 3.0, 4.0],
        }
    }

    #[test]
    fn test_decode_image_converts_to_rgb() {
        let gray = image::GrayImage::from_pixel(3, 2, image::Luma([7]));
        let mut buf = Cursor::new(Vec::new());
        gray.write_to(&mut buf, ImageFormat::Png).unwrap();

        let rgb = decode_image(buf.get_ref()).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(0, 0).0, [7, 7, 7]);
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_run_preserves_model_order_and_fixed_params() {
        let detector = Arc::new(FixedDetector::new(vec![det(2, 0.6), det(0, 0.9), det(1, 0.7)]));
        let adapter = DetectionAdapter::new(detector.clone(), 2, Duration::from_secs(1));

        let detections = adapter.run(png_bytes(8, 4)).await.unwrap();
        let classes: Vec<i64> = detections.iter().map(|d| d.class_id).collect();
        assert_eq!(classes, vec![2, 0, 1]);

        let seen = detector.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 8);
        assert_eq!(seen[0].1, 4);
        assert_eq!(seen[0].2.input_size, 640);
        assert_eq!(seen[0].2.conf_threshold, 0.5);
    }

    #[tokio::test]
    async fn test_run_decode_failure_skips_model() {
        let detector = Arc::new(FixedDetector::new(vec![det(0, 0.9)]));
        let adapter = DetectionAdapter::new(detector.clone(), 1, Duration::from_secs(1));

        let result = adapter.run(b"\x89PNG broken".to_vec()).await;
        assert!(matches!(result, Err(Error::Decode(_))));
        assert!(detector.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let adapter = DetectionAdapter::new(Arc::new(SlowDetector), 1, Duration::from_millis(50));
        let result = adapter.run(png_bytes(2, 2)).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_run_propagates_model_error() {
        let adapter = DetectionAdapter::new(Arc::new(FailingDetector), 1, Duration::from_secs(1));
        let result = adapter.run(png_bytes(2, 2)).await;
        assert!(matches!(result, Err(Error::Detection(_))));
        assert!(!adapter.health_check().await);
    }
}
