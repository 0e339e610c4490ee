//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Form, FromRequest, Multipart, Path, Request, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{MessageResponse, NoDetectionResponse, Pin, PinCreatedResponse};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    let router = Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // WebSocket
        .route("/ws", get(websocket_handler));

    // `/barricades` keeps older map clients working
    let router = pin_routes(router, "/pins");
    let router = pin_routes(router, "/barricades");

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn pin_routes(router: Router<AppState>, prefix: &str) -> Router<AppState> {
    router
        .route(
            prefix,
            get(list_pins).post(create_pin).delete(clear_pins),
        )
        .route(
            &format!("{}/:latitude/:longitude", prefix),
            delete(remove_pin),
        )
}

// ========================================
// Pin Handlers
// ========================================

async fn list_pins(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pins.all().await)
}

/// JSON body of a manual pin
#[derive(Debug, Deserialize)]
struct ManualPinRequest {
    #[serde(default)]
    latitude: Value,
    #[serde(default)]
    longitude: Value,
    #[serde(default)]
    address: Option<String>,
}

/// Parsed POST body
enum Submission {
    Manual {
        latitude: f64,
        longitude: f64,
        address: Option<String>,
    },
    Image {
        latitude: f64,
        longitude: f64,
        image: Option<Vec<u8>>,
    },
}

async fn create_pin(State(state): State<AppState>, request: Request) -> Result<Response> {
    let submission = read_submission(request, &state).await?;

    let pin = match submission {
        Submission::Manual {
            latitude,
            longitude,
            address,
        } => {
            let address = match address.filter(|a| !a.is_empty()) {
                Some(address) => address,
                None => state.geocoding.resolve(latitude, longitude).await,
            };
            Pin::manual(latitude, longitude, address)
        }
        Submission::Image {
            latitude,
            longitude,
            image,
        } => {
            let image = image.ok_or_else(|| Error::Validation("Image is required".to_string()))?;
            let detection = state.detection.run(image).await?;

            if detection.is_empty() {
                tracing::info!(latitude, longitude, "No barricade detected, pin not added");
                return Ok((
                    StatusCode::OK,
                    Json(NoDetectionResponse {
                        message: "No barricade detected. Pin not added.".to_string(),
                        detection,
                    }),
                )
                    .into_response());
            }

            let address = state.geocoding.resolve(latitude, longitude).await;
            Pin {
                latitude,
                longitude,
                address,
                detection,
            }
        }
    };

    tracing::info!(
        latitude = pin.latitude,
        longitude = pin.longitude,
        detections = pin.detection.len(),
        "Barricade added"
    );

    let response = PinCreatedResponse {
        message: "Barricade added successfully".to_string(),
        address: pin.address.clone(),
        detection: pin.detection.clone(),
    };
    state.pins.append(pin).await;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn read_submission(request: Request, state: &AppState) -> Result<Submission> {
    if is_json(request.headers()) {
        let Json(body) = Json::<ManualPinRequest>::from_request(request, state)
            .await
            .map_err(|e| Error::Parse(e.body_text()))?;

        return Ok(Submission::Manual {
            latitude: coerce_coordinate("latitude", &body.latitude)?,
            longitude: coerce_coordinate("longitude", &body.longitude)?,
            address: body.address,
        });
    }

    // A urlencoded form cannot carry a file
    if is_urlencoded(request.headers()) {
        let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, state)
            .await
            .map_err(|e| Error::Parse(e.body_text()))?;
        let first = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        return Ok(Submission::Image {
            latitude: parse_coordinate("latitude", first("latitude"))?,
            longitude: parse_coordinate("longitude", first("longitude"))?,
            image: None,
        });
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| Error::Parse(e.body_text()))?;

    let mut latitude = None;
    let mut longitude = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Parse(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "latitude" if latitude.is_none() => {
                latitude = Some(field.text().await.map_err(|e| Error::Parse(e.body_text()))?);
            }
            "longitude" if longitude.is_none() => {
                longitude = Some(field.text().await.map_err(|e| Error::Parse(e.body_text()))?);
            }
            // Only file parts count as an upload
            "image" if image.is_none() && field.file_name().is_some() => {
                let bytes = field.bytes().await.map_err(|e| Error::Parse(e.body_text()))?;
                image = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    Ok(Submission::Image {
        latitude: parse_coordinate("latitude", latitude.as_deref())?,
        longitude: parse_coordinate("longitude", longitude.as_deref())?,
        image,
    })
}

/// Lowercased media type without parameters
fn mime_type(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    Some(
        content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase(),
    )
}

/// `application/json` or any `application/*+json`
fn is_json(headers: &HeaderMap) -> bool {
    mime_type(headers).is_some_and(|mime| {
        mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
    })
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    mime_type(headers).is_some_and(|mime| mime == "application/x-www-form-urlencoded")
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64> {
    let raw = raw.ok_or_else(|| Error::Parse(format!("{} is missing", name)))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| Error::Parse(format!("{} {:?}: {}", name, raw, e)))
}

/// Numbers pass through, numeric strings are parsed, booleans become 1.0 / 0.0
fn coerce_coordinate(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::Parse(format!("{} out of range", name))),
        Value::String(s) => parse_coordinate(name, Some(s)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Err(Error::Parse(format!("{} is missing", name))),
        other => Err(Error::Parse(format!("{} is not numeric: {}", name, other))),
    }
}

async fn clear_pins(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.pins.clear().await;
    tracing::info!(removed, "All barricades removed");
    Json(MessageResponse::new("All barricades removed"))
}

async fn remove_pin(
    State(state): State<AppState>,
    Path((latitude, longitude)): Path<(f64, f64)>,
) -> impl IntoResponse {
    let removed = state.pins.remove_matching(latitude, longitude).await;
    tracing::info!(latitude, longitude, removed, "Barricade removed");
    Json(MessageResponse::new("Barricade removed"))
}

// ========================================
// WebSocket Handler
// ========================================

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Register with RealtimeHub (logs the connect)
    let (conn_id, mut rx) = state.realtime.register().await;

    // Forward hub messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Clients send nothing meaningful; watch for close and errors
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Ping(data)) => {
                    // Pong is handled automatically by axum
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    // Unregister from hub (logs the disconnect)
    state.realtime.unregister(&conn_id).await;
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(&headers("application/json")));
        assert!(is_json(&headers("Application/JSON; charset=utf-8")));
        assert!(is_json(&headers("application/vnd.api+json")));
        assert!(!is_json(&headers("multipart/form-data; boundary=x")));
        assert!(!is_json(&headers("text/json")));
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn test_is_urlencoded() {
        assert!(is_urlencoded(&headers("application/x-www-form-urlencoded")));
        assert!(is_urlencoded(&headers(
            "Application/X-WWW-Form-Urlencoded; charset=utf-8"
        )));
        assert!(!is_urlencoded(&headers("multipart/form-data; boundary=x")));
        assert!(!is_urlencoded(&HeaderMap::new()));
    }

    #[test]
    fn test_coerce_coordinate() {
        assert_eq!(coerce_coordinate("latitude", &serde_json::json!(10)).unwrap(), 10.0);
        assert_eq!(coerce_coordinate("latitude", &serde_json::json!(-3.25)).unwrap(), -3.25);
        assert_eq!(coerce_coordinate("latitude", &serde_json::json!(" 7.5 ")).unwrap(), 7.5);
        assert_eq!(coerce_coordinate("latitude", &serde_json::json!(true)).unwrap(), 1.0);
        assert_eq!(coerce_coordinate("latitude", &serde_json::json!(false)).unwrap(), 0.0);
        assert!(coerce_coordinate("latitude", &Value::Null).is_err());
        assert!(coerce_coordinate("latitude", &serde_json::json!("north")).is_err());
        assert!(coerce_coordinate("latitude", &serde_json::json!([1.0])).is_err());
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("longitude", Some("20")).unwrap(), 20.0);
        assert!(matches!(parse_coordinate("longitude", None), Err(Error::Parse(_))));
        assert!(matches!(parse_coordinate("longitude", Some("")), Err(Error::Parse(_))));
    }
}
