//! HTTP stream API against an in-process axum server.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use vistream_protocol::{
	Backend, ClipProcessing, CreateStreamRequest, InferenceParams, ProcessingConfig, ProcessingMode, SourceTransport,
};
use vistream_runtime::{Error, HttpStreamApi, StreamApi};

const API_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct Recorded {
	bodies: Arc<Mutex<Vec<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
	headers
		.get("authorization")
		.and_then(|v| v.to_str().ok())
		.is_some_and(|v| v == format!("Bearer {API_KEY}"))
}

fn unauthorized() -> axum::response::Response {
	(
		StatusCode::UNAUTHORIZED,
		Json(json!({"error": "unauthorized", "message": "bad key", "request_id": "req-401"})),
	)
		.into_response()
}

async fn create_stream(State(state): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>) -> axum::response::Response {
	if !authorized(&headers) {
		return unauthorized();
	}
	state.bodies.lock().unwrap().push(body);
	Json(json!({
		"stream_id": "stream-1",
		"lease": {"ttl_seconds": 30},
		"relay_servers": [{"urls": ["turn:turn.example.org"], "username": "u", "credential": "c"}]
	}))
	.into_response()
}

async fn keepalive(headers: HeaderMap, Path(id): Path<String>) -> axum::response::Response {
	if !authorized(&headers) {
		return unauthorized();
	}
	if id == "broke" {
		return (StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable").into_response();
	}
	if id == "poor" {
		return (
			StatusCode::PAYMENT_REQUIRED,
			Json(json!({"error": "insufficient_credits", "message": "out of credit"})),
		)
			.into_response();
	}
	Json(json!({"status": "ok", "stream_id": id, "ttl_seconds": 30})).into_response()
}

async fn update_prompt(Path(id): Path<String>, Json(body): Json<Value>) -> axum::response::Response {
	if body["prompt"].as_str().is_none_or(str::is_empty) {
		return (
			StatusCode::UNPROCESSABLE_ENTITY,
			Json(json!({"error": "validation_error", "details": {"field": "prompt"}})),
		)
			.into_response();
	}
	Json(json!({"stream_id": id, "prompt": body["prompt"], "backend": "overshoot"})).into_response()
}

async fn close_stream(Path(id): Path<String>) -> axum::response::Response {
	if id == "stream-1" {
		Json(json!({"status": "ok"})).into_response()
	} else {
		(
			StatusCode::NOT_FOUND,
			Json(json!({"error": "not_found", "message": "stream gone", "request_id": "req-404"})),
		)
			.into_response()
	}
}

async fn spawn_server() -> (String, Recorded) {
	let recorded = Recorded::default();
	let app = Router::new()
		.route("/v1/streams", post(create_stream))
		.route("/v1/streams/{id}/keepalive", post(keepalive))
		.route("/v1/streams/{id}/config/prompt", patch(update_prompt))
		.route("/v1/streams/{id}", delete(close_stream))
		.with_state(recorded.clone());

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	(format!("http://{addr}/v1"), recorded)
}

fn relay_request() -> CreateStreamRequest {
	CreateStreamRequest {
		source: SourceTransport::Relay {
			url: "wss://relay.example".into(),
			token: "room-token".into(),
		},
		mode: ProcessingMode::Clip,
		processing: ProcessingConfig::Clip(ClipProcessing::TargetRate {
			target_fps: 10.0,
			clip_length_seconds: 3.0,
			delay_seconds: 1.0,
		}),
		inference: InferenceParams {
			prompt: "count cars".into(),
			backend: Backend::Overshoot,
			model: "vl-small".into(),
			output_schema: None,
			max_output_tokens: Some(64),
		},
	}
}

#[tokio::test]
async fn create_stream_sends_payload_and_parses_response() {
	let (base, recorded) = spawn_server().await;
	let api = HttpStreamApi::new(&base, API_KEY).unwrap();

	let response = api.create_stream(&relay_request()).await.unwrap();
	assert_eq!(response.stream_id, "stream-1");
	assert_eq!(response.lease_ttl(), Some(30.0));
	assert_eq!(response.relay_servers.as_ref().map(Vec::len), Some(1));

	let bodies = recorded.bodies.lock().unwrap();
	assert_eq!(bodies.len(), 1);
	assert_eq!(bodies[0]["source"]["type"], "relay");
	assert_eq!(bodies[0]["mode"], "clip");
	assert_eq!(
		bodies[0]["processing"],
		json!({"target_fps": 10.0, "clip_length_seconds": 3.0, "delay_seconds": 1.0})
	);
	assert_eq!(bodies[0]["inference"]["max_output_tokens"], 64);
}

#[tokio::test]
async fn wrong_key_maps_to_unauthorized() {
	let (base, _) = spawn_server().await;
	let api = HttpStreamApi::new(&base, "wrong").unwrap();

	let err = api.create_stream(&relay_request()).await.unwrap_err();
	assert!(err.is_auth(), "expected auth error, got {err:?}");
	assert_eq!(err.request_id(), Some("req-401"));
}

#[tokio::test]
async fn keepalive_status_mapping() {
	let (base, _) = spawn_server().await;
	let api = HttpStreamApi::new(&base, API_KEY).unwrap();

	let ok = api.renew_lease("stream-1").await.unwrap();
	assert_eq!(ok.status, "ok");
	assert_eq!(ok.stream_id, "stream-1");

	let server = api.renew_lease("broke").await.unwrap_err();
	match server {
		Error::Server { status, message, .. } => {
			assert_eq!(status, 503);
			assert_eq!(message, "upstream unavailable");
		}
		other => panic!("expected server error, got {other:?}"),
	}

	let credit = api.renew_lease("poor").await.unwrap_err();
	assert!(matches!(credit, Error::Api { status: 402, .. }), "got {credit:?}");
}

#[tokio::test]
async fn prompt_update_echo_and_validation() {
	let (base, _) = spawn_server().await;
	let api = HttpStreamApi::new(&base, API_KEY).unwrap();

	let echo = api.update_prompt("stream-1", "count bikes").await.unwrap();
	assert_eq!(echo.prompt, "count bikes");
	assert_eq!(echo.extra["backend"], "overshoot");

	let err = api.update_prompt("stream-1", "").await.unwrap_err();
	match err {
		Error::Validation { details, .. } => assert_eq!(details, Some(json!({"field": "prompt"}))),
		other => panic!("expected validation error, got {other:?}"),
	}
}

#[tokio::test]
async fn close_unknown_stream_is_not_found() {
	let (base, _) = spawn_server().await;
	let api = HttpStreamApi::new(&base, API_KEY).unwrap();

	assert_eq!(api.close_stream("stream-1").await.unwrap().status, "ok");

	let err = api.close_stream("other").await.unwrap_err();
	assert!(matches!(err, Error::NotFound { .. }));
	assert_eq!(err.request_id(), Some("req-404"));
}

#[tokio::test]
async fn unreachable_service_is_network_error() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let api = HttpStreamApi::new(&format!("http://{addr}"), API_KEY).unwrap();
	let err = api.renew_lease("stream-1").await.unwrap_err();
	assert!(matches!(err, Error::Network(_)), "got {err:?}");
}
