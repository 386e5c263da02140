//! Stream lifecycle requests and responses.
//!
//! | Call                | Method + path                         | Body / response |
//! |---------------------|---------------------------------------|-----------------|
//! | register            | `POST /streams`                       | [`CreateStreamRequest`] → [`CreateStreamResponse`] |
//! | renew lease         | `POST /streams/{id}/keepalive`        | → [`KeepaliveResponse`] |
//! | update prompt       | `PATCH /streams/{id}/config/prompt`   | [`PromptUpdateRequest`] → [`StreamConfigEcho`] |
//! | close               | `DELETE /streams/{id}`                | → [`CloseResponse`] |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::processing::{ProcessingConfig, ProcessingMode};
use crate::types::{Backend, IceServer, SessionDescription, SourceTransport};

/// Inference parameters for a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
	pub prompt: String,
	pub backend: Backend,
	pub model: String,
	/// JSON schema the model output must conform to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output_schema: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_output_tokens: Option<u32>,
}

/// Registration request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStreamRequest {
	pub source: SourceTransport,
	pub mode: ProcessingMode,
	pub processing: ProcessingConfig,
	pub inference: InferenceParams,
}

/// Lease granted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaseInfo {
	pub ttl_seconds: f64,
}

/// Registration response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStreamResponse {
	pub stream_id: String,
	/// Remote answer; present only for point-to-point sessions.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub webrtc_answer: Option<SessionDescription>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lease: Option<LeaseInfo>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relay_servers: Option<Vec<IceServer>>,
}

impl CreateStreamResponse {
	/// Returns the lease TTL when the service granted a positive one.
	pub fn lease_ttl(&self) -> Option<f64> {
		self.lease.map(|l| l.ttl_seconds).filter(|ttl| *ttl > 0.0)
	}
}

/// Lease renewal response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepaliveResponse {
	pub status: String,
	pub stream_id: String,
	pub ttl_seconds: f64,
}

/// Prompt update request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptUpdateRequest {
	pub prompt: String,
}

/// Stream configuration echoed after a prompt update.
///
/// Only the prompt is interpreted; everything else the service sends back is
/// kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfigEcho {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stream_id: Option<String>,
	pub prompt: String,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

/// Close response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResponse {
	pub status: String,
}

/// Error payload attached to any non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
	pub error: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<Value>,
}

impl ApiErrorBody {
	/// Human-readable message: `message` when present, otherwise `error`.
	pub fn display_message(&self) -> &str {
		self.message.as_deref().unwrap_or(&self.error)
	}
}
