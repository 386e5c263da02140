//! Result channel messages.
//!
//! The channel carries exactly one outbound message, [`ChannelAuth`], sent as
//! soon as the connection opens. Every inbound text message is an
//! [`InferenceResult`].

use serde::{Deserialize, Serialize};

use crate::processing::ProcessingMode;

/// First outbound message on the result channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAuth {
	pub api_key: String,
}

/// One inference result produced by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
	pub id: String,
	pub stream_id: String,
	pub mode: ProcessingMode,
	pub model_backend: String,
	pub model_name: String,
	/// Prompt the result was produced for.
	pub prompt: String,
	/// Raw model output; structured parsing against the caller's schema is
	/// left to the caller.
	pub result: String,
	pub inference_latency_ms: f64,
	pub total_latency_ms: f64,
	pub ok: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
