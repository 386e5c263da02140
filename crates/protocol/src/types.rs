//! Primitive wire types shared by requests and responses.

use serde::{Deserialize, Serialize};

/// Inference backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
	/// Service-hosted vision models (default)
	#[default]
	Overshoot,
	/// Gemini-backed inference
	Gemini,
}

impl Backend {
	/// Every backend the service accepts.
	pub const ALL: [Backend; 2] = [Backend::Overshoot, Backend::Gemini];

	/// Returns the wire name of this backend.
	pub fn as_str(&self) -> &'static str {
		match self {
			Backend::Overshoot => "overshoot",
			Backend::Gemini => "gemini",
		}
	}
}

impl std::fmt::Display for Backend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Backend {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Backend::ALL
			.into_iter()
			.find(|b| b.as_str() == s)
			.ok_or_else(|| format!("unknown backend '{s}' (expected one of: overshoot, gemini)"))
	}
}

/// Session description kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
	Offer,
	Answer,
}

/// Session description exchanged during point-to-point negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
	#[serde(rename = "type")]
	pub kind: SdpType,
	pub sdp: String,
}

impl SessionDescription {
	pub fn offer(sdp: impl Into<String>) -> Self {
		Self {
			kind: SdpType::Offer,
			sdp: sdp.into(),
		}
	}

	pub fn answer(sdp: impl Into<String>) -> Self {
		Self {
			kind: SdpType::Answer,
			sdp: sdp.into(),
		}
	}
}

/// Relay-assist (STUN/TURN) server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
	/// One or more server URLs (e.g., `"stun:stun.example.org:3478"`)
	pub urls: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential: Option<String>,
}

impl IceServer {
	/// Creates an unauthenticated server entry for a single URL.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			urls: vec![url.into()],
			username: None,
			credential: None,
		}
	}
}

/// How the service should obtain the media for a session.
///
/// Serialized with a `type` tag, e.g. `{"type": "relay", "url": ..., "token": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceTransport {
	/// Point-to-point media transport; carries the local offer.
	Transport {
		/// Offer SDP produced by local negotiation.
		sdp: String,
	},
	/// Media already published to a third-party relay room.
	Relay {
		/// Relay server URL.
		url: String,
		/// Access token for the relay room.
		token: String,
	},
}
