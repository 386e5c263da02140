//! Session configuration and injected defaults.
//!
//! [`SessionConfig`] is what a caller hands the coordinator. It is plain data
//! (serde-loadable, no callbacks) and is checked by
//! [`validate`](crate::validate::validate) before any resource is touched.
//! Optional knobs stay `None` until [`SessionDefaults`] fills them in at
//! registration time, so the same config can be validated against different
//! default tables.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vistream_protocol::{Backend, IceServer};

/// Everything needed to start one inference session.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Base URL of the inference service, e.g. `https://api.example.com/v1`.
	pub api_url: String,
	/// Bearer credential for the HTTP API and the result channel.
	#[serde(default)]
	pub api_key: String,
	pub source: SourceDescriptor,
	pub inference: InferenceConfig,
	#[serde(default)]
	pub processing: ProcessingOptions,
	/// Overrides the relay-assist servers handed to the transport.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ice_servers: Option<Vec<IceServer>>,
}

impl std::fmt::Debug for SessionConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionConfig")
			.field("api_url", &self.api_url)
			.field("api_key", &"<redacted>")
			.field("source", &self.source)
			.field("inference", &self.inference)
			.field("processing", &self.processing)
			.field("ice_servers", &self.ice_servers)
			.finish()
	}
}

/// Where the video comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDescriptor {
	/// A local camera. `facing` is a preference, not a hard constraint.
	Camera {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		facing: Option<CameraFacing>,
	},
	/// A local video file, played in a loop.
	File { path: PathBuf },
	/// Screen or window capture chosen by the user.
	Screen,
	/// Media already published to a relay room by the caller.
	Relay { url: String, token: String },
}

impl SourceDescriptor {
	/// Short name used in logs and error messages.
	pub fn kind(&self) -> &'static str {
		match self {
			SourceDescriptor::Camera { .. } => "camera",
			SourceDescriptor::File { .. } => "file",
			SourceDescriptor::Screen => "screen",
			SourceDescriptor::Relay { .. } => "relay",
		}
	}

	/// Returns `true` if media is captured and published by this client.
	pub fn is_local(&self) -> bool {
		!matches!(self, SourceDescriptor::Relay { .. })
	}
}

/// Camera facing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
	User,
	#[default]
	Environment,
}

/// Processing parameters as the caller wrote them.
///
/// Clip mode accepts either the `target_fps` shorthand or the legacy
/// `{sampling_ratio, fps}` pair; mixing them is a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProcessingOptions {
	Clip(ClipOptions),
	Frame(FrameOptions),
}

impl Default for ProcessingOptions {
	fn default() -> Self {
		ProcessingOptions::Clip(ClipOptions::default())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipOptions {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_fps: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sampling_ratio: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fps: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub clip_length_seconds: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub delay_seconds: Option<f64>,
}

impl ClipOptions {
	/// Name of the first legacy field present, if any.
	pub fn legacy_field(&self) -> Option<&'static str> {
		if self.sampling_ratio.is_some() {
			Some("sampling_ratio")
		} else if self.fps.is_some() {
			Some("fps")
		} else {
			None
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameOptions {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interval_seconds: Option<f64>,
}

/// Model selection and prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
	pub prompt: String,
	/// Backend wire name; must be one of [`Backend::ALL`].
	#[serde(default = "default_backend")]
	pub backend: String,
	pub model: String,
	/// JSON schema the model output should follow.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output_schema: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_output_tokens: Option<u32>,
}

fn default_backend() -> String {
	Backend::default().as_str().to_string()
}

/// Default values and bounds, injected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDefaults {
	pub sampling_ratio: f64,
	pub clip_length_seconds: f64,
	pub delay_seconds: f64,
	pub interval_seconds: f64,
	/// Used as the legacy `fps` when the source reports no usable rate.
	pub fallback_fps: f64,
	/// Redraw rate of the canvas fallback for file sources.
	pub canvas_fps: u32,
	/// How long a file source may take to report its dimensions.
	pub metadata_timeout: Duration,
	/// Upper bound on the remote close call during teardown.
	pub close_timeout: Duration,
	pub camera_facing: CameraFacing,
	pub ice_servers: Vec<IceServer>,
	pub bounds: Bounds,
}

impl Default for SessionDefaults {
	fn default() -> Self {
		Self {
			sampling_ratio: 0.1,
			clip_length_seconds: 0.5,
			delay_seconds: 0.5,
			interval_seconds: 0.2,
			fallback_fps: 30.0,
			canvas_fps: 30,
			metadata_timeout: Duration::from_secs(10),
			close_timeout: Duration::from_secs(5),
			camera_facing: CameraFacing::Environment,
			ice_servers: vec![IceServer::new("stun:stun.l.google.com:19302")],
			bounds: Bounds::default(),
		}
	}
}

/// Closed intervals accepted for each numeric option.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
	pub sampling_ratio: RangeInclusive<f64>,
	pub fps: RangeInclusive<f64>,
	pub target_fps: RangeInclusive<f64>,
	pub clip_length_seconds: RangeInclusive<f64>,
	pub delay_seconds: RangeInclusive<f64>,
	pub interval_seconds: RangeInclusive<f64>,
	/// `target_fps * clip_length_seconds` must reach this.
	pub min_frames_per_clip: f64,
}

impl Default for Bounds {
	fn default() -> Self {
		Self {
			sampling_ratio: 0.0..=1.0,
			fps: 1.0..=120.0,
			target_fps: 1.0..=30.0,
			clip_length_seconds: 0.1..=60.0,
			delay_seconds: 0.0..=60.0,
			interval_seconds: 0.1..=60.0,
			min_frames_per_clip: 3.0,
		}
	}
}
