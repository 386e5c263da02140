//! Processing parameters sent at registration.
//!
//! Clip and frame processing are mutually exclusive, and within clip mode the
//! target-rate shorthand and the sampled `{sampling_ratio, fps}` form are
//! mutually exclusive too. Both choices are sum types here, and serialization
//! is untagged, so a payload only ever carries the fields of one variant.

use serde::{Deserialize, Serialize};

/// Processing strategy name sent alongside the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
	/// Multi-frame clips for temporal tasks
	#[default]
	Clip,
	/// Single frames at a fixed interval
	Frame,
}

/// Resolved processing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessingConfig {
	Clip(ClipProcessing),
	Frame(FrameProcessing),
}

impl ProcessingConfig {
	/// Returns the mode matching this parameter set.
	pub fn mode(&self) -> ProcessingMode {
		match self {
			ProcessingConfig::Clip(_) => ProcessingMode::Clip,
			ProcessingConfig::Frame(_) => ProcessingMode::Frame,
		}
	}
}

/// Clip-mode parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClipProcessing {
	/// Target-rate shorthand: the service samples frames at `target_fps`.
	TargetRate {
		target_fps: f64,
		clip_length_seconds: f64,
		delay_seconds: f64,
	},
	/// Legacy parameterization: source rate plus sampling fraction.
	Sampled {
		sampling_ratio: f64,
		fps: f64,
		clip_length_seconds: f64,
		delay_seconds: f64,
	},
}

impl ClipProcessing {
	pub fn clip_length_seconds(&self) -> f64 {
		match self {
			ClipProcessing::TargetRate { clip_length_seconds, .. } | ClipProcessing::Sampled { clip_length_seconds, .. } => *clip_length_seconds,
		}
	}

	pub fn delay_seconds(&self) -> f64 {
		match self {
			ClipProcessing::TargetRate { delay_seconds, .. } | ClipProcessing::Sampled { delay_seconds, .. } => *delay_seconds,
		}
	}
}

/// Frame-mode parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameProcessing {
	pub interval_seconds: f64,
}
