//! Synchronous configuration checks and processing resolution.
//!
//! [`validate`] runs before any media, network, or transport resource is
//! touched and reports the first offending field. [`resolve_processing`]
//! later turns the caller's options into the exact parameter set sent at
//! registration.

use std::ops::RangeInclusive;

use vistream_protocol::{Backend, ClipProcessing, FrameProcessing, ProcessingConfig};
use vistream_runtime::{Error, Result, parse_base_url};

use crate::config::{ClipOptions, FrameOptions, InferenceConfig, ProcessingOptions, SessionConfig, SessionDefaults, SourceDescriptor};


/// Platform features the validator needs to know about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
	/// Local capture and a point-to-point transport are both available.
	pub local_capture: bool,
	/// Screen or window capture is available.
	pub display_capture: bool,
}

/// Checks `config` and returns the first violation as
/// [`Error::Configuration`].
pub fn validate(config: &SessionConfig, capabilities: &Capabilities, defaults: &SessionDefaults) -> Result<()> {
	if config.api_url.trim().is_empty() {
		return Err(Error::config("api_url", "must not be empty"));
	}
	parse_base_url(&config.api_url)?;

	if config.api_key.trim().is_empty() {
		return Err(Error::config("api_key", "must not be empty"));
	}

	validate_inference(&config.inference)?;
	validate_source(&config.source, capabilities)?;

	match &config.processing {
		ProcessingOptions::Clip(clip) => validate_clip(clip, defaults),
		ProcessingOptions::Frame(frame) => validate_frame(frame, defaults),
	}
}

fn validate_inference(inference: &InferenceConfig) -> Result<()> {
	if inference.prompt.trim().is_empty() {
		return Err(Error::config("inference.prompt", "must not be empty"));
	}
	if inference.model.trim().is_empty() {
		return Err(Error::config("inference.model", "must not be empty"));
	}
	inference
		.backend
		.parse::<Backend>()
		.map_err(|message| Error::config("inference.backend", message))?;
	if inference.max_output_tokens == Some(0) {
		return Err(Error::config("inference.max_output_tokens", "must be a positive integer"));
	}
	if inference.output_schema.as_ref().is_some_and(|schema| !schema.is_object()) {
		return Err(Error::config("inference.output_schema", "must be a JSON object"));
	}
	Ok(())
}

fn validate_source(source: &SourceDescriptor, capabilities: &Capabilities) -> Result<()> {
	match source {
		SourceDescriptor::Camera { .. } => require_local_capture(capabilities, "camera"),
		SourceDescriptor::File { path } => {
			if path.as_os_str().is_empty() || path.file_name().is_none() {
				return Err(Error::config("source.path", "must name a video file"));
			}
			require_local_capture(capabilities, "file")
		}
		SourceDescriptor::Screen => {
			require_local_capture(capabilities, "screen")?;
			if !capabilities.display_capture {
				return Err(Error::config("source", "screen capture is not supported on this platform"));
			}
			Ok(())
		}
		SourceDescriptor::Relay { url, token } => {
			if url.trim().is_empty() {
				return Err(Error::config("source.url", "relay source requires a server URL"));
			}
			if token.trim().is_empty() {
				return Err(Error::config("source.token", "relay source requires an access token"));
			}
			Ok(())
		}
	}
}

fn require_local_capture(capabilities: &Capabilities, kind: &str) -> Result<()> {
	if capabilities.local_capture {
		Ok(())
	} else {
		Err(Error::config("source", format!("{kind} source needs local capture and a media transport")))
	}
}

fn validate_clip(clip: &ClipOptions, defaults: &SessionDefaults) -> Result<()> {
	let bounds = &defaults.bounds;

	if let (Some(_), Some(legacy)) = (clip.target_fps, clip.legacy_field()) {
		return Err(Error::config(
			"processing.target_fps",
			format!("cannot be combined with '{legacy}'; use either target_fps or sampling_ratio/fps"),
		));
	}

	check_range("processing.target_fps", clip.target_fps, &bounds.target_fps)?;
	check_range("processing.sampling_ratio", clip.sampling_ratio, &bounds.sampling_ratio)?;
	check_range("processing.fps", clip.fps, &bounds.fps)?;
	check_range("processing.clip_length_seconds", clip.clip_length_seconds, &bounds.clip_length_seconds)?;
	check_range("processing.delay_seconds", clip.delay_seconds, &bounds.delay_seconds)?;

	if let Some(target) = clip.target_fps {
		let clip_length = clip.clip_length_seconds.unwrap_or(defaults.clip_length_seconds);
		let frames = target * clip_length;
		if frames < bounds.min_frames_per_clip {
			return Err(Error::config(
				"processing.target_fps",
				format!(
					"target_fps * clip_length_seconds = {frames} but at least {} frames per clip are required",
					bounds.min_frames_per_clip
				),
			));
		}
	}
	Ok(())
}

fn validate_frame(frame: &FrameOptions, defaults: &SessionDefaults) -> Result<()> {
	check_range("processing.interval_seconds", frame.interval_seconds, &defaults.bounds.interval_seconds)
}

fn check_range(field: &str, value: Option<f64>, range: &RangeInclusive<f64>) -> Result<()> {
	match value {
		Some(v) if !range.contains(&v) => Err(Error::config(
			field,
			format!("{v} is outside [{}, {}]", range.start(), range.end()),
		)),
		_ => Ok(()),
	}
}

/// Resolves the caller's options into the registration parameters.
///
/// Missing values come from `defaults`. In the legacy clip form, `fps` falls
/// back to `detected_fps` and then to the fixed fallback rate; the detected
/// rate is not range-checked.
pub fn resolve_processing(options: &ProcessingOptions, detected_fps: Option<f64>, defaults: &SessionDefaults) -> ProcessingConfig {
	match options {
		ProcessingOptions::Clip(clip) => {
			let clip_length_seconds = clip.clip_length_seconds.unwrap_or(defaults.clip_length_seconds);
			let delay_seconds = clip.delay_seconds.unwrap_or(defaults.delay_seconds);
			let resolved = match clip.target_fps {
				Some(target_fps) => ClipProcessing::TargetRate {
					target_fps,
					clip_length_seconds,
					delay_seconds,
				},
				None => ClipProcessing::Sampled {
					sampling_ratio: clip.sampling_ratio.unwrap_or(defaults.sampling_ratio),
					fps: clip.fps.or(detected_fps).unwrap_or(defaults.fallback_fps),
					clip_length_seconds,
					delay_seconds,
				},
			};
			ProcessingConfig::Clip(resolved)
		}
		ProcessingOptions::Frame(frame) => ProcessingConfig::Frame(FrameProcessing {
			interval_seconds: frame.interval_seconds.unwrap_or(defaults.interval_seconds),
		}),
	}
}
