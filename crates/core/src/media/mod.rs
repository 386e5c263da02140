//! Local media capture.
//!
//! The platform's capture primitives are reached through capability traits:
//!
//! - [`MediaDevices`] - camera, display, and file access plus canvas creation
//! - [`MediaTrack`] - one captured track; stoppable, observable for ending
//! - [`PlaybackSurface`] - a looping file player that may capture natively
//! - [`Canvas`] - an offscreen surface redrawn from a player and captured
//!
//! [`acquire`] turns a [`SourceDescriptor`](crate::config::SourceDescriptor)
//! into an [`AcquiredMedia`] holding exactly the resources teardown must
//! release.

mod acquire;


use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use acquire::{AcquiredMedia, acquire, probe_frame_rate};

use crate::config::CameraFacing;

/// Kind of a captured track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
	Video,
	Audio,
}

/// A single captured media track.
#[async_trait]
pub trait MediaTrack: Send + Sync {
	fn id(&self) -> &str;

	fn kind(&self) -> TrackKind;

	/// Frame rate reported by the track's settings, if any.
	fn frame_rate(&self) -> Option<f64>;

	/// Stops capture. Calling it more than once has no further effect.
	fn stop(&self);

	/// Resolves when capture ends outside the client's control (the user
	/// stopped sharing, the device went away). Not triggered by [`stop`](Self::stop).
	async fn ended(&self);
}

/// An ordered set of tracks from one capture call.
#[derive(Clone, Default)]
pub struct MediaStream {
	tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
	pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
		Self { tracks }
	}

	pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
		&self.tracks
	}

	/// First video track, which is the one published to the service.
	pub fn first_video_track(&self) -> Option<&Arc<dyn MediaTrack>> {
		self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
	}

	pub fn has_video(&self) -> bool {
		self.first_video_track().is_some()
	}

	/// Stops every track in the stream.
	pub fn stop_all(&self) {
		for track in &self.tracks {
			track.stop();
		}
	}
}

impl std::fmt::Debug for MediaStream {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let ids: Vec<&str> = self.tracks.iter().map(|t| t.id()).collect();
		f.debug_struct("MediaStream").field("tracks", &ids).finish()
	}
}

/// Pixel dimensions reported once a file's metadata has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDimensions {
	pub width: u32,
	pub height: u32,
}

/// Camera request; `ideal_facing` is a preference the platform may ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRequest {
	pub ideal_facing: CameraFacing,
}

/// Failure reported by a capture primitive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
	/// The user dismissed the picker or prompt.
	#[error("cancelled by user")]
	Cancelled,
	#[error("permission denied: {0}")]
	PermissionDenied(String),
	#[error("no matching device: {0}")]
	NotFound(String),
	#[error("{0}")]
	Failed(String),
}

/// Platform capture primitives.
#[async_trait]
pub trait MediaDevices: Send + Sync {
	/// Whether [`open_display`](Self::open_display) can work at all.
	fn supports_display_capture(&self) -> bool;

	/// Opens a camera, video only.
	async fn open_camera(&self, request: CameraRequest) -> Result<MediaStream, CaptureError>;

	/// Asks the user to pick a screen or window, video only.
	async fn open_display(&self) -> Result<MediaStream, CaptureError>;

	/// Loads a local file into a muted, inline playback surface.
	async fn load_file(&self, path: &Path) -> Result<Arc<dyn PlaybackSurface>, CaptureError>;

	/// Creates an offscreen canvas of the given size.
	fn create_canvas(&self, dimensions: VideoDimensions) -> Result<Arc<dyn Canvas>, CaptureError>;
}

/// A file player.
#[async_trait]
pub trait PlaybackSurface: Send + Sync {
	/// Resolves once dimensions are known.
	async fn wait_for_metadata(&self) -> Result<VideoDimensions, CaptureError>;

	/// Starts looped, muted playback.
	async fn play_looped(&self) -> Result<(), CaptureError>;

	/// Whether the player can expose its frames as a stream directly.
	fn supports_native_capture(&self) -> bool;

	fn capture_stream(&self) -> Result<MediaStream, CaptureError>;

	/// Stops playback and frees the loaded file.
	fn release(&self);
}

/// An offscreen drawing surface.
pub trait Canvas: Send + Sync {
	/// Copies the surface's current frame onto the canvas.
	fn draw_frame(&self, surface: &dyn PlaybackSurface);

	fn capture_stream(&self, fps: u32) -> Result<MediaStream, CaptureError>;

	fn release(&self);
}
