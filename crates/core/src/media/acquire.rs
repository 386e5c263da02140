use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vistream_runtime::{Error, Result};

use super::{CameraRequest, Canvas, CaptureError, MediaDevices, MediaStream, MediaTrack, PlaybackSurface};
use crate::config::{SessionDefaults, SourceDescriptor};

/// Media captured for one session, plus whatever keeps it flowing.
///
/// Dropping releases everything that has not been released yet.
pub struct AcquiredMedia {
	stream: MediaStream,
	tracks_stopped: bool,
	file: Option<FileCapture>,
}

impl AcquiredMedia {
	fn from_stream(stream: MediaStream, kind: &str, file: Option<FileCapture>) -> Result<Self> {
		if !stream.has_video() {
			stream.stop_all();
			return Err(Error::Source(format!("{kind} stream has no video track")));
		}
		Ok(Self {
			stream,
			tracks_stopped: false,
			file,
		})
	}

	pub fn stream(&self) -> &MediaStream {
		&self.stream
	}

	/// The track published to the service.
	pub fn video_track(&self) -> Option<Arc<dyn MediaTrack>> {
		self.stream.first_video_track().cloned()
	}

	/// Stops every captured track, once.
	pub fn stop_tracks(&mut self) {
		if !self.tracks_stopped {
			self.tracks_stopped = true;
			self.stream.stop_all();
		}
	}

	/// Cancels the canvas redraw loop and frees the canvas and file player.
	pub fn release_surfaces(&mut self) {
		if let Some(mut file) = self.file.take() {
			file.release();
		}
	}

	pub fn release(&mut self) {
		self.stop_tracks();
		self.release_surfaces();
	}
}

impl Drop for AcquiredMedia {
	fn drop(&mut self) {
		self.release();
	}
}

/// Resources behind a file source.
struct FileCapture {
	surface: Option<Arc<dyn PlaybackSurface>>,
	canvas: Option<Arc<dyn Canvas>>,
	redraw: Option<JoinHandle<()>>,
}

impl FileCapture {
	fn new(surface: Arc<dyn PlaybackSurface>) -> Self {
		Self {
			surface: Some(surface),
			canvas: None,
			redraw: None,
		}
	}

	fn release(&mut self) {
		if let Some(redraw) = self.redraw.take() {
			redraw.abort();
		}
		if let Some(canvas) = self.canvas.take() {
			canvas.release();
		}
		if let Some(surface) = self.surface.take() {
			surface.release();
		}
	}
}

impl Drop for FileCapture {
	fn drop(&mut self) {
		self.release();
	}
}

/// Acquires local media for `source`.
///
/// Relay sources are published by the caller and never reach this function.
pub async fn acquire(devices: &dyn MediaDevices, source: &SourceDescriptor, defaults: &SessionDefaults) -> Result<AcquiredMedia> {
	match source {
		SourceDescriptor::Camera { facing } => {
			let request = CameraRequest {
				ideal_facing: facing.unwrap_or(defaults.camera_facing),
			};
			debug!(target = "vistream", facing = ?request.ideal_facing, "opening camera");
			let stream = devices.open_camera(request).await.map_err(|e| capture_error("camera", e))?;
			AcquiredMedia::from_stream(stream, "camera", None)
		}
		SourceDescriptor::Screen => {
			debug!(target = "vistream", "requesting display capture");
			let stream = devices.open_display().await.map_err(|e| match e {
				CaptureError::Cancelled | CaptureError::PermissionDenied(_) => {
					Error::SourceCancelled("screen sharing was cancelled or denied".to_string())
				}
				other => Error::Source(format!("screen capture failed: {other}")),
			})?;
			AcquiredMedia::from_stream(stream, "screen", None)
		}
		SourceDescriptor::File { path } => acquire_file(devices, path, defaults).await,
		SourceDescriptor::Relay { .. } => Err(Error::InvalidState(
			"relay sources are published by the caller, not captured locally".to_string(),
		)),
	}
}

fn capture_error(kind: &str, err: CaptureError) -> Error {
	match err {
		CaptureError::Cancelled => Error::SourceCancelled(format!("{kind} access was cancelled")),
		other => Error::Source(format!("{kind} capture failed: {other}")),
	}
}

async fn acquire_file(devices: &dyn MediaDevices, path: &Path, defaults: &SessionDefaults) -> Result<AcquiredMedia> {
	let name = path.display();
	let surface = devices
		.load_file(path)
		.await
		.map_err(|e| Error::Source(format!("failed to load '{name}': {e}")))?;
	let mut capture = FileCapture::new(Arc::clone(&surface));

	let dimensions = match tokio::time::timeout(defaults.metadata_timeout, surface.wait_for_metadata()).await {
		Ok(Ok(dimensions)) => dimensions,
		Ok(Err(e)) => return Err(Error::Source(format!("failed to read metadata of '{name}': {e}"))),
		Err(_) => {
			return Err(Error::Source(format!(
				"timed out after {:?} waiting for metadata of '{name}'",
				defaults.metadata_timeout
			)));
		}
	};

	surface
		.play_looped()
		.await
		.map_err(|e| Error::Source(format!("failed to play '{name}': {e}")))?;

	let stream = if surface.supports_native_capture() {
		surface
			.capture_stream()
			.map_err(|e| Error::Source(format!("failed to capture '{name}': {e}")))?
	} else {
		info!(
			target = "vistream",
			width = dimensions.width,
			height = dimensions.height,
			fps = defaults.canvas_fps,
			"native file capture unavailable, using canvas"
		);
		let canvas = devices
			.create_canvas(dimensions)
			.map_err(|e| Error::Source(format!("failed to create canvas: {e}")))?;
		capture.canvas = Some(Arc::clone(&canvas));

		canvas.draw_frame(surface.as_ref());
		capture.redraw = Some(spawn_redraw(Arc::clone(&canvas), Arc::clone(&surface), defaults.canvas_fps));

		canvas
			.capture_stream(defaults.canvas_fps)
			.map_err(|e| Error::Source(format!("failed to capture canvas: {e}")))?
	};

	AcquiredMedia::from_stream(stream, "file", Some(capture))
}

/// Redraws `surface` onto `canvas` at `fps` until aborted.
fn spawn_redraw(canvas: Arc<dyn Canvas>, surface: Arc<dyn PlaybackSurface>, fps: u32) -> JoinHandle<()> {
	let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
		// first tick completes immediately; that frame was drawn before capture
		ticker.tick().await;
		loop {
			ticker.tick().await;
			canvas.draw_frame(surface.as_ref());
		}
	})
}

/// Frame rate of the first video track, when it reports a usable one.
pub fn probe_frame_rate(stream: &MediaStream) -> Option<f64> {
	stream
		.first_video_track()
		.and_then(|track| track.frame_rate())
		.filter(|fps| fps.is_finite() && *fps > 0.0)
}
