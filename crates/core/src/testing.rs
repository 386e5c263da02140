//! In-memory fakes of every capability trait, with call counters.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use url::Url;
use vistream_protocol::{
	CloseResponse, CreateStreamRequest, CreateStreamResponse, IceServer, KeepaliveResponse, LeaseInfo, SessionDescription, StreamConfigEcho,
};
use vistream_runtime::{ChannelConnector, ChannelFrame, ChannelParts, ChannelSender, Error, Result, StreamApi};

use crate::media::{
	CameraRequest, Canvas, CaptureError, MediaDevices, MediaStream, MediaTrack, PlaybackSurface, TrackKind, VideoDimensions,
};
use crate::transport::{PeerTransport, TransportEvent, TransportEventSink, TransportFactory};

pub(crate) fn result_json(id: &str, stream_id: &str) -> String {
	json!({
		"id": id,
		"stream_id": stream_id,
		"mode": "clip",
		"model_backend": "overshoot",
		"model_name": "vl-small",
		"prompt": "count people",
		"result": "3 people",
		"inference_latency_ms": 40.0,
		"total_latency_ms": 120.0,
		"ok": true
	})
	.to_string()
}

pub(crate) fn noop_sink() -> TransportEventSink {
	Arc::new(|_| {})
}

fn stream_of(tracks: &[Arc<FakeTrack>]) -> MediaStream {
	MediaStream::new(tracks.iter().map(|t| Arc::clone(t) as Arc<dyn MediaTrack>).collect())
}

pub(crate) struct FakeTrack {
	id: String,
	kind: TrackKind,
	fps: Option<f64>,
	stops: AtomicUsize,
	ended: watch::Sender<bool>,
}

impl FakeTrack {
	fn build(id: &str, kind: TrackKind, fps: Option<f64>) -> Arc<Self> {
		Arc::new(Self {
			id: id.to_string(),
			kind,
			fps,
			stops: AtomicUsize::new(0),
			ended: watch::Sender::new(false),
		})
	}

	pub(crate) fn video(id: &str) -> Arc<Self> {
		Self::build(id, TrackKind::Video, None)
	}

	pub(crate) fn video_at(id: &str, fps: f64) -> Arc<Self> {
		Self::build(id, TrackKind::Video, Some(fps))
	}

	pub(crate) fn audio(id: &str) -> Arc<Self> {
		Self::build(id, TrackKind::Audio, None)
	}

	pub(crate) fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}

	/// Simulates capture ending outside the client (user stopped sharing).
	pub(crate) fn end(&self) {
		self.ended.send_replace(true);
	}
}

#[async_trait]
impl MediaTrack for FakeTrack {
	fn id(&self) -> &str {
		&self.id
	}

	fn kind(&self) -> TrackKind {
		self.kind
	}

	fn frame_rate(&self) -> Option<f64> {
		self.fps
	}

	fn stop(&self) {
		self.stops.fetch_add(1, Ordering::SeqCst);
	}

	async fn ended(&self) {
		let mut rx = self.ended.subscribe();
		let _ = rx.wait_for(|ended| *ended).await;
	}
}

pub(crate) struct FakeSurface {
	pub(crate) hang_metadata: bool,
	pub(crate) native: bool,
	tracks: Vec<Arc<FakeTrack>>,
	plays: AtomicUsize,
	releases: AtomicUsize,
}

impl FakeSurface {
	pub(crate) fn native(tracks: Vec<Arc<FakeTrack>>) -> Arc<Self> {
		Arc::new(Self {
			hang_metadata: false,
			native: true,
			tracks,
			plays: AtomicUsize::new(0),
			releases: AtomicUsize::new(0),
		})
	}

	pub(crate) fn without_native_capture() -> Arc<Self> {
		Arc::new(Self {
			hang_metadata: false,
			native: false,
			tracks: Vec::new(),
			plays: AtomicUsize::new(0),
			releases: AtomicUsize::new(0),
		})
	}

	pub(crate) fn hanging() -> Arc<Self> {
		Arc::new(Self {
			hang_metadata: true,
			native: true,
			tracks: Vec::new(),
			plays: AtomicUsize::new(0),
			releases: AtomicUsize::new(0),
		})
	}

	pub(crate) fn plays(&self) -> usize {
		self.plays.load(Ordering::SeqCst)
	}

	pub(crate) fn releases(&self) -> usize {
		self.releases.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PlaybackSurface for FakeSurface {
	async fn wait_for_metadata(&self) -> std::result::Result<VideoDimensions, CaptureError> {
		if self.hang_metadata {
			std::future::pending::<()>().await;
		}
		Ok(VideoDimensions { width: 640, height: 360 })
	}

	async fn play_looped(&self) -> std::result::Result<(), CaptureError> {
		self.plays.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn supports_native_capture(&self) -> bool {
		self.native
	}

	fn capture_stream(&self) -> std::result::Result<MediaStream, CaptureError> {
		Ok(stream_of(&self.tracks))
	}

	fn release(&self) {
		self.releases.fetch_add(1, Ordering::SeqCst);
	}
}

pub(crate) struct FakeCanvas {
	pub(crate) track: Arc<FakeTrack>,
	pub(crate) dimensions: VideoDimensions,
	draws: AtomicUsize,
	releases: AtomicUsize,
	captured_at: Mutex<Option<u32>>,
}

impl FakeCanvas {
	pub(crate) fn draws(&self) -> usize {
		self.draws.load(Ordering::SeqCst)
	}

	pub(crate) fn releases(&self) -> usize {
		self.releases.load(Ordering::SeqCst)
	}

	pub(crate) fn captured_at(&self) -> Option<u32> {
		*self.captured_at.lock()
	}
}

impl Canvas for FakeCanvas {
	fn draw_frame(&self, _surface: &dyn PlaybackSurface) {
		self.draws.fetch_add(1, Ordering::SeqCst);
	}

	fn capture_stream(&self, fps: u32) -> std::result::Result<MediaStream, CaptureError> {
		*self.captured_at.lock() = Some(fps);
		Ok(stream_of(std::slice::from_ref(&self.track)))
	}

	fn release(&self) {
		self.releases.fetch_add(1, Ordering::SeqCst);
	}
}

/// Camera/display/file primitives backed by fixed tracks.
#[derive(Default)]
pub(crate) struct FakeDevices {
	pub(crate) display_supported: bool,
	pub(crate) display_error: Option<CaptureError>,
	pub(crate) tracks: Vec<Arc<FakeTrack>>,
	pub(crate) file: Option<Arc<FakeSurface>>,
	camera_calls: AtomicUsize,
	display_calls: AtomicUsize,
	file_calls: AtomicUsize,
	camera_requests: Mutex<Vec<CameraRequest>>,
	canvas: Mutex<Option<Arc<FakeCanvas>>>,
}

impl FakeDevices {
	pub(crate) fn with_tracks(tracks: Vec<Arc<FakeTrack>>) -> Self {
		Self {
			display_supported: true,
			tracks,
			..Default::default()
		}
	}

	pub(crate) fn with_file(surface: Arc<FakeSurface>) -> Self {
		Self {
			display_supported: true,
			file: Some(surface),
			..Default::default()
		}
	}

	pub(crate) fn camera_calls(&self) -> usize {
		self.camera_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn display_calls(&self) -> usize {
		self.display_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn file_calls(&self) -> usize {
		self.file_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn total_calls(&self) -> usize {
		self.camera_calls() + self.display_calls() + self.file_calls()
	}

	pub(crate) fn camera_requests(&self) -> Vec<CameraRequest> {
		self.camera_requests.lock().clone()
	}

	pub(crate) fn canvas(&self) -> Option<Arc<FakeCanvas>> {
		self.canvas.lock().clone()
	}
}

#[async_trait]
impl MediaDevices for FakeDevices {
	fn supports_display_capture(&self) -> bool {
		self.display_supported
	}

	async fn open_camera(&self, request: CameraRequest) -> std::result::Result<MediaStream, CaptureError> {
		self.camera_calls.fetch_add(1, Ordering::SeqCst);
		self.camera_requests.lock().push(request);
		Ok(stream_of(&self.tracks))
	}

	async fn open_display(&self) -> std::result::Result<MediaStream, CaptureError> {
		self.display_calls.fetch_add(1, Ordering::SeqCst);
		match &self.display_error {
			Some(err) => Err(err.clone()),
			None => Ok(stream_of(&self.tracks)),
		}
	}

	async fn load_file(&self, path: &Path) -> std::result::Result<Arc<dyn PlaybackSurface>, CaptureError> {
		self.file_calls.fetch_add(1, Ordering::SeqCst);
		match &self.file {
			Some(surface) => Ok(Arc::clone(surface) as Arc<dyn PlaybackSurface>),
			None => Err(CaptureError::NotFound(path.display().to_string())),
		}
	}

	fn create_canvas(&self, dimensions: VideoDimensions) -> std::result::Result<Arc<dyn Canvas>, CaptureError> {
		let canvas = Arc::new(FakeCanvas {
			track: FakeTrack::video("canvas"),
			dimensions,
			draws: AtomicUsize::new(0),
			releases: AtomicUsize::new(0),
			captured_at: Mutex::new(None),
		});
		*self.canvas.lock() = Some(Arc::clone(&canvas));
		Ok(canvas)
	}
}

#[derive(Default)]
pub(crate) struct FakeTransport {
	skip_local_description: bool,
	added: Mutex<Vec<String>>,
	local: Mutex<Option<SessionDescription>>,
	remote: Mutex<Option<SessionDescription>>,
	closes: AtomicUsize,
}

impl FakeTransport {
	pub(crate) fn added_tracks(&self) -> Vec<String> {
		self.added.lock().clone()
	}

	pub(crate) fn remote_description(&self) -> Option<SessionDescription> {
		self.remote.lock().clone()
	}

	pub(crate) fn closes(&self) -> usize {
		self.closes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl PeerTransport for FakeTransport {
	async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<()> {
		self.added.lock().push(track.id().to_string());
		Ok(())
	}

	async fn create_offer(&self) -> Result<SessionDescription> {
		Ok(SessionDescription::offer("v=0 offer"))
	}

	async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
		if !self.skip_local_description {
			*self.local.lock() = Some(description);
		}
		Ok(())
	}

	fn local_description(&self) -> Option<SessionDescription> {
		self.local.lock().clone()
	}

	async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
		*self.remote.lock() = Some(description);
		Ok(())
	}

	async fn close(&self) {
		self.closes.fetch_add(1, Ordering::SeqCst);
	}
}

#[derive(Default)]
pub(crate) struct FakeTransportFactory {
	skip_local_description: bool,
	creates: AtomicUsize,
	last: Mutex<Option<Arc<FakeTransport>>>,
	ice_servers: Mutex<Vec<IceServer>>,
	sink: Mutex<Option<TransportEventSink>>,
}

impl FakeTransportFactory {
	pub(crate) fn without_local_description() -> Self {
		Self {
			skip_local_description: true,
			..Default::default()
		}
	}

	pub(crate) fn creates(&self) -> usize {
		self.creates.load(Ordering::SeqCst)
	}

	/// The most recently created transport.
	pub(crate) fn last(&self) -> Arc<FakeTransport> {
		self.last.lock().clone().expect("no transport created")
	}

	pub(crate) fn ice_servers(&self) -> Vec<IceServer> {
		self.ice_servers.lock().clone()
	}

	pub(crate) fn emit(&self, event: TransportEvent) {
		if let Some(sink) = self.sink.lock().clone() {
			sink(event);
		}
	}
}

impl TransportFactory for FakeTransportFactory {
	fn create(&self, ice_servers: &[IceServer], events: TransportEventSink) -> Result<Arc<dyn PeerTransport>> {
		self.creates.fetch_add(1, Ordering::SeqCst);
		*self.ice_servers.lock() = ice_servers.to_vec();
		*self.sink.lock() = Some(events);
		let transport = Arc::new(FakeTransport {
			skip_local_description: self.skip_local_description,
			..Default::default()
		});
		*self.last.lock() = Some(Arc::clone(&transport));
		Ok(transport)
	}
}

pub(crate) fn default_response() -> CreateStreamResponse {
	CreateStreamResponse {
		stream_id: "stream-1".into(),
		webrtc_answer: Some(SessionDescription::answer("v=0 answer")),
		lease: Some(LeaseInfo { ttl_seconds: 30.0 }),
		relay_servers: None,
	}
}

/// Stream API with scripted responses.
pub(crate) struct FakeApi {
	create: Mutex<Result<CreateStreamResponse>>,
	create_delay: Mutex<Option<Duration>>,
	renew_error: Mutex<Option<Error>>,
	requests: Mutex<Vec<CreateStreamRequest>>,
	renewals: AtomicUsize,
	closed: Mutex<Vec<String>>,
	prompts: Mutex<Vec<String>>,
}

impl Default for FakeApi {
	fn default() -> Self {
		Self {
			create: Mutex::new(Ok(default_response())),
			create_delay: Mutex::new(None),
			renew_error: Mutex::new(None),
			requests: Mutex::new(Vec::new()),
			renewals: AtomicUsize::new(0),
			closed: Mutex::new(Vec::new()),
			prompts: Mutex::new(Vec::new()),
		}
	}
}

impl FakeApi {
	pub(crate) fn respond_with(&self, response: CreateStreamResponse) {
		*self.create.lock() = Ok(response);
	}

	pub(crate) fn fail_create(&self, err: Error) {
		*self.create.lock() = Err(err);
	}

	pub(crate) fn delay_create(&self, delay: Duration) {
		*self.create_delay.lock() = Some(delay);
	}

	pub(crate) fn fail_renewals(&self, err: Error) {
		*self.renew_error.lock() = Some(err);
	}

	pub(crate) fn requests(&self) -> Vec<CreateStreamRequest> {
		self.requests.lock().clone()
	}

	pub(crate) fn renewals(&self) -> usize {
		self.renewals.load(Ordering::SeqCst)
	}

	pub(crate) fn closed(&self) -> Vec<String> {
		self.closed.lock().clone()
	}

	pub(crate) fn prompts(&self) -> Vec<String> {
		self.prompts.lock().clone()
	}
}

#[async_trait]
impl StreamApi for FakeApi {
	async fn create_stream(&self, request: &CreateStreamRequest) -> Result<CreateStreamResponse> {
		self.requests.lock().push(request.clone());
		let delay = *self.create_delay.lock();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		self.create.lock().clone()
	}

	async fn renew_lease(&self, stream_id: &str) -> Result<KeepaliveResponse> {
		self.renewals.fetch_add(1, Ordering::SeqCst);
		if let Some(err) = self.renew_error.lock().clone() {
			return Err(err);
		}
		Ok(KeepaliveResponse {
			status: "ok".into(),
			stream_id: stream_id.into(),
			ttl_seconds: 30.0,
		})
	}

	async fn update_prompt(&self, stream_id: &str, prompt: &str) -> Result<StreamConfigEcho> {
		self.prompts.lock().push(prompt.to_string());
		Ok(StreamConfigEcho {
			stream_id: Some(stream_id.to_string()),
			prompt: prompt.to_string(),
			extra: serde_json::Map::new(),
		})
	}

	async fn close_stream(&self, stream_id: &str) -> Result<CloseResponse> {
		self.closed.lock().push(stream_id.to_string());
		Ok(CloseResponse { status: "ok".into() })
	}
}

struct Link {
	frames: mpsc::UnboundedSender<ChannelFrame>,
}

/// Result channel connector backed by in-memory frames.
#[derive(Default)]
pub(crate) struct FakeConnector {
	echo_close: bool,
	fail: Mutex<Option<Error>>,
	urls: Mutex<Vec<Url>>,
	link: Mutex<Option<Link>>,
	sent: Arc<Mutex<Vec<String>>>,
	closes: Arc<AtomicUsize>,
}

impl FakeConnector {
	/// Answers a local close with a normal close frame, like a real server.
	pub(crate) fn echoing_close() -> Self {
		Self {
			echo_close: true,
			..Default::default()
		}
	}

	pub(crate) fn fail_with(&self, err: Error) {
		*self.fail.lock() = Some(err);
	}

	pub(crate) fn push(&self, frame: ChannelFrame) {
		if let Some(link) = self.link.lock().as_ref() {
			let _ = link.frames.send(frame);
		}
	}

	pub(crate) fn urls(&self) -> Vec<Url> {
		self.urls.lock().clone()
	}

	pub(crate) fn connects(&self) -> usize {
		self.urls.lock().len()
	}

	pub(crate) fn sent(&self) -> Vec<String> {
		self.sent.lock().clone()
	}

	pub(crate) fn closes(&self) -> usize {
		self.closes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ChannelConnector for FakeConnector {
	async fn connect(&self, url: &Url) -> Result<ChannelParts> {
		self.urls.lock().push(url.clone());
		if let Some(err) = self.fail.lock().clone() {
			return Err(err);
		}
		let (tx, frames) = mpsc::unbounded_channel();
		*self.link.lock() = Some(Link { frames: tx.clone() });
		Ok(ChannelParts {
			sender: Box::new(FakeSender {
				sent: Arc::clone(&self.sent),
				closes: Arc::clone(&self.closes),
				echo: self.echo_close.then_some(tx),
			}),
			frames,
		})
	}
}

struct FakeSender {
	sent: Arc<Mutex<Vec<String>>>,
	closes: Arc<AtomicUsize>,
	echo: Option<mpsc::UnboundedSender<ChannelFrame>>,
}

#[async_trait]
impl ChannelSender for FakeSender {
	async fn send_text(&mut self, text: String) -> Result<()> {
		self.sent.lock().push(text);
		Ok(())
	}

	async fn close(&mut self) -> Result<()> {
		self.closes.fetch_add(1, Ordering::SeqCst);
		if let Some(echo) = &self.echo {
			let _ = echo.send(ChannelFrame::Closed {
				code: 1000,
				reason: "client closing".into(),
			});
		}
		Ok(())
	}
}
