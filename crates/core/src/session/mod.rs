//! Session coordinator.
//!
//! A [`SessionCoordinator`] owns one session from `start` to `stop`:
//!
//! ```text
//! Idle ──start──▶ Starting ──ready──▶ Active
//!                    │                  │
//!                    └──fail/stop───────┴──▶ Stopping ──▶ Stopped
//! ```
//!
//! # Start
//!
//! Local sources are captured, attached to a new transport, and offered;
//! relay sources skip straight to registration. The answer from
//! registration is applied, then the lease keepalive and the result channel
//! are started. Every resource is recorded as soon as it exists, so a
//! failure at any step releases exactly what was acquired.
//!
//! # Events
//!
//! Background tasks (keepalive, channel reader, track watcher, transport)
//! never tear anything down themselves. They send a [`SessionEvent`] to the
//! coordinator's event loop, which is the only place that turns an event
//! into a state transition.
//!
//! # Teardown
//!
//! Teardown is claimed by the first caller that moves the state from
//! `Starting`/`Active` to `Stopping`; everyone else waits for `Stopped`.
//! Release order: remote close (bounded, best effort), keepalive, channel,
//! transport, tracks, file surfaces.

mod builder;
mod events;


use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use vistream_protocol::{IceServer, SourceTransport, StreamConfigEcho};
use vistream_runtime::{ChannelConnector, Error, Result, StreamApi, result_channel_url};

pub use builder::SessionBuilder;
pub use events::SessionEvent;

use crate::channel::{ChannelHandlers, ErrorHandler, ResultChannel, ResultHandler};
use crate::config::{SessionConfig, SessionDefaults, SourceDescriptor};
use crate::keepalive::LeaseKeepalive;
use crate::media::{self, AcquiredMedia, MediaDevices, MediaTrack};
use crate::registrar::{self, SessionHandle};
use crate::transport::{Negotiator, TransportEventSink, TransportFactory};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	Starting,
	Active,
	Stopping,
	Stopped,
}

impl SessionState {
	/// `Starting` or `Active`: resources may be held and teardown is possible.
	pub fn is_running(self) -> bool {
		matches!(self, SessionState::Starting | SessionState::Active)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Idle => "idle",
			SessionState::Starting => "starting",
			SessionState::Active => "active",
			SessionState::Stopping => "stopping",
			SessionState::Stopped => "stopped",
		}
	}
}

impl std::fmt::Display for SessionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Runs one inference session.
///
/// A coordinator is single-use: after `Stopped` it cannot be restarted.
/// Dropping a running coordinator inside a tokio runtime stops it in the
/// background.
pub struct SessionCoordinator {
	inner: Arc<Inner>,
}

/// Everything [`SessionBuilder::build`] resolved.
struct Parts {
	config: SessionConfig,
	defaults: SessionDefaults,
	base_url: Url,
	api: Arc<dyn StreamApi>,
	connector: Arc<dyn ChannelConnector>,
	devices: Option<Arc<dyn MediaDevices>>,
	transports: Option<Arc<dyn TransportFactory>>,
	on_result: ResultHandler,
	on_error: ErrorHandler,
}

struct Inner {
	config: SessionConfig,
	defaults: SessionDefaults,
	base_url: Url,
	api: Arc<dyn StreamApi>,
	connector: Arc<dyn ChannelConnector>,
	devices: Option<Arc<dyn MediaDevices>>,
	transports: Option<Arc<dyn TransportFactory>>,
	on_result: ResultHandler,
	on_error: ErrorHandler,
	state: watch::Sender<SessionState>,
	events: mpsc::UnboundedSender<SessionEvent>,
	event_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
	lifecycle: Mutex<Lifecycle>,
}

struct Lifecycle {
	resources: Resources,
	/// Set once teardown has taken the resources; later acquisitions are
	/// handed back to their owner for release.
	sealed: bool,
	/// The error that ended the session, if one did.
	fatal: Option<Error>,
	handle: Option<SessionHandle>,
	detected_fps: Option<f64>,
	prompt: String,
}

#[derive(Default)]
struct Resources {
	stream_id: Option<String>,
	keepalive: Option<LeaseKeepalive>,
	channel: Option<ResultChannel>,
	negotiator: Option<Negotiator>,
	track_watch: Option<JoinHandle<()>>,
	media: Option<AcquiredMedia>,
}

impl SessionCoordinator {
	/// Validates `config` and builds a coordinator with default
	/// collaborators. Equivalent to `SessionBuilder::new(config).build()`.
	pub fn new(config: SessionConfig) -> Result<Self> {
		SessionBuilder::new(config).build()
	}

	pub fn builder(config: SessionConfig) -> SessionBuilder {
		SessionBuilder::new(config)
	}

	fn from_parts(parts: Parts) -> Self {
		let Parts {
			config,
			defaults,
			base_url,
			api,
			connector,
			devices,
			transports,
			on_result,
			on_error,
		} = parts;
		let (events, event_rx) = mpsc::unbounded_channel();
		let prompt = config.inference.prompt.clone();
		Self {
			inner: Arc::new(Inner {
				config,
				defaults,
				base_url,
				api,
				connector,
				devices,
				transports,
				on_result,
				on_error,
				state: watch::Sender::new(SessionState::Idle),
				events,
				event_rx: Mutex::new(Some(event_rx)),
				lifecycle: Mutex::new(Lifecycle {
					resources: Resources::default(),
					sealed: false,
					fatal: None,
					handle: None,
					detected_fps: None,
					prompt,
				}),
			}),
		}
	}

	/// Starts the session and resolves once it is `Active`.
	///
	/// Only valid from `Idle`. On failure everything acquired so far is
	/// released, the error callback fires once, and the same error is
	/// returned. If `stop` wins the race, this resolves with
	/// [`Error::Aborted`].
	pub async fn start(&self) -> Result<SessionHandle> {
		let inner = &self.inner;
		if !inner.transition(&[SessionState::Idle], SessionState::Starting) {
			return Err(Error::InvalidState(format!("cannot start a session that is {}", inner.state())));
		}
		info!(target = "vistream", source = inner.config.source.kind(), "starting session");
		inner.spawn_event_loop();

		match inner.run_start().await {
			Ok(handle) => Ok(handle),
			Err(err) => Err(inner.abort_start(err).await),
		}
	}

	/// Stops the session and releases everything it holds.
	///
	/// Safe to call any number of times and from any state; a no-op from
	/// `Idle`. Returns once the session is `Stopped`. Release failures are
	/// logged, never returned.
	pub async fn stop(&self) {
		match self.inner.begin_teardown(None) {
			Some(resources) => {
				info!(target = "vistream", "stopping session");
				self.inner.finish_teardown(resources).await;
			}
			None => self.inner.wait_until_settled().await,
		}
	}

	/// Replaces the prompt of the running stream.
	pub async fn update_prompt(&self, prompt: &str) -> Result<StreamConfigEcho> {
		let state = self.state();
		if state != SessionState::Active {
			return Err(Error::InvalidState(format!("cannot update the prompt of a session that is {state}")));
		}
		if prompt.trim().is_empty() {
			return Err(Error::config("prompt", "must not be empty"));
		}
		let stream_id = self
			.stream_id()
			.ok_or_else(|| Error::InvalidState("session has no registered stream".to_string()))?;

		let echo = self.inner.api.update_prompt(&stream_id, prompt).await?;
		info!(target = "vistream", stream_id = %stream_id, "prompt updated");
		self.inner.lifecycle.lock().prompt = echo.prompt.clone();
		Ok(echo)
	}

	pub fn state(&self) -> SessionState {
		self.inner.state()
	}

	/// Receiver that observes every state transition.
	pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
		self.inner.state.subscribe()
	}

	pub fn is_active(&self) -> bool {
		self.state() == SessionState::Active
	}

	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}

	/// Registered stream, from registration until teardown.
	pub fn handle(&self) -> Option<SessionHandle> {
		self.inner.lifecycle.lock().handle.clone()
	}

	pub fn stream_id(&self) -> Option<String> {
		self.inner.lifecycle.lock().handle.as_ref().map(|h| h.stream_id.clone())
	}

	pub fn lease_ttl(&self) -> Option<f64> {
		self.inner.lifecycle.lock().handle.as_ref().and_then(|h| h.lease_ttl)
	}

	/// Relay-assist servers returned at registration.
	pub fn relay_servers(&self) -> Option<Vec<IceServer>> {
		self.inner.lifecycle.lock().handle.as_ref().and_then(|h| h.relay_servers.clone())
	}

	/// Frame rate probed from the local source, when it reported one.
	pub fn detected_frame_rate(&self) -> Option<f64> {
		self.inner.lifecycle.lock().detected_fps
	}

	/// The prompt the service is currently using.
	pub fn current_prompt(&self) -> String {
		self.inner.lifecycle.lock().prompt.clone()
	}
}

impl Drop for SessionCoordinator {
	fn drop(&mut self) {
		if !self.inner.state().is_running() {
			return;
		}
		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			warn!(target = "vistream", "session dropped outside a runtime while running");
			return;
		};
		let inner = Arc::clone(&self.inner);
		runtime.spawn(async move {
			if let Some(resources) = inner.begin_teardown(None) {
				debug!(target = "vistream", "stopping dropped session");
				inner.finish_teardown(resources).await;
			}
		});
	}
}

impl std::fmt::Debug for SessionCoordinator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionCoordinator")
			.field("state", &self.state())
			.field("stream_id", &self.stream_id())
			.finish_non_exhaustive()
	}
}

impl Inner {
	fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	/// Moves to `to` if the current state is one of `from`. Atomic with
	/// respect to every other transition.
	fn transition(&self, from: &[SessionState], to: SessionState) -> bool {
		self.state.send_if_modified(|state| {
			if from.contains(state) {
				debug!(target = "vistream", from = %state, to = %to, "session state");
				*state = to;
				true
			} else {
				false
			}
		})
	}

	fn ensure_starting(&self) -> Result<()> {
		if self.state() == SessionState::Starting {
			Ok(())
		} else {
			Err(Error::Aborted)
		}
	}

	/// Records a resource for teardown, or hands it back once teardown has
	/// begun.
	fn adopt<T>(&self, value: T, slot: impl FnOnce(&mut Resources) -> &mut Option<T>) -> std::result::Result<(), T> {
		let mut lifecycle = self.lifecycle.lock();
		if lifecycle.sealed {
			return Err(value);
		}
		*slot(&mut lifecycle.resources) = Some(value);
		Ok(())
	}

	fn spawn_event_loop(self: &Arc<Self>) {
		let Some(mut events) = self.event_rx.lock().take() else {
			return;
		};
		let inner = Arc::clone(self);
		tokio::spawn(async move {
			let mut state = inner.state.subscribe();
			loop {
				tokio::select! {
					Some(event) = events.recv() => inner.handle_event(event).await,
					_ = async { let _ = state.wait_for(|s| *s == SessionState::Stopped).await; } => break,
				}
			}
			debug!(target = "vistream", "session event loop finished");
		});
	}

	/// The single place where events turn into transitions.
	async fn handle_event(&self, event: SessionEvent) {
		if let SessionEvent::Transport(event) = &event {
			debug!(target = "vistream", event = ?event, "transport event");
			return;
		}
		let Some(err) = event.into_fatal_error() else {
			return;
		};
		if !self.state().is_running() {
			debug!(target = "vistream", error = %err, "ignoring event after teardown began");
			return;
		}
		self.fail(err).await;
	}

	async fn run_start(self: &Arc<Self>) -> Result<SessionHandle> {
		let (source, negotiator) = match &self.config.source {
			SourceDescriptor::Relay { url, token } => (
				SourceTransport::Relay {
					url: url.clone(),
					token: token.clone(),
				},
				None,
			),
			local => {
				let (sdp, negotiator) = self.publish_local(local).await?;
				(SourceTransport::Transport { sdp }, Some(negotiator))
			}
		};

		let detected_fps = self.lifecycle.lock().detected_fps;
		let request = registrar::build_request(&self.config, source, detected_fps, &self.defaults)?;
		let registration = registrar::register(self.api.as_ref(), &request).await?;
		let handle = registration.handle;
		if !self.adopt_registration(&handle) {
			self.close_remote(&handle.stream_id).await;
			return Err(Error::Aborted);
		}
		info!(
			target = "vistream",
			stream_id = %handle.stream_id,
			lease_ttl = ?handle.lease_ttl,
			"stream registered"
		);

		if let Some(negotiator) = negotiator {
			let answer = registration
				.answer
				.ok_or_else(|| Error::Transport("registration response carried no answer".to_string()))?;
			negotiator.accept_answer(answer).await?;
			self.ensure_starting()?;
		}

		if let Some(ttl) = handle.lease_ttl {
			let events = self.events.clone();
			let keepalive = LeaseKeepalive::start(Arc::clone(&self.api), handle.stream_id.clone(), ttl, move |err| {
				let _ = events.send(SessionEvent::LeaseRenewalFailed(err));
			});
			if self.adopt(keepalive, |r| &mut r.keepalive).is_err() {
				return Err(Error::Aborted);
			}
		}

		let url = result_channel_url(&self.base_url, &handle.stream_id)?;
		let channel = ResultChannel::open(self.connector.as_ref(), &url, &self.config.api_key, self.channel_handlers()).await?;
		if let Err(mut channel) = self.adopt(channel, |r| &mut r.channel) {
			channel.close().await;
			return Err(Error::Aborted);
		}

		if !self.transition(&[SessionState::Starting], SessionState::Active) {
			return Err(Error::Aborted);
		}
		info!(target = "vistream", stream_id = %handle.stream_id, "session active");
		Ok(handle)
	}

	/// Captures local media and produces the transport offer SDP.
	async fn publish_local(self: &Arc<Self>, source: &SourceDescriptor) -> Result<(String, Negotiator)> {
		let (Some(devices), Some(transports)) = (&self.devices, &self.transports) else {
			return Err(Error::InvalidState(format!(
				"{} source needs media devices and a transport factory",
				source.kind()
			)));
		};

		let acquired = media::acquire(devices.as_ref(), source, &self.defaults).await?;
		let track = acquired
			.video_track()
			.ok_or_else(|| Error::Source(format!("{} stream has no video track", source.kind())))?;
		let detected_fps = media::probe_frame_rate(acquired.stream());
		info!(
			target = "vistream",
			source = source.kind(),
			track = track.id(),
			fps = ?detected_fps,
			"media acquired"
		);
		self.lifecycle.lock().detected_fps = detected_fps;
		if self.adopt(acquired, |r| &mut r.media).is_err() {
			return Err(Error::Aborted);
		}

		if matches!(source, SourceDescriptor::Screen) {
			let watcher = self.watch_track_end(Arc::clone(&track));
			if let Err(watcher) = self.adopt(watcher, |r| &mut r.track_watch) {
				watcher.abort();
				return Err(Error::Aborted);
			}
		}
		self.ensure_starting()?;

		let ice_servers = self.config.ice_servers.as_deref().unwrap_or(self.defaults.ice_servers.as_slice());
		let negotiator = Negotiator::open(transports.as_ref(), ice_servers, self.transport_sink())?;
		if let Err(negotiator) = self.adopt(negotiator.clone(), |r| &mut r.negotiator) {
			negotiator.close().await;
			return Err(Error::Aborted);
		}

		let offer = negotiator.offer(track).await?;
		self.ensure_starting()?;
		Ok((offer.sdp, negotiator))
	}

	fn adopt_registration(&self, handle: &SessionHandle) -> bool {
		let mut lifecycle = self.lifecycle.lock();
		if lifecycle.sealed {
			return false;
		}
		lifecycle.resources.stream_id = Some(handle.stream_id.clone());
		lifecycle.handle = Some(handle.clone());
		true
	}

	fn watch_track_end(&self, track: Arc<dyn MediaTrack>) -> JoinHandle<()> {
		let events = self.events.clone();
		tokio::spawn(async move {
			track.ended().await;
			let _ = events.send(SessionEvent::TrackEnded {
				track_id: track.id().to_string(),
			});
		})
	}

	fn transport_sink(&self) -> TransportEventSink {
		let events = self.events.clone();
		Arc::new(move |event| {
			let _ = events.send(SessionEvent::Transport(event));
		})
	}

	fn channel_handlers(&self) -> ChannelHandlers {
		let events = self.events.clone();
		ChannelHandlers {
			on_result: Arc::clone(&self.on_result),
			on_error: Arc::clone(&self.on_error),
			on_terminated: Arc::new(move |termination| {
				let _ = events.send(SessionEvent::ChannelTerminated(termination));
			}),
		}
	}

	/// Resolves a failed start into the error `start` should return.
	async fn abort_start(&self, err: Error) -> Error {
		if !matches!(err, Error::Aborted) && self.fail(err.clone()).await {
			return err;
		}
		// another path claimed teardown; report what ended the session
		self.wait_until_settled().await;
		self.lifecycle.lock().fatal.clone().unwrap_or(Error::Aborted)
	}

	/// Tears the session down for `err` and reports it, unless teardown was
	/// already claimed.
	async fn fail(&self, err: Error) -> bool {
		let Some(resources) = self.begin_teardown(Some(err.clone())) else {
			debug!(target = "vistream", error = %err, "session already stopping");
			return false;
		};
		error!(target = "vistream", error = %err, "session failed");
		self.finish_teardown(resources).await;
		(self.on_error)(err);
		true
	}

	/// Claims teardown. Returns the resources to release, or `None` if the
	/// session is not running or another caller got there first.
	fn begin_teardown(&self, fatal: Option<Error>) -> Option<Resources> {
		if !self.transition(&[SessionState::Starting, SessionState::Active], SessionState::Stopping) {
			return None;
		}
		let mut lifecycle = self.lifecycle.lock();
		lifecycle.sealed = true;
		lifecycle.fatal = fatal;
		lifecycle.handle = None;
		Some(std::mem::take(&mut lifecycle.resources))
	}

	async fn finish_teardown(&self, mut resources: Resources) {
		if let Some(stream_id) = resources.stream_id.take() {
			self.close_remote(&stream_id).await;
		}
		if let Some(mut keepalive) = resources.keepalive.take() {
			keepalive.cancel();
		}
		if let Some(mut channel) = resources.channel.take() {
			channel.close().await;
		}
		if let Some(negotiator) = resources.negotiator.take() {
			negotiator.close().await;
		}
		if let Some(watcher) = resources.track_watch.take() {
			watcher.abort();
		}
		if let Some(mut media) = resources.media.take() {
			media.stop_tracks();
			media.release_surfaces();
		}
		self.state.send_replace(SessionState::Stopped);
		info!(target = "vistream", "session stopped");
	}

	async fn close_remote(&self, stream_id: &str) {
		match tokio::time::timeout(self.defaults.close_timeout, self.api.close_stream(stream_id)).await {
			Ok(Ok(response)) => debug!(target = "vistream", stream_id, status = %response.status, "stream closed"),
			Ok(Err(err)) => warn!(target = "vistream", stream_id, error = %err, "remote close failed"),
			Err(_) => warn!(
				target = "vistream",
				stream_id,
				timeout_ms = u64::try_from(self.defaults.close_timeout.as_millis()).unwrap_or(u64::MAX),
				"remote close timed out"
			),
		}
	}

	async fn wait_until_settled(&self) {
		let mut state = self.state.subscribe();
		let _ = state.wait_for(|s| matches!(s, SessionState::Idle | SessionState::Stopped)).await;
	}
}
