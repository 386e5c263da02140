//! Point-to-point media transport negotiation.
//!
//! [`PeerTransport`] abstracts the platform peer connection; [`Negotiator`]
//! drives the offer side of the exchange: attach the video track, create and
//! apply the offer, hand it to registration, then apply the service's answer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;
use vistream_protocol::{IceServer, SdpType, SessionDescription};
use vistream_runtime::{Error, Result};

use crate::media::MediaTrack;

/// Connection state reported by the platform transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	New,
	Connecting,
	Connected,
	Disconnected,
	Failed,
	Closed,
}

/// Diagnostic notification from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	CandidateDiscovered { candidate: String },
	GatheringComplete,
	ConnectionStateChanged(ConnectionState),
}

/// Receives transport events; must not block.
pub type TransportEventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Platform peer connection.
#[async_trait]
pub trait PeerTransport: Send + Sync {
	async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<()>;

	async fn create_offer(&self) -> Result<SessionDescription>;

	async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

	/// The applied local description, once there is one.
	fn local_description(&self) -> Option<SessionDescription>;

	async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

	async fn close(&self);
}

/// Creates peer transports.
pub trait TransportFactory: Send + Sync {
	fn create(&self, ice_servers: &[IceServer], events: TransportEventSink) -> Result<Arc<dyn PeerTransport>>;
}

/// Offer-side negotiation over one [`PeerTransport`].
///
/// Clones share the transport; [`close`](Self::close) takes effect once.
#[derive(Clone)]
pub struct Negotiator {
	transport: Arc<dyn PeerTransport>,
	closed: Arc<AtomicBool>,
}

impl Negotiator {
	/// Creates a transport configured with `ice_servers`.
	pub fn open(factory: &dyn TransportFactory, ice_servers: &[IceServer], events: TransportEventSink) -> Result<Self> {
		debug!(target = "vistream", servers = ice_servers.len(), "creating transport");
		Ok(Self {
			transport: factory.create(ice_servers, events)?,
			closed: Arc::new(AtomicBool::new(false)),
		})
	}

	/// Attaches `track` (send-only) and produces the local offer.
	pub async fn offer(&self, track: Arc<dyn MediaTrack>) -> Result<SessionDescription> {
		self.transport.add_track(track).await?;
		let offer = self.transport.create_offer().await?;
		self.transport.set_local_description(offer).await?;
		self.transport
			.local_description()
			.ok_or_else(|| Error::Transport("no local description after applying the offer".to_string()))
	}

	/// Applies the service's answer.
	pub async fn accept_answer(&self, answer: SessionDescription) -> Result<()> {
		if answer.kind != SdpType::Answer {
			return Err(Error::Transport(format!("expected an answer, got {:?}", answer.kind)));
		}
		self.transport.set_remote_description(answer).await
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	pub async fn close(&self) {
		if !self.closed.swap(true, Ordering::AcqRel) {
			debug!(target = "vistream", "closing transport");
			self.transport.close().await;
		}
	}
}

impl std::fmt::Debug for Negotiator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Negotiator").field("closed", &self.is_closed()).finish_non_exhaustive()
	}
}
