//! vistream: client-side coordinator for real-time video inference sessions
//!
//! A session captures (or references) a video source, negotiates a media
//! transport with the inference service, registers the stream, keeps its
//! lease alive, and delivers inference results as they arrive.
//!
//! # Example
//!
//! ```ignore
//! use vistream::{SessionConfig, SessionCoordinator};
//!
//! let config: SessionConfig = serde_json::from_str(&std::fs::read_to_string("session.json")?)?;
//! let session = SessionCoordinator::builder(config)
//!     .on_result(|result| println!("{}", result.result))
//!     .on_error(|err| eprintln!("session error: {err}"))
//!     .build()?;
//!
//! let handle = session.start().await?;
//! println!("streaming as {}", handle.stream_id);
//!
//! session.update_prompt("count the bicycles").await?;
//! session.stop().await;
//! ```
//!
//! # Modules
//!
//! - [`config`] / [`validate`] - session configuration, defaults, and checks
//! - [`media`] - capture capability traits and the source acquirer
//! - [`transport`] - media transport negotiation
//! - [`registrar`] - registration payload and call
//! - [`keepalive`] - lease renewal
//! - [`channel`] - result channel state machine
//! - [`session`] - the coordinator tying it all together
//!
//! Platform capture and peer-connection primitives are traits; relay
//! sources need neither.

pub mod channel;
pub mod config;
pub mod keepalive;
pub mod media;
pub mod registrar;
pub mod session;
pub mod transport;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ChannelState, ChannelTermination, ErrorHandler, ResultChannel, ResultHandler};
pub use config::{Bounds, CameraFacing, ClipOptions, FrameOptions, InferenceConfig, ProcessingOptions, SessionConfig, SessionDefaults, SourceDescriptor};
pub use keepalive::{KeepaliveState, LeaseKeepalive};
pub use media::{AcquiredMedia, CameraRequest, Canvas, CaptureError, MediaDevices, MediaStream, MediaTrack, PlaybackSurface, TrackKind, VideoDimensions};
pub use registrar::SessionHandle;
pub use session::{SessionBuilder, SessionCoordinator, SessionEvent, SessionState};
pub use transport::{ConnectionState, Negotiator, PeerTransport, TransportEvent, TransportEventSink, TransportFactory};
pub use validate::Capabilities;
pub use vistream_protocol::{Backend, IceServer, InferenceResult, SessionDescription, StreamConfigEcho};
pub use vistream_runtime::{Error, Result};
