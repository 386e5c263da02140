//! Result channel state machine.
//!
//! Opening a [`ResultChannel`] connects, sends the [`ChannelAuth`] message
//! first, and spawns a reader that turns frames into callbacks:
//!
//! | Frame | Effect |
//! |-------|--------|
//! | valid result | `on_result` |
//! | unparsable text | `on_error(MalformedResult)`, channel stays open |
//! | close / transport error | state `Closed`, `on_terminated` once |

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use url::Url;
use vistream_protocol::{ChannelAuth, InferenceResult};
use vistream_runtime::{ABNORMAL_CLOSE_CODE, ChannelConnector, ChannelFrame, ChannelSender, Error, Result};

/// Lifecycle of a result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
	Connecting,
	Open,
	Closed,
}

/// Why a channel stopped delivering results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTermination {
	Closed { code: u16, reason: String },
	Failed(String),
}

/// Callback invoked for every parsed result.
pub type ResultHandler = Arc<dyn Fn(InferenceResult) + Send + Sync>;

/// Callback invoked with session errors.
pub type ErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// Callbacks wired into a channel's reader.
#[derive(Clone)]
pub struct ChannelHandlers {
	pub on_result: ResultHandler,
	/// Receives [`Error::MalformedResult`] only.
	pub on_error: ErrorHandler,
	pub on_terminated: Arc<dyn Fn(ChannelTermination) + Send + Sync>,
}

/// An authenticated result channel.
pub struct ResultChannel {
	state: Arc<Mutex<ChannelState>>,
	sender: Option<Box<dyn ChannelSender>>,
	reader: Option<JoinHandle<()>>,
}

impl ResultChannel {
	/// Connects to `url` and authenticates with `api_key`.
	pub async fn open(connector: &dyn ChannelConnector, url: &Url, api_key: &str, handlers: ChannelHandlers) -> Result<Self> {
		let state = Arc::new(Mutex::new(ChannelState::Connecting));
		let mut parts = connector.connect(url).await?;

		let auth = serde_json::to_string(&ChannelAuth {
			api_key: api_key.to_string(),
		})?;
		if let Err(err) = parts.sender.send_text(auth).await {
			let _ = parts.sender.close().await;
			return Err(err);
		}
		*state.lock() = ChannelState::Open;
		debug!(target = "vistream", url = %url, "result channel open");

		let reader_state = Arc::clone(&state);
		let mut frames = parts.frames;
		let reader = tokio::spawn(async move {
			let termination = loop {
				match frames.recv().await {
					Some(ChannelFrame::Text(text)) => dispatch(&text, &handlers),
					Some(ChannelFrame::Closed { code, reason }) => break ChannelTermination::Closed { code, reason },
					Some(ChannelFrame::Failed(message)) => break ChannelTermination::Failed(message),
					None => {
						break ChannelTermination::Closed {
							code: ABNORMAL_CLOSE_CODE,
							reason: "frame stream ended".to_string(),
						};
					}
				}
			};
			*reader_state.lock() = ChannelState::Closed;
			debug!(target = "vistream", termination = ?termination, "result channel terminated");
			(handlers.on_terminated)(termination);
		});

		Ok(Self {
			state,
			sender: Some(parts.sender),
			reader: Some(reader),
		})
	}

	pub fn state(&self) -> ChannelState {
		*self.state.lock()
	}

	/// Closes the channel without reporting a termination.
	pub async fn close(&mut self) {
		*self.state.lock() = ChannelState::Closed;
		if let Some(reader) = self.reader.take() {
			reader.abort();
		}
		if let Some(mut sender) = self.sender.take() {
			if let Err(err) = sender.close().await {
				debug!(target = "vistream", error = %err, "result channel close failed");
			}
		}
	}
}

fn dispatch(text: &str, handlers: &ChannelHandlers) {
	match serde_json::from_str::<InferenceResult>(text) {
		Ok(result) => {
			trace!(target = "vistream", id = %result.id, ok = result.ok, "inference result");
			(handlers.on_result)(result);
		}
		Err(err) => {
			debug!(target = "vistream", error = %err, "dropping malformed result message");
			(handlers.on_error)(Error::MalformedResult(err.to_string()));
		}
	}
}

impl Drop for ResultChannel {
	fn drop(&mut self) {
		if let Some(reader) = self.reader.take() {
			reader.abort();
		}
	}
}

impl std::fmt::Debug for ResultChannel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResultChannel").field("state", &self.state()).finish_non_exhaustive()
	}
}
