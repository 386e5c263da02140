//! Result channel transport.
//!
//! The session layer sees a connected channel as [`ChannelParts`]: a
//! [`ChannelSender`] for outbound text and close, and an unbounded receiver of
//! [`ChannelFrame`]s fed by a reader task. The split mirrors the
//! sender/receiver/message-channel layout of the runtime's other transports
//! and lets tests substitute an in-memory channel.
//!
//! # Frame rules
//!
//! - Text (and UTF-8 binary) messages become [`ChannelFrame::Text`]
//! - A close frame becomes [`ChannelFrame::Closed`] with its code, then the reader stops
//! - A protocol/IO error becomes [`ChannelFrame::Failed`], then the reader stops
//! - A stream that ends without a close frame becomes `Closed { code: 1006 }`

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Close code the service uses when it rejects the channel credential.
pub const AUTH_REJECTED_CLOSE_CODE: u16 = 1008;

/// Close code reported when the connection drops without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Inbound event from a result channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFrame {
	/// A text message.
	Text(String),
	/// The peer closed the connection (or it dropped).
	Closed { code: u16, reason: String },
	/// Transport-level failure.
	Failed(String),
}

/// Outbound half of a connected result channel.
#[async_trait]
pub trait ChannelSender: Send {
	/// Sends one text message.
	async fn send_text(&mut self, text: String) -> Result<()>;

	/// Initiates a normal close.
	async fn close(&mut self) -> Result<()>;
}

/// A connected result channel.
pub struct ChannelParts {
	pub sender: Box<dyn ChannelSender>,
	pub frames: mpsc::UnboundedReceiver<ChannelFrame>,
}

impl std::fmt::Debug for ChannelParts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChannelParts").finish_non_exhaustive()
	}
}

/// Opens result channels.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
	async fn connect(&self, url: &Url) -> Result<ChannelParts>;
}

/// Builds the result channel URL for `stream_id` from the API base URL.
///
/// `http` maps to `ws` and `https` to `wss`; the base path is kept, so
/// `https://api.example.com/v1` becomes `wss://api.example.com/v1/ws/streams/{id}`.
pub fn result_channel_url(base: &Url, stream_id: &str) -> Result<Url> {
	let mut url = base.clone();
	let scheme = match base.scheme() {
		"http" | "ws" => "ws",
		"https" | "wss" => "wss",
		other => return Err(Error::Channel(format!("cannot derive channel URL from scheme '{other}'"))),
	};
	url.set_scheme(scheme)
		.map_err(|_| Error::Channel(format!("cannot derive channel URL from '{base}'")))?;
	url.set_query(None);
	url.set_fragment(None);
	url.path_segments_mut()
		.map_err(|_| Error::Channel(format!("'{base}' cannot be a base URL")))?
		.pop_if_empty()
		.extend(["ws", "streams", stream_id]);
	Ok(url)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`ChannelConnector`] over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl ChannelConnector for WebSocketConnector {
	async fn connect(&self, url: &Url) -> Result<ChannelParts> {
		debug!(target = "vistream", url = %url, "connecting result channel");

		let (stream, _response) = connect_async(url.as_str()).await.map_err(map_connect_error)?;
		let (sink, mut source) = stream.split();
		let (frame_tx, frame_rx) = mpsc::unbounded_channel();

		let reader = tokio::spawn(async move {
			while let Some(message) = source.next().await {
				let frame = match message {
					Ok(Message::Text(text)) => ChannelFrame::Text(text),
					Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
						Ok(text) => ChannelFrame::Text(text),
						Err(_) => {
							debug!(target = "vistream", "ignoring non UTF-8 binary message");
							continue;
						}
					},
					Ok(Message::Close(frame)) => {
						let (code, reason) = frame
							.map(|f| (u16::from(f.code), f.reason.into_owned()))
							.unwrap_or((1005, String::new()));
						let _ = frame_tx.send(ChannelFrame::Closed { code, reason });
						return;
					}
					Ok(_) => continue,
					Err(e) => {
						let _ = frame_tx.send(ChannelFrame::Failed(e.to_string()));
						return;
					}
				};
				if frame_tx.send(frame).is_err() {
					return;
				}
			}
			let _ = frame_tx.send(ChannelFrame::Closed {
				code: ABNORMAL_CLOSE_CODE,
				reason: "connection dropped".to_string(),
			});
		});

		Ok(ChannelParts {
			sender: Box::new(WebSocketSender { sink, reader }),
			frames: frame_rx,
		})
	}
}

fn map_connect_error(err: tungstenite::Error) -> Error {
	match err {
		tungstenite::Error::Http(response) if response.status().as_u16() == 401 => Error::Unauthorized {
			message: "result channel rejected the credential".to_string(),
			request_id: None,
		},
		tungstenite::Error::Http(response) => Error::Channel(format!("handshake failed with status {}", response.status())),
		other => Error::Channel(format!("failed to connect: {other}")),
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
	reader: JoinHandle<()>,
}

#[async_trait]
impl ChannelSender for WebSocketSender {
	async fn send_text(&mut self, text: String) -> Result<()> {
		self.sink
			.send(Message::Text(text))
			.await
			.map_err(|e| Error::Channel(format!("send failed: {e}")))
	}

	async fn close(&mut self) -> Result<()> {
		let frame = CloseFrame {
			code: CloseCode::Normal,
			reason: "client closing".into(),
		};
		let sent = self.sink.send(Message::Close(Some(frame))).await;
		let _ = self.sink.close().await;
		sent.map_err(|e| Error::Channel(format!("close failed: {e}")))
	}
}

impl Drop for WebSocketSender {
	fn drop(&mut self) {
		self.reader.abort();
	}
}
