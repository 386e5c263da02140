//! vistream runtime - service client, result channel transport, and errors
//!
//! This crate provides the I/O layer the session coordinator sits on:
//!
//! - **Stream API**: registration, lease renewal, prompt update, and close over HTTP
//! - **Result channel**: WebSocket transport delivering raw frames to the session layer
//! - **Errors**: the typed error taxonomy shared by every vistream crate
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  vistream    │  Session coordinator, media, negotiation
//! └──────┬───────┘
//!        │ StreamApi / ChannelConnector
//! ┌──────▼───────┐
//! │  runtime     │  This crate
//! │  ┌────────┐  │
//! │  │ api    │  │  reqwest, bearer auth, status mapping
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ channel│  │  tokio-tungstenite frames
//! │  └────────┘  │
//! └──────────────┘
//! ```
//!
//! Both seams are traits so the session layer can be exercised against
//! in-memory fakes.

pub mod api;
pub mod channel;
pub mod error;

pub use api::{HttpStreamApi, StreamApi, parse_base_url};
pub use channel::{
	ABNORMAL_CLOSE_CODE, AUTH_REJECTED_CLOSE_CODE, ChannelConnector, ChannelFrame, ChannelParts, ChannelSender, WebSocketConnector, result_channel_url,
};
pub use error::{Error, Result};
