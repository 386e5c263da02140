//! Wire types for the vistream inference service.
//!
//! This crate contains only serde types; it performs no I/O. Everything the
//! client sends or receives over HTTP or the result channel is defined here:
//!
//! - [`CreateStreamRequest`] / [`CreateStreamResponse`] - session registration
//! - [`ProcessingConfig`] - clip or frame processing parameters
//! - [`KeepaliveResponse`], [`PromptUpdateRequest`], [`CloseResponse`] - lease and lifecycle calls
//! - [`InferenceResult`] and [`ChannelAuth`] - result channel messages
//! - [`ApiErrorBody`] - error payload returned with any non-2xx status

pub mod processing;
pub mod result;
pub mod stream;
pub mod types;

pub use processing::{ClipProcessing, FrameProcessing, ProcessingConfig, ProcessingMode};
pub use result::{ChannelAuth, InferenceResult};
pub use stream::{
	ApiErrorBody, CloseResponse, CreateStreamRequest, CreateStreamResponse, InferenceParams, KeepaliveResponse, LeaseInfo, PromptUpdateRequest,
	StreamConfigEcho,
};
pub use types::{Backend, IceServer, SdpType, SessionDescription, SourceTransport};
