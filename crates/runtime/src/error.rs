//! Error types for vistream sessions.

use thiserror::Error;
use vistream_protocol::ApiErrorBody;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring, starting, or running a session.
///
/// Every payload is owned string data so the same error value can be handed to
/// the caller's error callback and returned from the pending call.
#[derive(Debug, Clone, Error)]
pub enum Error {
	/// Configuration rejected before any resource was acquired.
	#[error("invalid configuration for '{field}': {message}")]
	Configuration { field: String, message: String },

	/// Local media acquisition failed.
	#[error("media source error: {0}")]
	Source(String),

	/// The user dismissed a capture prompt (e.g., cancelled screen sharing).
	#[error("capture cancelled: {0}")]
	SourceCancelled(String),

	/// The service rejected the credential (HTTP 401 or channel auth close).
	#[error("unauthorized: {message}")]
	Unauthorized { message: String, request_id: Option<String> },

	/// The service rejected the request body (HTTP 400/422).
	#[error("validation failed: {message}")]
	Validation {
		message: String,
		request_id: Option<String>,
		details: Option<serde_json::Value>,
	},

	/// The stream or resource does not exist (HTTP 404).
	#[error("not found: {message}")]
	NotFound { message: String, request_id: Option<String> },

	/// The service failed (HTTP 5xx).
	#[error("server error ({status}): {message}")]
	Server {
		status: u16,
		message: String,
		request_id: Option<String>,
	},

	/// Any other non-2xx response.
	#[error("API error ({status}): {message}")]
	Api {
		status: u16,
		message: String,
		request_id: Option<String>,
	},

	/// No response was received at all.
	#[error("network error: {0}")]
	Network(String),

	/// Point-to-point transport negotiation failed.
	#[error("transport error: {0}")]
	Transport(String),

	/// Result channel failed or closed while the session was active.
	#[error("result channel error: {0}")]
	Channel(String),

	/// A single inbound result message could not be parsed (non-fatal).
	#[error("malformed result message: {0}")]
	MalformedResult(String),

	/// Lease renewal failed; the session cannot continue.
	#[error("lease renewal failed: {0}")]
	Keepalive(#[source] Box<Error>),

	/// Operation not allowed in the current session state.
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// The session was stopped while `start` was still in progress.
	#[error("session stopped before it became active")]
	Aborted,

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(String),
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Json(err.to_string())
	}
}

impl Error {
	/// Creates a configuration error for `field`.
	pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
		Error::Configuration {
			field: field.into(),
			message: message.into(),
		}
	}

	/// Maps a non-2xx status and its decoded body to a typed error.
	///
	/// 401 → [`Unauthorized`](Self::Unauthorized), 400/422 →
	/// [`Validation`](Self::Validation), 404 → [`NotFound`](Self::NotFound),
	/// ≥500 → [`Server`](Self::Server), anything else → [`Api`](Self::Api).
	pub fn from_status(status: u16, body: ApiErrorBody) -> Self {
		let message = body.display_message().to_string();
		let request_id = body.request_id;
		match status {
			401 => Error::Unauthorized { message, request_id },
			400 | 422 => Error::Validation {
				message,
				request_id,
				details: body.details,
			},
			404 => Error::NotFound { message, request_id },
			s if s >= 500 => Error::Server { status, message, request_id },
			_ => Error::Api { status, message, request_id },
		}
	}

	/// Returns the HTTP status behind this error, if it came from a response.
	pub fn status(&self) -> Option<u16> {
		match self {
			Error::Unauthorized { .. } => Some(401),
			Error::NotFound { .. } => Some(404),
			Error::Server { status, .. } | Error::Api { status, .. } => Some(*status),
			Error::Keepalive(inner) => inner.status(),
			_ => None,
		}
	}

	/// Returns the service-assigned request id, when the response carried one.
	pub fn request_id(&self) -> Option<&str> {
		match self {
			Error::Unauthorized { request_id, .. }
			| Error::Validation { request_id, .. }
			| Error::NotFound { request_id, .. }
			| Error::Server { request_id, .. }
			| Error::Api { request_id, .. } => request_id.as_deref(),
			Error::Keepalive(inner) => inner.request_id(),
			_ => None,
		}
	}

	/// Returns true if this is a credential rejection.
	pub fn is_auth(&self) -> bool {
		match self {
			Error::Unauthorized { .. } => true,
			Error::Keepalive(inner) => inner.is_auth(),
			_ => false,
		}
	}

	/// Returns true if this error ends the session it occurred in.
	///
	/// Only a malformed result message leaves the session running.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Error::MalformedResult(_))
	}
}
