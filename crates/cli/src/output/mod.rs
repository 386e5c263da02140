//! Structured output for CLI commands.
//!
//! One-shot commands print a result envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": true,
//!   "command": "validate",
//!   "data": { ... },
//!   "timings": { "durationMs": 3 }
//! }
//! ```
//!
//! On failure `data` is replaced by `error`:
//!
//! ```json
//! {
//!   "ok": false,
//!   "command": "run",
//!   "error": { "code": "AUTH_ERROR", "message": "unauthorized: invalid api key" }
//! }
//! ```
//!
//! `run` streams inference results instead, one per line, as they arrive.


use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vistream::{Error, InferenceResult};

/// Current schema version for command output.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Pretty-printed JSON (default)
	#[default]
	Json,
	/// Newline-delimited JSON
	Ndjson,
	/// Human-readable text
	Text,
}

/// The envelope every one-shot command prints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub schema_version: Option<u32>,

	pub ok: bool,

	/// Command name (`validate`, `run`)
	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,

	/// Extra context, e.g. the offending config field or the request id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Config file failed validation
	InvalidConfig,
	/// Credential rejected by the service
	AuthError,
	/// Media source could not be used
	SourceError,
	/// Service or network failure while the session was running
	SessionError,
	/// Config file could not be read or parsed
	IoError,
	InternalError,
}

impl ErrorCode {
	/// Classifies a session error.
	pub fn for_error(err: &Error) -> Self {
		match err {
			_ if err.is_auth() => ErrorCode::AuthError,
			Error::Configuration { .. } | Error::Validation { .. } => ErrorCode::InvalidConfig,
			Error::Source(_) | Error::SourceCancelled(_) => ErrorCode::SourceError,
			Error::InvalidState(_) | Error::Aborted => ErrorCode::InternalError,
			_ => ErrorCode::SessionError,
		}
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::InvalidConfig => write!(f, "INVALID_CONFIG"),
			ErrorCode::AuthError => write!(f, "AUTH_ERROR"),
			ErrorCode::SourceError => write!(f, "SOURCE_ERROR"),
			ErrorCode::SessionError => write!(f, "SESSION_ERROR"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
		}
	}
}

/// Builder for command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn failure(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		CommandResult {
			schema_version: Some(SCHEMA_VERSION),
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
		}
	}
}

/// Converts a command failure into its structured form.
///
/// Session errors keep their classification and, where available, the
/// offending field, HTTP status, and request id. Anything else is an I/O
/// or parse problem with the config file.
pub fn command_error(err: &anyhow::Error) -> CommandError {
	let message = format!("{err:#}");
	let Some(session_err) = err.downcast_ref::<Error>() else {
		let code = if err.downcast_ref::<std::io::Error>().is_some() || err.downcast_ref::<serde_json::Error>().is_some() {
			ErrorCode::IoError
		} else {
			ErrorCode::InternalError
		};
		return CommandError {
			code,
			message,
			details: None,
		};
	};

	let mut details = serde_json::Map::new();
	if let Error::Configuration { field, .. } = session_err {
		details.insert("field".into(), field.clone().into());
	}
	if let Some(status) = session_err.status() {
		details.insert("status".into(), status.into());
	}
	if let Some(request_id) = session_err.request_id() {
		details.insert("requestId".into(), request_id.into());
	}

	CommandError {
		code: ErrorCode::for_error(session_err),
		message,
		details: (!details.is_empty()).then_some(serde_json::Value::Object(details)),
	}
}

/// Prints a command result to stdout.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if result.ok {
		if let Some(ref data) = result.data {
			if let Ok(json) = serde_json::to_string_pretty(data) {
				let _ = writeln!(stdout, "{json}");
			}
		}
	} else if let Some(ref error) = result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
	}
}

/// Prints one streamed inference result.
///
/// JSON formats emit exactly one compact line per result so the output can
/// be piped into line-oriented tools.
pub fn print_inference(result: &InferenceResult, format: OutputFormat) {
	let mut stdout = io::stdout().lock();
	match format {
		OutputFormat::Json | OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				let _ = writeln!(stdout, "{json}");
			}
		}
		OutputFormat::Text => {
			let _ = writeln!(stdout, "{}", format_inference_text(result));
		}
	}
	let _ = stdout.flush();
}

fn format_inference_text(result: &InferenceResult) -> String {
	if result.ok {
		format!("[{} {:.0}ms] {}", result.id, result.total_latency_ms, result.result)
	} else {
		format!(
			"[{} failed] {}",
			result.id,
			result.error.as_deref().unwrap_or("inference failed")
		)
	}
}

/// Prints an error to stderr for humans.
pub fn print_error_stderr(error: &CommandError) {
	let mut stderr = io::stderr().lock();
	let _ = writeln!(stderr, "error [{}]: {}", error.code, error.message);
	if let Some(ref details) = error.details {
		if let Ok(json) = serde_json::to_string(details) {
			let _ = writeln!(stderr, "  details: {json}");
		}
	}
}
