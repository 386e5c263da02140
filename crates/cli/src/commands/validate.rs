use serde::Serialize;
use tracing::debug;
use vistream::validate::validate;
use vistream::{Capabilities, SessionConfig, SessionDefaults, SourceDescriptor, registrar};
use vistream_protocol::{CreateStreamRequest, SourceTransport};

/// Stands in for the transport offer, which only exists once media is live.
const OFFER_PLACEHOLDER: &str = "<offer generated at start>";

/// Output of `vistream validate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
	pub source: &'static str,
	/// What `start` would send, with defaults applied. Local sources report
	/// the fallback frame rate since nothing has been probed yet.
	pub request: CreateStreamRequest,
}

/// Validates `config` as a host with every capture capability would.
pub fn validate_config(config: &SessionConfig) -> vistream::Result<ValidationReport> {
	let defaults = SessionDefaults::default();
	let capabilities = Capabilities {
		local_capture: true,
		display_capture: true,
	};
	validate(config, &capabilities, &defaults)?;

	let source = match &config.source {
		SourceDescriptor::Relay { url, token } => SourceTransport::Relay {
			url: url.clone(),
			token: token.clone(),
		},
		_ => SourceTransport::Transport {
			sdp: OFFER_PLACEHOLDER.to_string(),
		},
	};
	let request = registrar::build_request(config, source, None, &defaults)?;
	debug!(target = "vistream", source = config.source.kind(), "config valid");

	Ok(ValidationReport {
		source: config.source.kind(),
		request,
	})
}
