//! Registration payload assembly and the registration call.

use vistream_protocol::{Backend, CreateStreamRequest, IceServer, InferenceParams, SessionDescription, SourceTransport};
use vistream_runtime::{Error, Result, StreamApi};

use crate::config::{SessionConfig, SessionDefaults};
use crate::validate::resolve_processing;

/// Identity of a registered stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
	pub stream_id: String,
	/// Lease length in seconds, when the service grants one.
	pub lease_ttl: Option<f64>,
	/// Relay-assist servers suggested by the service.
	pub relay_servers: Option<Vec<IceServer>>,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
	pub handle: SessionHandle,
	pub answer: Option<SessionDescription>,
}

/// Builds the registration body for `source`.
///
/// `detected_fps` is the local source's probed rate; it only matters for
/// the legacy clip parameterization.
pub fn build_request(config: &SessionConfig, source: SourceTransport, detected_fps: Option<f64>, defaults: &SessionDefaults) -> Result<CreateStreamRequest> {
	let backend: Backend = config
		.inference
		.backend
		.parse()
		.map_err(|message| Error::config("inference.backend", message))?;
	let processing = resolve_processing(&config.processing, detected_fps, defaults);

	Ok(CreateStreamRequest {
		source,
		mode: processing.mode(),
		processing,
		inference: InferenceParams {
			prompt: config.inference.prompt.clone(),
			backend,
			model: config.inference.model.clone(),
			output_schema: config.inference.output_schema.clone(),
			max_output_tokens: config.inference.max_output_tokens,
		},
	})
}

/// Registers the stream.
pub async fn register(api: &dyn StreamApi, request: &CreateStreamRequest) -> Result<Registration> {
	let response = api.create_stream(request).await?;
	Ok(Registration {
		handle: SessionHandle {
			lease_ttl: response.lease_ttl(),
			stream_id: response.stream_id,
			relay_servers: response.relay_servers,
		},
		answer: response.webrtc_answer,
	})
}
