//! HTTP client for the stream lifecycle endpoints.
//!
//! [`StreamApi`] is the seam the session layer talks to; [`HttpStreamApi`] is
//! the reqwest-backed implementation. Every call authenticates with a bearer
//! credential, and every non-2xx response is decoded as
//! [`ApiErrorBody`] and mapped through [`Error::from_status`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use vistream_protocol::{ApiErrorBody, CloseResponse, CreateStreamRequest, CreateStreamResponse, KeepaliveResponse, PromptUpdateRequest, StreamConfigEcho};

use crate::error::{Error, Result};

/// Remote stream lifecycle operations.
#[async_trait]
pub trait StreamApi: Send + Sync {
	/// Registers a stream and returns its identifier, answer, and lease.
	async fn create_stream(&self, request: &CreateStreamRequest) -> Result<CreateStreamResponse>;

	/// Renews the server-side lease for `stream_id`.
	async fn renew_lease(&self, stream_id: &str) -> Result<KeepaliveResponse>;

	/// Replaces the prompt of a running stream.
	async fn update_prompt(&self, stream_id: &str, prompt: &str) -> Result<StreamConfigEcho>;

	/// Closes the stream; the service finalizes billing and frees resources.
	async fn close_stream(&self, stream_id: &str) -> Result<CloseResponse>;
}

/// [`StreamApi`] over HTTPS.
#[derive(Clone)]
pub struct HttpStreamApi {
	client: Client,
	base: Url,
	api_key: String,
}

impl std::fmt::Debug for HttpStreamApi {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpStreamApi").field("base", &self.base.as_str()).finish_non_exhaustive()
	}
}

impl HttpStreamApi {
	/// Creates a client for the service rooted at `endpoint`.
	pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
		Self::with_client(Client::new(), endpoint, api_key)
	}

	/// Creates a client reusing an existing [`reqwest::Client`].
	pub fn with_client(client: Client, endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
		Ok(Self {
			client,
			base: parse_base_url(endpoint)?,
			api_key: api_key.into(),
		})
	}

	/// Returns the base URL requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base
	}

	fn url(&self, segments: &[&str]) -> Url {
		let mut url = self.base.clone();
		// parse_base_url rejects cannot-be-a-base URLs
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}
		url
	}

	async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
		let response = builder
			.bearer_auth(&self.api_key)
			.send()
			.await
			.map_err(|e| Error::Network(e.to_string()))?;

		let status = response.status();
		let bytes = response.bytes().await.map_err(|e| Error::Network(e.to_string()))?;

		if !status.is_success() {
			return Err(Error::from_status(status.as_u16(), decode_error_body(status, &bytes)));
		}

		serde_json::from_slice(&bytes).map_err(Into::into)
	}
}

#[async_trait]
impl StreamApi for HttpStreamApi {
	async fn create_stream(&self, request: &CreateStreamRequest) -> Result<CreateStreamResponse> {
		debug!(target = "vistream", mode = ?request.mode, "registering stream");
		self.execute(self.client.post(self.url(&["streams"])).json(request)).await
	}

	async fn renew_lease(&self, stream_id: &str) -> Result<KeepaliveResponse> {
		self.execute(self.client.post(self.url(&["streams", stream_id, "keepalive"]))).await
	}

	async fn update_prompt(&self, stream_id: &str, prompt: &str) -> Result<StreamConfigEcho> {
		let body = PromptUpdateRequest { prompt: prompt.to_string() };
		self.execute(self.client.patch(self.url(&["streams", stream_id, "config", "prompt"])).json(&body))
			.await
	}

	async fn close_stream(&self, stream_id: &str) -> Result<CloseResponse> {
		self.execute(self.client.delete(self.url(&["streams", stream_id]))).await
	}
}

/// Parses and checks the service base URL.
pub fn parse_base_url(endpoint: &str) -> Result<Url> {
	let url = Url::parse(endpoint).map_err(|e| Error::config("api_url", format!("'{endpoint}' is not a valid URL: {e}")))?;
	match url.scheme() {
		"http" | "https" => Ok(url),
		other => Err(Error::config("api_url", format!("unsupported scheme '{other}' (expected http or https)"))),
	}
}

/// Decodes an error body, falling back to the raw text when it is not JSON.
fn decode_error_body(status: StatusCode, bytes: &[u8]) -> ApiErrorBody {
	if let Ok(body) = serde_json::from_slice::<ApiErrorBody>(bytes) {
		return body;
	}
	let text = String::from_utf8_lossy(bytes).trim().to_string();
	ApiErrorBody {
		error: status.canonical_reason().unwrap_or("error").to_string(),
		message: (!text.is_empty()).then_some(text),
		request_id: None,
		details: None,
	}
}
