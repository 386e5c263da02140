use std::sync::Arc;

use tracing::debug;
use vistream_protocol::InferenceResult;
use vistream_runtime::{ChannelConnector, Error, HttpStreamApi, Result, StreamApi, WebSocketConnector, parse_base_url};

use super::SessionCoordinator;
use crate::channel::{ErrorHandler, ResultHandler};
use crate::config::{SessionConfig, SessionDefaults};
use crate::media::MediaDevices;
use crate::transport::TransportFactory;
use crate::validate::{Capabilities, validate};

/// Assembles a [`SessionCoordinator`].
///
/// Relay sources need nothing beyond the config. Camera, file, and screen
/// sources also need [`media_devices`](Self::media_devices) and a
/// [`transport_factory`](Self::transport_factory).
///
/// ```ignore
/// let session = SessionBuilder::new(config)
///     .on_result(|r| println!("{}", r.result))
///     .on_error(|e| eprintln!("{e}"))
///     .build()?;
/// session.start().await?;
/// ```
pub struct SessionBuilder {
	config: SessionConfig,
	defaults: SessionDefaults,
	api: Option<Arc<dyn StreamApi>>,
	connector: Option<Arc<dyn ChannelConnector>>,
	devices: Option<Arc<dyn MediaDevices>>,
	transports: Option<Arc<dyn TransportFactory>>,
	on_result: Option<ResultHandler>,
	on_error: Option<ErrorHandler>,
}

impl SessionBuilder {
	pub fn new(config: SessionConfig) -> Self {
		Self {
			config,
			defaults: SessionDefaults::default(),
			api: None,
			connector: None,
			devices: None,
			transports: None,
			on_result: None,
			on_error: None,
		}
	}

	pub fn defaults(mut self, defaults: SessionDefaults) -> Self {
		self.defaults = defaults;
		self
	}

	/// Replaces the HTTP client built from `api_url`/`api_key`.
	pub fn stream_api(mut self, api: Arc<dyn StreamApi>) -> Self {
		self.api = Some(api);
		self
	}

	/// Replaces the WebSocket result channel connector.
	pub fn channel_connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
		self.connector = Some(connector);
		self
	}

	pub fn media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
		self.devices = Some(devices);
		self
	}

	pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
		self.transports = Some(factory);
		self
	}

	pub fn on_result<F>(mut self, handler: F) -> Self
	where
		F: Fn(InferenceResult) + Send + Sync + 'static,
	{
		self.on_result = Some(Arc::new(handler));
		self
	}

	pub fn on_error<F>(mut self, handler: F) -> Self
	where
		F: Fn(Error) + Send + Sync + 'static,
	{
		self.on_error = Some(Arc::new(handler));
		self
	}

	/// Validates the config and builds the coordinator.
	///
	/// Nothing is acquired or contacted here; a rejected config leaves no
	/// trace.
	pub fn build(self) -> Result<SessionCoordinator> {
		let SessionBuilder {
			config,
			defaults,
			api,
			connector,
			devices,
			transports,
			on_result,
			on_error,
		} = self;

		let capabilities = Capabilities {
			local_capture: devices.is_some() && transports.is_some(),
			display_capture: devices.as_ref().is_some_and(|d| d.supports_display_capture()),
		};
		validate(&config, &capabilities, &defaults)?;

		let base_url = parse_base_url(&config.api_url)?;
		let api = match api {
			Some(api) => api,
			None => Arc::new(HttpStreamApi::new(&config.api_url, config.api_key.clone())?) as Arc<dyn StreamApi>,
		};
		let connector = connector.unwrap_or_else(|| Arc::new(WebSocketConnector));
		let on_result = on_result.unwrap_or_else(|| {
			Arc::new(|result: InferenceResult| debug!(target = "vistream", id = %result.id, "result dropped (no handler)"))
		});
		let on_error = on_error
			.unwrap_or_else(|| Arc::new(|err: Error| debug!(target = "vistream", error = %err, "error dropped (no handler)")));

		debug!(
			target = "vistream",
			source = config.source.kind(),
			api = %base_url,
			"session configured"
		);

		Ok(SessionCoordinator::from_parts(super::Parts {
			config,
			defaults,
			base_url,
			api,
			connector,
			devices,
			transports,
			on_result,
			on_error,
		}))
	}
}
