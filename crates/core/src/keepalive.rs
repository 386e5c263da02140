//! Lease renewal.
//!
//! A registered stream holds a server-side lease of `ttl` seconds.
//! [`LeaseKeepalive`] renews it every `ttl / 2`, starting one period after
//! registration. There is no retry: the first failed renewal stops the loop
//! and is handed to the failure callback exactly once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};
use vistream_runtime::{Error, StreamApi};

/// Where the renewal loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveState {
	Inactive,
	/// Waiting for the next renewal.
	Scheduled,
	/// A renewal request is in flight.
	Renewing,
}

/// Longest wait between renewals, whatever the lease ttl.
pub const MAX_RENEWAL_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Periodic lease renewal for one stream.
pub struct LeaseKeepalive {
	state: Arc<Mutex<KeepaliveState>>,
	task: Option<JoinHandle<()>>,
}

impl LeaseKeepalive {
	/// Renewal period for a lease of `ttl_seconds`, or `None` when the lease
	/// is absent or not positive. Capped at [`MAX_RENEWAL_PERIOD`].
	pub fn period_for(ttl_seconds: f64) -> Option<Duration> {
		if !(ttl_seconds.is_finite() && ttl_seconds > 0.0) {
			return None;
		}
		let period = Duration::try_from_secs_f64(ttl_seconds / 2.0).unwrap_or(MAX_RENEWAL_PERIOD);
		Some(period.min(MAX_RENEWAL_PERIOD))
	}

	/// Starts renewing `stream_id`. Returns an inactive keepalive when
	/// `ttl_seconds` yields no period.
	pub fn start<F>(api: Arc<dyn StreamApi>, stream_id: String, ttl_seconds: f64, on_failure: F) -> Self
	where
		F: FnOnce(Error) + Send + 'static,
	{
		let state = Arc::new(Mutex::new(KeepaliveState::Inactive));
		let Some(period) = Self::period_for(ttl_seconds) else {
			debug!(target = "vistream", ttl_seconds, "lease has no usable ttl, not renewing");
			return Self { state, task: None };
		};

		*state.lock() = KeepaliveState::Scheduled;
		debug!(target = "vistream", stream_id = %stream_id, period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "lease keepalive scheduled");

		let task_state = Arc::clone(&state);
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				ticker.tick().await;
				*task_state.lock() = KeepaliveState::Renewing;
				match api.renew_lease(&stream_id).await {
					Ok(response) => {
						debug!(target = "vistream", stream_id = %stream_id, ttl = response.ttl_seconds, "lease renewed");
						*task_state.lock() = KeepaliveState::Scheduled;
					}
					Err(err) => {
						warn!(target = "vistream", stream_id = %stream_id, error = %err, "lease renewal failed");
						*task_state.lock() = KeepaliveState::Inactive;
						on_failure(Error::Keepalive(Box::new(err)));
						return;
					}
				}
			}
		});

		Self { state, task: Some(task) }
	}

	pub fn state(&self) -> KeepaliveState {
		*self.state.lock()
	}

	/// Stops the loop; an in-flight renewal is abandoned.
	pub fn cancel(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
		*self.state.lock() = KeepaliveState::Inactive;
	}
}

impl Drop for LeaseKeepalive {
	fn drop(&mut self) {
		self.cancel();
	}
}

impl std::fmt::Debug for LeaseKeepalive {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LeaseKeepalive").field("state", &self.state()).finish()
	}
}
