use vistream_runtime::{AUTH_REJECTED_CLOSE_CODE, Error};

use crate::channel::ChannelTermination;
use crate::transport::TransportEvent;

/// Something that happened to a running session's resources.
///
/// Every background task reports through this type; only the coordinator's
/// event loop decides what it means for the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
	/// A captured track ended outside the client's control.
	TrackEnded { track_id: String },
	/// The lease keepalive gave up.
	LeaseRenewalFailed(Error),
	/// The result channel stopped delivering.
	ChannelTerminated(ChannelTermination),
	/// Transport diagnostics; never fatal.
	Transport(TransportEvent),
}

impl SessionEvent {
	/// The error this event ends the session with, if any.
	pub fn into_fatal_error(self) -> Option<Error> {
		match self {
			SessionEvent::TrackEnded { track_id } => Some(Error::Source(format!("capture ended (track {track_id})"))),
			SessionEvent::LeaseRenewalFailed(err) => Some(err),
			SessionEvent::ChannelTerminated(ChannelTermination::Closed { code, reason }) if code == AUTH_REJECTED_CLOSE_CODE => {
				Some(Error::Unauthorized {
					message: describe_close("result channel rejected the credential", code, &reason),
					request_id: None,
				})
			}
			SessionEvent::ChannelTerminated(ChannelTermination::Closed { code, reason }) => {
				Some(Error::Channel(describe_close("closed unexpectedly", code, &reason)))
			}
			SessionEvent::ChannelTerminated(ChannelTermination::Failed(message)) => Some(Error::Channel(message)),
			SessionEvent::Transport(_) => None,
		}
	}
}

fn describe_close(what: &str, code: u16, reason: &str) -> String {
	if reason.is_empty() {
		format!("{what} (code {code})")
	} else {
		format!("{what} (code {code}: {reason})")
	}
}
