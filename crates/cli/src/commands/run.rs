use anyhow::ensure;
use tokio::sync::mpsc;
use tracing::{info, warn};
use vistream::SessionCoordinator;

use super::load_config;
use crate::cli::RunArgs;
use crate::output::{self, OutputFormat};

/// Runs a relay-source session until Ctrl-C, `--duration`, or a fatal error.
///
/// Local sources need platform capture and a peer transport, which a
/// terminal cannot provide, so they are rejected up front.
pub async fn execute(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
	let mut config = load_config(&args.config)?;
	if let Some(prompt) = args.prompt {
		config.inference.prompt = prompt;
	}
	ensure!(
		!config.source.is_local(),
		"`run` only supports relay sources; a {} source needs an embedding application that provides capture",
		config.source.kind()
	);

	let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
	let session = SessionCoordinator::builder(config)
		.on_result(move |result| output::print_inference(&result, format))
		.on_error(move |err| {
			if err.is_fatal() {
				let _ = fatal_tx.send(err);
			} else {
				warn!(target = "vistream", error = %err, "skipping result");
			}
		})
		.build()?;

	let handle = session.start().await?;
	info!(
		target = "vistream",
		stream_id = %handle.stream_id,
		duration = ?args.duration,
		"streaming results"
	);

	let deadline = async {
		match args.duration {
			Some(duration) => tokio::time::sleep(duration).await,
			None => std::future::pending().await,
		}
	};

	let outcome = tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!(target = "vistream", "interrupted");
			Ok(())
		}
		_ = deadline => Ok(()),
		Some(err) = fatal_rx.recv() => Err(err),
	};

	session.stop().await;
	outcome.map_err(Into::into)
}
