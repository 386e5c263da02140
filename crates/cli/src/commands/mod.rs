mod run;
mod validate;

use std::path::Path;

use anyhow::Context;
use vistream::SessionConfig;

pub use validate::{ValidationReport, validate_config};

use crate::cli::{Cli, Commands, ConfigArgs};
use crate::output::{self, ResultBuilder};

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
	let format = cli.format;
	match cli.command {
		Commands::Validate(args) => {
			let config = load_config(&args.config)?;
			let report = validate_config(&config).with_context(|| format!("{} is not a valid session config", args.config.path.display()))?;
			let result = ResultBuilder::new("validate").data(report).build();
			output::print_result(&result, format);
			Ok(())
		}
		Commands::Run(args) => run::execute(args, format).await,
	}
}

/// Reads a session config file and applies command-line overrides.
pub fn load_config(args: &ConfigArgs) -> anyhow::Result<SessionConfig> {
	let mut config = read_config(&args.path)?;
	if let Some(key) = &args.api_key {
		config.api_key = key.clone();
	}
	if let Some(url) = &args.api_url {
		config.api_url = url.clone();
	}
	Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<SessionConfig> {
	let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
	serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
