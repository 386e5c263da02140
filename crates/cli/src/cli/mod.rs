
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Root CLI.
#[derive(Parser, Debug)]
#[command(name = "vistream")]
#[command(about = "Stream video to an inference service and print the results")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: json (default), ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Check a session config file and preview its registration payload.
	Validate(ValidateArgs),
	/// Run a relay-source session, printing results until stopped.
	Run(RunArgs),
}

impl Commands {
	/// Name used in output envelopes.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Validate(_) => "validate",
			Commands::Run(_) => "run",
		}
	}
}

/// Where the session config comes from, plus credential overrides.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
	/// Session config file (JSON).
	#[arg(value_name = "CONFIG")]
	pub path: PathBuf,

	/// API key; replaces `api_key` from the config file.
	#[arg(long, value_name = "KEY", env = "VISTREAM_API_KEY", hide_env_values = true)]
	pub api_key: Option<String>,

	/// API base URL; replaces `api_url` from the config file.
	#[arg(long, value_name = "URL")]
	pub api_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
	#[command(flatten)]
	pub config: ConfigArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
	#[command(flatten)]
	pub config: ConfigArgs,

	/// Stop after this many seconds (runs until Ctrl-C otherwise).
	#[arg(long, value_name = "SECS", value_parser = parse_duration)]
	pub duration: Option<Duration>,

	/// Prompt to use instead of the one in the config file.
	#[arg(long)]
	pub prompt: Option<String>,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
	let secs: f64 = raw.parse().map_err(|_| format!("'{raw}' is not a number of seconds"))?;
	if !secs.is_finite() || secs <= 0.0 {
		return Err(format!("duration must be a positive number of seconds, got {raw}"));
	}
	Ok(Duration::from_secs_f64(secs))
}

/// Help colors matching cargo.
fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}
