use clap::Parser;
use vistream_cli::cli::Cli;
use vistream_cli::output::{self, CommandResult, OutputFormat, ResultBuilder};
use vistream_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = cli.command.name();

	if let Err(err) = commands::dispatch(cli).await {
		let error = output::command_error(&err);
		output::print_error_stderr(&error);

		// machine-readable formats also get a failure envelope on stdout
		if format != OutputFormat::Text {
			let result: CommandResult<()> = ResultBuilder::new(command).failure(error).build();
			output::print_result(&result, format);
		}
		std::process::exit(1);
	}
}
