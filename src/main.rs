//! Quality Loop CLI entry point.

use clap::Parser;

use quality_loop::cli::{AppContext, Cli, handle_error, run};
use quality_loop::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let ctx = match AppContext::from_cli(&cli).await {
        Ok(ctx) => ctx,
        Err(err) => handle_error(&err, json_mode),
    };

    let _logger = match LoggerImpl::init(&ctx.config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(&err, json_mode),
    };

    if let Err(err) = run(cli, &ctx).await {
        handle_error(&err, json_mode);
    }
}
