mod cli;
mod config;
mod error;

use crate::cli::{Cli, Command};
use anyhow::Context as _;
use clap::Parser as _;
use restmcp_openapi_tools::OpenApiToolSource;
use serde_json::Value;
use std::io::Write as _;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = config::load_config(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    let source = OpenApiToolSource::build(config.name.clone(), config.api)
        .await
        .with_context(|| format!("start tool source '{}'", config.name))?;
    tracing::debug!(
        source = %config.name,
        tools = source.mcp_tools().len(),
        base_url = %source.base_url().unwrap_or_default(),
        "tool source ready"
    );

    match cli.command {
        Command::Tools { pretty } => {
            let tools = Value::Array(source.mcp_tools().iter().map(|t| t.to_value()).collect());
            print_json(&tools, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { tool, args } => {
            let arguments: Value =
                serde_json::from_str(&args).context("parse --args as JSON")?;
            let result = source
                .call_tool(&tool, arguments)
                .await
                .with_context(|| format!("call tool '{tool}'"))?;
            print_json(&serde_json::to_value(&result)?, true)?;
            if result.is_error == Some(true) {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr; stdout carries only command output.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json(value: &Value, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("write stdout")?;
    Ok(())
}
