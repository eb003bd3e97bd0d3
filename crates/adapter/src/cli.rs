use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "restmcp-adapter",
    version,
    about = "Expose the operations of an OpenAPI/Swagger document as MCP tools"
)]
pub struct Cli {
    /// YAML or JSON tool source config.
    #[arg(long, env = "RESTMCP_CONFIG")]
    pub config: PathBuf,

    /// Emit logs as JSON lines (logs always go to stderr).
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the generated tool definitions as a JSON array.
    Tools {
        #[arg(long)]
        pretty: bool,
    },
    /// Run one tool call and print the result envelope.
    Call {
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_with_arguments() {
        let cli = Cli::try_parse_from([
            "restmcp-adapter",
            "--config",
            "pets.yaml",
            "call",
            "get_pet",
            "--args",
            r#"{"pet_id": 1}"#,
        ])
        .expect("parse");
        assert_eq!(cli.config, PathBuf::from("pets.yaml"));
        assert!(!cli.log_json);
        let Command::Call { tool, args } = cli.command else {
            panic!("expected call");
        };
        assert_eq!(tool, "get_pet");
        assert_eq!(args, r#"{"pet_id": 1}"#);
    }

    #[test]
    fn call_arguments_default_to_empty_object() {
        let cli = Cli::try_parse_from(["restmcp-adapter", "--config", "c.yaml", "call", "list"])
            .expect("parse");
        assert!(matches!(cli.command, Command::Call { args, .. } if args == "{}"));
    }

    #[test]
    fn tools_requires_no_arguments() {
        let cli = Cli::try_parse_from(["restmcp-adapter", "--config", "c.yaml", "--log-json", "tools"])
            .expect("parse");
        assert!(cli.log_json);
        assert!(matches!(cli.command, Command::Tools { pretty: false }));
    }
}
