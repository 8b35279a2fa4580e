pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "feedback")]
#[command(about = "Feedback CLI - Upload CSV feedback to a feedback-ingest server")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format (overrides --json)")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "FEEDBACK_SERVER",
        default_value = "http://127.0.0.1:3000",
        help = "Server base URL"
    )]
    pub server: String,

    #[arg(long, global = true, env = "FEEDBACK_TOKEN", hide_env_values = true, help = "Session token")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Upload a CSV file of feedback")]
    Upload {
        #[arg(help = "Path to the CSV file")]
        file: std::path::PathBuf,
    },

    #[command(about = "Session token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Remote server checks")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json && !cli.text {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Upload { file } => {
            commands::upload::handle(&cli.server, cli.token, &file, output_format).await
        }
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Server { cmd } => commands::server::handle(cmd, &cli.server, output_format).await,
    }
}
