use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::client::server_url;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from API /health endpoint")]
    Health,
}

pub async fn handle(cmd: ServerCommands, server: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health => {
            let url = server_url(server, "health")?;
            let response = reqwest::Client::new().get(url.clone()).send().await?;
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);

            if status.is_success() {
                output_success(
                    &output_format,
                    &format!("Server {} is healthy", server),
                    Some(json!({ "health": body })),
                )
            } else {
                output_error(
                    &output_format,
                    &format!("Server {} reported {}", server, status),
                    Some("UNHEALTHY"),
                )?;
                anyhow::bail!("health check failed with status {}", status)
            }
        }
    }
}
