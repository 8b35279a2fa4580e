use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Mint a development session token signed with SECURITY_JWT_SECRET")]
    Token {
        #[arg(help = "User id to own uploaded feedback")]
        user_id: String,
        #[arg(long, help = "Token lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Token { user_id, hours } => {
            if user_id.trim().is_empty() {
                anyhow::bail!("user id must not be empty");
            }

            let security = &config::config().security;
            let hours = hours.unwrap_or(security.jwt_expiry_hours);
            let token = generate_jwt(&security.jwt_secret, &Claims::new(user_id.clone(), hours))?;

            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    "Session token created",
                    Some(json!({ "user_id": user_id, "expires_in_hours": hours, "token": token })),
                ),
                OutputFormat::Text => {
                    // Bare token so it can be captured with $(...)
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
