use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::storage::drive::{authorization_url, exchange_code};

#[derive(Subcommand)]
pub enum DriveCommands {
    #[command(about = "Print the consent URL that yields an authorization code")]
    AuthUrl,

    #[command(about = "Exchange an authorization code and save the token file")]
    Exchange {
        #[arg(long, help = "Authorization code from the consent redirect")]
        code: String,
    },
}

pub async fn handle(cmd: DriveCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    match cmd {
        DriveCommands::AuthUrl => {
            let url = authorization_url(&config.drive)?;
            match output_format {
                OutputFormat::Json => output_success(output_format, "Open this URL to authorize", Some(json!({ "url": url.as_str() }))),
                OutputFormat::Text => {
                    println!("Authorize this app by visiting:\n{}", url);
                    Ok(())
                }
            }
        }
        DriveCommands::Exchange { code } => {
            let token = exchange_code(&config.drive, code.trim()).await?;
            if token.refresh_token.is_none() {
                tracing::warn!("Token response carried no refresh token; revoke access and retry with a fresh consent");
            }

            let path = &config.drive.token_path;
            tokio::fs::write(path, serde_json::to_vec_pretty(&token)?)
                .await
                .with_context(|| format!("writing {}", path.display()))?;

            output_success(
                output_format,
                &format!("Token stored to {}", path.display()),
                Some(json!({ "path": path })),
            )
        }
    }
}
