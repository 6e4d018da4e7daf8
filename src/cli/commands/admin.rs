use anyhow::bail;
use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{connect_store, output_success};
use crate::cli::OutputFormat;
use crate::database::Store;
use crate::handlers::public::auth::validated_account;
use crate::models::Role;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Create the first administrator account")]
    Create {
        #[arg(long, help = "Login name")]
        username: String,
        #[arg(long, help = "Contact email")]
        email: String,
        #[arg(long, env = "IRUVADE_ADMIN_PASSWORD", help = "Password (or IRUVADE_ADMIN_PASSWORD)")]
        password: String,
    },
}

pub async fn handle(cmd: AdminCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create {
            username,
            email,
            password,
        } => {
            let (_, store) = connect_store().await?;

            if store.role_exists(Role::Admin).await? {
                bail!("An administrator account already exists");
            }

            let account = validated_account(Some(&username), Some(&email), Some(&password), Role::Admin)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let created = store.create_account(account).await?;
            store.close().await;

            output_success(
                output_format,
                &format!("Created administrator {}", created.username),
                Some(json!({ "id": created.id, "username": created.username })),
            )
        }
    }
}
