mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use gatekeep_core::{GateConfig, Gatekeeper};
use gatekeep_store_sqlite::SqliteStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, EnrollmentCommand, KeysCommand};
use commands::*;

async fn connect(database_url: &str) -> Result<Gatekeeper, Box<dyn std::error::Error>> {
    let config = GateConfig::from_env()?;
    let store = SqliteStore::open(database_url).await?;
    debug!(database_url, "database ready");
    Ok(Gatekeeper::new(Arc::new(store), config))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Enrollment { enrollment_cmd } => {
            let gate = connect(&cli.database_url).await?;
            match enrollment_cmd {
                EnrollmentCommand::Issue { user_id, actor } => {
                    cmd_enrollment_issue(&gate, &user_id, actor.as_deref(), false).await?;
                }
                EnrollmentCommand::Regenerate { user_id, actor } => {
                    cmd_enrollment_issue(&gate, &user_id, actor.as_deref(), true).await?;
                }
                EnrollmentCommand::Preview => {
                    cmd_enrollment_preview(&gate).await?;
                }
            }
        }
        Command::Keys { keys_cmd } => match keys_cmd {
            KeysCommand::Show {
                organization_id,
                create,
            } => {
                let gate = connect(&cli.database_url).await?;
                cmd_keys_show(&gate, &organization_id, create).await?;
            }
        },
        Command::SignQr { authorization_id } => {
            let gate = connect(&cli.database_url).await?;
            cmd_sign_qr(&gate, &authorization_id).await?;
        }
        Command::RevokedSince {
            organization_id,
            since,
        } => {
            let gate = connect(&cli.database_url).await?;
            cmd_revoked_since(&gate, &organization_id, since.as_deref()).await?;
        }
        Command::VerifyOffline {
            qr,
            bundle,
            denylist,
        } => {
            cmd_verify_offline(&qr, &bundle, denylist.as_deref())?;
        }
    }

    Ok(())
}
