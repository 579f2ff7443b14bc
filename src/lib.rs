pub mod app;
pub mod cli;
pub mod core;
pub mod pipeline;
pub mod providers;
pub mod store;

use crate::app::App;
use crate::core::UserId;
use crate::core::config::AppConfig;
use crate::core::extraction::ExtractionIntent;
use anyhow::Result;
use tracing::{debug, info};
use uuid::Uuid;

pub enum AppCommand {
    Tickets { user: UserId, wait: bool },
    Investments { user: UserId, wait: bool },
    Monthly { user: UserId },
    Pending { user: UserId },
    Confirm { user: UserId, id: Uuid },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("finflow starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Tickets { user, wait } => {
            let app = App::from_config(&config)?;
            cli::dispatch::run(&app, user, ExtractionIntent::PurchaseTicket, wait).await
        }
        AppCommand::Investments { user, wait } => {
            let app = App::from_config(&config)?;
            cli::dispatch::run(&app, user, ExtractionIntent::Investment, wait).await
        }
        AppCommand::Monthly { user } => {
            let app = App::from_config(&config)?;
            cli::monthly::run(&app, user).await
        }
        // Record maintenance needs the store only, not the providers
        AppCommand::Pending { user } => {
            let records = store::open_record_store(&config)?;
            cli::pending::run(records.as_ref(), user).await
        }
        AppCommand::Confirm { user, id } => {
            let records = store::open_record_store(&config)?;
            cli::pending::confirm(records.as_ref(), user, id).await?;
            Ok(())
        }
    }
}
