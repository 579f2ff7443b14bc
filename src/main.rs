use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use finflow::core::UserId;
use finflow::core::log::init_logging;
use uuid::Uuid;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Extract purchase tickets from the user's drive
    Tickets {
        #[arg(short, long)]
        user: UserId,
        /// Show progress and a per-file outcome table
        #[arg(short, long)]
        wait: bool,
    },
    /// Extract investment statements from the user's drive
    Investments {
        #[arg(short, long)]
        user: UserId,
        /// Show progress and a per-file outcome table
        #[arg(short, long)]
        wait: bool,
    },
    /// Display the monthly unrealized gain of confirmed holdings
    Monthly {
        #[arg(short, long)]
        user: UserId,
    },
    /// List records awaiting confirmation
    Pending {
        #[arg(short, long)]
        user: UserId,
    },
    /// Confirm a pending investment as a holding
    Confirm {
        #[arg(short, long)]
        user: UserId,
        id: Uuid,
    },
}

impl Commands {
    fn into_app_command(self) -> Option<finflow::AppCommand> {
        use finflow::AppCommand;
        Some(match self {
            Commands::Setup => return None,
            Commands::Tickets { user, wait } => AppCommand::Tickets { user, wait },
            Commands::Investments { user, wait } => AppCommand::Investments { user, wait },
            Commands::Monthly { user } => AppCommand::Monthly { user },
            Commands::Pending { user } => AppCommand::Pending { user },
            Commands::Confirm { user, id } => AppCommand::Confirm { user, id },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command.map(Commands::into_app_command) {
        Some(None) => match cli.config_path.as_deref() {
            Some(path) => finflow::cli::setup::setup_at_path(path),
            None => finflow::cli::setup::setup(),
        },
        Some(Some(cmd)) => finflow::run_command(cmd, cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
