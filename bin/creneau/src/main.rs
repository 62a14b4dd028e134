mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "creneau")]
#[command(about = "Automated slot checker and booker for the club planning site", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the data directory
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Run the periodic planning checker (long-running)
    Run,

    /// Scrape the whole booking horizon into the planning table
    Scrape,

    /// Register a weekly reservation wish for a user
    Reserve {
        /// Account email on the booking site
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long)]
        password: String,

        /// Display name used in notifications
        #[arg(long)]
        name: String,

        /// French weekday (lundi..dimanche)
        #[arg(long)]
        weekday: String,

        /// Activity label as printed on the planning
        #[arg(long)]
        activity: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force).await?;
        }
        Commands::Run => {
            commands::run::run().await?;
        }
        Commands::Scrape => {
            commands::scrape::run().await?;
        }
        Commands::Reserve {
            email,
            password,
            name,
            weekday,
            activity,
        } => {
            commands::reserve::run(&email, &password, &name, &weekday, &activity).await?;
        }
    }

    Ok(())
}
