use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use creneau_checker::Checker;
use creneau_core::{Config, Paths};
use creneau_notify::{DiscordNotifier, Notifier};
use creneau_storage::PlanningStore;

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let config = Config::load_or_default(&paths)?;
    config.validate()?;

    let store = PlanningStore::open(&paths.db_file())?;
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(config.discord.clone()));
    let mut checker = Checker::new(config, paths, store, notifier);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let loop_rx = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { checker.run_loop(loop_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping checker...");
    let _ = shutdown_tx.send(());
    handle.await??;
    Ok(())
}
