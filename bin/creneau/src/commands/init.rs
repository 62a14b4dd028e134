use anyhow::Context;
use creneau_core::{Config, Paths};
use creneau_storage::PlanningStore;

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs().context("creating data directories")?;

    let config_path = paths.config_file();
    if config_path.exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    } else {
        Config::default()
            .save(&config_path)
            .context("writing default configuration")?;
        println!("Wrote default configuration to {}", config_path.display());
        println!("Fill in site.email, site.password and discord.webhookUrl before running.");
    }

    // Creates the schema on first open
    PlanningStore::open(&paths.db_file()).context("initializing database")?;
    println!("Database ready at {}", paths.db_file().display());
    Ok(())
}
