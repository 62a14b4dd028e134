use creneau_checker::scrape::scrape_week;
use creneau_core::{Config, Paths};
use creneau_storage::PlanningStore;

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let config = Config::load_or_default(&paths)?;
    config.validate()?;

    let store = PlanningStore::open(&paths.db_file())?;
    scrape_week(&config, &paths, &store).await?;
    Ok(())
}
