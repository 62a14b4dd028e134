use anyhow::bail;

use creneau_core::{french_weekday, french_weekday_number, Paths};
use creneau_storage::PlanningStore;

pub async fn run(
    email: &str,
    password: &str,
    name: &str,
    weekday: &str,
    activity: &str,
) -> anyhow::Result<()> {
    let Some(weekday_num) = french_weekday_number(weekday) else {
        bail!("unknown weekday '{}' (expected lundi..dimanche)", weekday);
    };

    let paths = Paths::new();
    paths.ensure_dirs()?;
    let store = PlanningStore::open(&paths.db_file())?;

    let user_id = store.add_user(email, password, name)?;
    store.add_desired(user_id, weekday_num, activity)?;
    println!(
        "Registered: {} wants '{}' every {}",
        name,
        activity,
        french_weekday(weekday_num)
    );
    Ok(())
}
