//! Week scrape: one session, login once, then walk every day of the
//! booking horizon and persist the planning read-model.

use chrono::{Datelike, Local};
use std::time::Duration;
use tracing::{error, info, warn};

use creneau_browser::{BrowserSession, PageDriver};
use creneau_core::{Config, Paths, Result};
use creneau_storage::PlanningStore;

use crate::flow;

/// Scrape day offsets `0..=target_day_offset` into the planning table.
/// Per-day failures are logged and skipped; the pass keeps going.
pub async fn scrape_week(config: &Config, paths: &Paths, store: &PlanningStore) -> Result<()> {
    let timeout = Duration::from_millis(config.browser.action_timeout_ms);
    let mut session = BrowserSession::launch(&config.browser, paths, "scrape").await?;

    let result = scrape_inner(&session, config, store, timeout).await;
    if result.is_err() {
        session.screenshot("scraping_error").await;
    }
    session.close().await;
    result
}

async fn scrape_inner(
    session: &BrowserSession,
    config: &Config,
    store: &PlanningStore,
    timeout: Duration,
) -> Result<()> {
    let site = &config.site;
    flow::login(session, &site.login_url(), &site.email, &site.password, timeout).await?;
    flow::goto_planning(session, &site.planning_url(), timeout).await?;

    let today = Local::now().date_naive();
    for day_offset in 0..=config.check.target_day_offset {
        let target_date = today + chrono::Duration::days(day_offset);
        info!(date = %target_date.format("%d/%m/%Y"), "Scraping planning");

        let day_result = scrape_day(session, store, target_date, timeout).await;
        if let Err(e) = day_result {
            error!(date = %target_date, "Scrape failed for day: {}", e);
            continue;
        }

        // Small pause between days, the calendar animates
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    Ok(())
}

async fn scrape_day<D: PageDriver + ?Sized>(
    driver: &D,
    store: &PlanningStore,
    target_date: chrono::NaiveDate,
    timeout: Duration,
) -> Result<()> {
    flow::select_month(driver, target_date, timeout).await?;
    flow::select_day(driver, target_date, timeout).await?;

    let weekday = target_date.weekday().number_from_monday();
    let activities = flow::read_activities(driver, weekday, timeout).await?;
    if activities.is_empty() {
        warn!(date = %target_date, "No activities published for day");
        return Ok(());
    }

    store.save_activities(weekday, &activities)?;
    info!(
        date = %target_date,
        count = activities.len(),
        "Planning saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::fake::FakeDriver;
    use crate::selectors;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scrape_day_persists_read_model() {
        let dir = TempDir::new().unwrap();
        let store = PlanningStore::open(&dir.path().join("test.sqlite")).unwrap();

        // 2025-03-18 is a Tuesday
        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let driver = FakeDriver::new();
        let option = selectors::month_option_xpath(date);
        let cell = selectors::day_cell_xpath(date);
        driver.add_present(&[
            selectors::MONTH_PICKER,
            &option,
            selectors::MONTH_OK_BUTTON,
            &cell,
            selectors::ACTIVITY_LIST,
        ]);
        driver.queue_eval(json!([
            {"startTime": "09:30", "name": "Cross Training", "room": "Salle 1",
             "capacity": "5/20", "isFull": false, "isBooked": false}
        ]));

        scrape_day(&driver, &store, date, Duration::from_millis(50))
            .await
            .unwrap();

        let rows = store.planning_for(2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Cross Training");
    }

    #[tokio::test]
    async fn test_scrape_day_empty_planning_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = PlanningStore::open(&dir.path().join("test.sqlite")).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let driver = FakeDriver::new();
        let option = selectors::month_option_xpath(date);
        let cell = selectors::day_cell_xpath(date);
        driver.add_present(&[
            selectors::MONTH_PICKER,
            &option,
            selectors::MONTH_OK_BUTTON,
            &cell,
        ]);

        scrape_day(&driver, &store, date, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(store.planning_for(2).unwrap().is_empty());
    }
}
