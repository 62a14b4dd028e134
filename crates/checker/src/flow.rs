//! Navigation flow: the sequential passes that take one authenticated
//! identity from the login page to a day's activity list.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use creneau_browser::PageDriver;
use creneau_core::{Activity, Error, Result};

use crate::selectors;

/// Authenticate on the login page and wait for the logged-in marker.
pub async fn login<D: PageDriver + ?Sized>(
    driver: &D,
    login_url: &str,
    email: &str,
    password: &str,
    timeout: Duration,
) -> Result<()> {
    info!(url = login_url, "Opening login page");
    driver.goto(login_url).await?;

    if !driver.wait_for(selectors::EMAIL_INPUT, timeout).await? {
        return Err(Error::Auth("login form did not appear".to_string()));
    }
    driver.fill(selectors::EMAIL_INPUT, email).await?;
    driver.fill(selectors::PASSWORD_INPUT, password).await?;
    driver.click_xpath(selectors::LOGIN_BUTTON).await?;

    // Post-login confirmation popup; not always shown
    if driver
        .wait_for_xpath(selectors::OK_BUTTON, Duration::from_secs(5))
        .await?
    {
        driver.click_xpath(selectors::OK_BUTTON).await?;
    }

    if !driver
        .wait_for_xpath(selectors::LOGGED_IN_MARKER, timeout)
        .await?
    {
        return Err(Error::Auth(
            "no logged-in marker after submitting credentials".to_string(),
        ));
    }
    info!(email = email, "Logged in");
    Ok(())
}

/// Navigate to the planning browse view.
pub async fn goto_planning<D: PageDriver + ?Sized>(
    driver: &D,
    planning_url: &str,
    timeout: Duration,
) -> Result<()> {
    driver.goto(planning_url).await?;
    if !driver.wait_for(selectors::MONTH_PICKER, timeout).await? {
        return Err(Error::Navigation(
            "planning page did not load (no month picker)".to_string(),
        ));
    }
    Ok(())
}

/// Pick the target month in the month alert.
///
/// The option being absent means the site has not opened that month's
/// booking horizon yet.
pub async fn select_month<D: PageDriver + ?Sized>(
    driver: &D,
    target_date: NaiveDate,
    timeout: Duration,
) -> Result<()> {
    driver.click(selectors::MONTH_PICKER).await?;

    let option = selectors::month_option_xpath(target_date);
    if !driver.wait_for_xpath(&option, timeout).await? {
        return Err(Error::Navigation(format!(
            "month option for {} not present",
            target_date.format("%m/%Y")
        )));
    }
    driver.click_xpath(&option).await?;
    driver.click_xpath(selectors::MONTH_OK_BUTTON).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(())
}

/// Click the calendar cell for the target day.
pub async fn select_day<D: PageDriver + ?Sized>(
    driver: &D,
    target_date: NaiveDate,
    timeout: Duration,
) -> Result<()> {
    let cell = selectors::day_cell_xpath(target_date);
    debug!(day = target_date.day(), "Looking for day cell");

    if !driver.wait_for_xpath(&cell, timeout).await? {
        return Err(Error::Navigation(format!(
            "day cell for {} not found",
            target_date.format("%d/%m/%Y")
        )));
    }
    driver.click_xpath(&cell).await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(())
}

/// Read the day's activity list.
///
/// An absent or empty list is the normal "planning not open yet" outcome,
/// not an error. Malformed items are logged and skipped.
pub async fn read_activities<D: PageDriver + ?Sized>(
    driver: &D,
    weekday: u32,
    timeout: Duration,
) -> Result<Vec<Activity>> {
    let list_wait = timeout.min(Duration::from_secs(5));
    if !driver.wait_for(selectors::ACTIVITY_LIST, list_wait).await? {
        info!("Planning list not present");
        return Ok(Vec::new());
    }

    let raw = driver.eval_json(&selectors::extract_activities_js()).await?;
    let items = match raw.as_array() {
        Some(items) => items.clone(),
        None => {
            warn!("Activity extraction returned non-array, treating as empty");
            return Ok(Vec::new());
        }
    };

    let mut activities = Vec::new();
    for item in &items {
        match parse_activity(item, weekday) {
            Some(activity) => {
                log_activity(&activity);
                activities.push(activity);
            }
            None => warn!(item = %item, "Skipping malformed activity item"),
        }
    }

    if !activities.is_empty() {
        let booked = activities.iter().filter(|a| a.is_booked).count();
        let full = activities.iter().filter(|a| a.is_full).count();
        info!(
            total = activities.len(),
            booked = booked,
            full = full,
            available = activities.len() - full,
            "Planning open"
        );
    }
    Ok(activities)
}

/// Click an activity's row and wait for its booked marker to appear.
/// Returns whether the booking was confirmed within the wait.
pub async fn book_activity<D: PageDriver + ?Sized>(
    driver: &D,
    index: usize,
    confirm_wait: Duration,
) -> Result<bool> {
    let clicked = driver.eval_json(&selectors::click_activity_js(index)).await?;
    if clicked.as_bool() != Some(true) {
        warn!(index = index, "Activity row vanished before booking click");
        return Ok(false);
    }

    let start = std::time::Instant::now();
    loop {
        let booked = driver.eval_json(&selectors::booked_marker_js(index)).await?;
        if booked.as_bool() == Some(true) {
            return Ok(true);
        }
        if start.elapsed() > confirm_wait {
            return Ok(false);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// One extracted list item into an Activity; None if required fields
/// are missing.
fn parse_activity(item: &Value, weekday: u32) -> Option<Activity> {
    let start_time = item.get("startTime")?.as_str()?.trim().to_string();
    let name = item.get("name")?.as_str()?.trim().to_string();
    if start_time.is_empty() || name.is_empty() {
        return None;
    }

    let room = item
        .get("room")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .trim_start_matches('@')
        .trim()
        .to_string();
    let capacity = item
        .get("capacity")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    Some(Activity {
        start_time,
        name,
        room,
        capacity,
        is_full: item.get("isFull").and_then(|v| v.as_bool()).unwrap_or(false),
        is_booked: item
            .get("isBooked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        weekday,
    })
}

fn log_activity(activity: &Activity) {
    let mut status = Vec::new();
    if activity.is_booked {
        status.push("[Réservé]");
    }
    if activity.is_full {
        status.push("[Complet]");
    }
    info!(
        "    • {} - {} ({}) @ {} {}",
        activity.start_time,
        activity.name,
        activity.capacity,
        activity.room,
        status.join(" ")
    );
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted PageDriver for flow tests.

    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use creneau_browser::PageDriver;
    use creneau_core::{Error, Result};

    #[derive(Default)]
    pub struct FakeDriver {
        /// Selectors and XPaths that "exist" on the page.
        pub present: Mutex<HashSet<String>>,
        /// Queued results for eval_json, popped front first.
        pub eval_results: Mutex<VecDeque<Value>>,
        pub visited: Mutex<Vec<String>>,
        pub clicks: Mutex<Vec<String>>,
        pub fills: Mutex<Vec<(String, String)>>,
    }

    impl FakeDriver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_present(&self, items: &[&str]) {
            let mut present = self.present.lock().unwrap();
            for item in items {
                present.insert(item.to_string());
            }
        }

        pub fn queue_eval(&self, value: Value) {
            self.eval_results.lock().unwrap().push_back(value);
        }

        fn is_present(&self, target: &str) -> bool {
            self.present.lock().unwrap().contains(target)
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn goto(&self, url: &str) -> Result<()> {
            self.visited.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<()> {
            if !self.is_present(selector) {
                return Err(Error::Navigation(format!("element not found: {}", selector)));
            }
            self.clicks.lock().unwrap().push(selector.to_string());
            Ok(())
        }

        async fn click_xpath(&self, xpath: &str) -> Result<()> {
            if !self.is_present(xpath) {
                return Err(Error::Navigation(format!("element not found: {}", xpath)));
            }
            self.clicks.lock().unwrap().push(xpath.to_string());
            Ok(())
        }

        async fn fill(&self, selector: &str, text: &str) -> Result<()> {
            if !self.is_present(selector) {
                return Err(Error::Navigation(format!("element not found: {}", selector)));
            }
            self.fills
                .lock()
                .unwrap()
                .push((selector.to_string(), text.to_string()));
            Ok(())
        }

        async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<bool> {
            Ok(self.is_present(selector))
        }

        async fn wait_for_xpath(&self, xpath: &str, _timeout: Duration) -> Result<bool> {
            Ok(self.is_present(xpath))
        }

        async fn exists(&self, selector: &str) -> Result<bool> {
            Ok(self.is_present(selector))
        }

        async fn exists_xpath(&self, xpath: &str) -> Result<bool> {
            Ok(self.is_present(xpath))
        }

        async fn eval_json(&self, _expression: &str) -> Result<Value> {
            Ok(self
                .eval_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeDriver;
    use super::*;
    use crate::selectors;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn login_page() -> FakeDriver {
        let driver = FakeDriver::new();
        driver.add_present(&[
            selectors::EMAIL_INPUT,
            selectors::PASSWORD_INPUT,
            selectors::LOGIN_BUTTON,
            selectors::OK_BUTTON,
            selectors::LOGGED_IN_MARKER,
        ]);
        driver
    }

    #[tokio::test]
    async fn test_login_fills_credentials_and_confirms() {
        let driver = login_page();
        login(&driver, "https://x/?center=1", "a@b.fr", "secret", TIMEOUT)
            .await
            .unwrap();

        let fills = driver.fills.lock().unwrap().clone();
        assert_eq!(
            fills,
            vec![
                (selectors::EMAIL_INPUT.to_string(), "a@b.fr".to_string()),
                (selectors::PASSWORD_INPUT.to_string(), "secret".to_string()),
            ]
        );
        let clicks = driver.clicks.lock().unwrap().clone();
        assert!(clicks.contains(&selectors::LOGIN_BUTTON.to_string()));
        assert!(clicks.contains(&selectors::OK_BUTTON.to_string()));
    }

    #[tokio::test]
    async fn test_login_fails_without_logged_in_marker() {
        let driver = FakeDriver::new();
        driver.add_present(&[
            selectors::EMAIL_INPUT,
            selectors::PASSWORD_INPUT,
            selectors::LOGIN_BUTTON,
        ]);
        let err = login(&driver, "https://x", "a@b.fr", "bad", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_select_month_missing_option_is_navigation_error() {
        let driver = FakeDriver::new();
        driver.add_present(&[selectors::MONTH_PICKER]);
        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let err = select_month(&driver, date, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Navigation(_)));
    }

    #[tokio::test]
    async fn test_select_month_clicks_option_and_confirms() {
        let driver = FakeDriver::new();
        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let option = selectors::month_option_xpath(date);
        driver.add_present(&[
            selectors::MONTH_PICKER,
            &option,
            selectors::MONTH_OK_BUTTON,
        ]);
        select_month(&driver, date, TIMEOUT).await.unwrap();
        let clicks = driver.clicks.lock().unwrap().clone();
        assert_eq!(
            clicks,
            vec![
                selectors::MONTH_PICKER.to_string(),
                option,
                selectors::MONTH_OK_BUTTON.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_select_day_missing_cell() {
        let driver = FakeDriver::new();
        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let err = select_day(&driver, date, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Navigation(_)));
    }

    #[tokio::test]
    async fn test_read_activities_absent_list_is_empty_not_error() {
        let driver = FakeDriver::new();
        let activities = read_activities(&driver, 3, TIMEOUT).await.unwrap();
        assert!(activities.is_empty());
    }

    #[tokio::test]
    async fn test_read_activities_skips_malformed_items() {
        let driver = FakeDriver::new();
        driver.add_present(&[selectors::ACTIVITY_LIST]);
        driver.queue_eval(json!([
            {
                "startTime": "09:30",
                "name": "Cross Training",
                "room": "@ Salle 1",
                "capacity": " 5/20 ",
                "isFull": false,
                "isBooked": true
            },
            // no name, dropped
            {"startTime": "10:30", "name": null},
            {
                "startTime": "12:15",
                "name": "Pilates",
                "room": "Salle 2",
                "capacity": "20/20",
                "isFull": true,
                "isBooked": false
            }
        ]));

        let activities = read_activities(&driver, 2, TIMEOUT).await.unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].name, "Cross Training");
        assert_eq!(activities[0].room, "Salle 1");
        assert_eq!(activities[0].capacity, "5/20");
        assert!(activities[0].is_booked);
        assert_eq!(activities[0].weekday, 2);
        assert!(activities[1].is_full);
    }

    #[tokio::test]
    async fn test_book_activity_confirmed() {
        let driver = FakeDriver::new();
        driver.queue_eval(json!(true)); // click landed
        driver.queue_eval(json!(true)); // booked marker present
        let confirmed = book_activity(&driver, 0, Duration::from_millis(500))
            .await
            .unwrap();
        assert!(confirmed);
    }

    #[tokio::test]
    async fn test_book_activity_soft_failure_on_no_marker() {
        let driver = FakeDriver::new();
        driver.queue_eval(json!(true)); // click landed
        // marker never appears; queue drains to Null
        let confirmed = book_activity(&driver, 0, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(!confirmed);
    }

    #[tokio::test]
    async fn test_book_activity_row_vanished() {
        let driver = FakeDriver::new();
        driver.queue_eval(json!(false));
        let confirmed = book_activity(&driver, 4, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(!confirmed);
    }
}
