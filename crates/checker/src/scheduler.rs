//! Check loop: window gating, daily idempotency, one full check cycle per
//! pass, graduated backoff on failure. Terminates only on shutdown.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use creneau_browser::{BrowserSession, PageDriver};
use creneau_core::config::SiteConfig;
use creneau_core::{Activity, Config, Error, Paths, Result};
use creneau_notify::{Notifier, WeatherService};
use creneau_storage::{BookingRecord, PlanningStore};

use crate::flow;
use crate::matcher::{self, BookingPlan};
use crate::policy::{ErrorPolicy, ErrorState};

/// Result of one check cycle that ran to completion.
pub enum CycleOutcome {
    /// The day's schedule is published; bookings were attempted.
    PlanningOpen {
        activities: Vec<Activity>,
        bookings_confirmed: u32,
    },
    /// The site has not published the target day yet. Normal, retried soon.
    PlanningClosed,
}

pub struct Checker {
    config: Config,
    paths: Paths,
    store: PlanningStore,
    notifier: Arc<dyn Notifier>,
    weather: WeatherService,
    policy: ErrorPolicy,
    state: ErrorState,
}

impl Checker {
    pub fn new(
        config: Config,
        paths: Paths,
        store: PlanningStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let policy = ErrorPolicy::from_config(&config.check);
        let weather = WeatherService::new(config.weather.clone());
        Self {
            config,
            paths,
            store,
            notifier,
            weather,
            policy,
            state: ErrorState::default(),
        }
    }

    /// Run check cycles until the shutdown signal fires. The signal is
    /// observed both between cycles and during a cycle's page waits; a
    /// cycle cut short still tears its browser session down.
    pub async fn run_loop(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("Checker started");
        let (window_start, window_end) = self.config.check.window()?;

        loop {
            let now = Local::now().naive_local();
            let today = now.date();

            if let Some(wake_at) = next_wake_outside_window(now, window_start, window_end) {
                let wait = duration_until(now, wake_at);
                info!(
                    wake_at = %wake_at,
                    "Outside operating window, sleeping"
                );
                if sleep_or_shutdown(wait, &mut shutdown).await {
                    break;
                }
                continue;
            }

            match self.store.today_check_status(today) {
                Ok(true) => {
                    let wake_at = tomorrow_window_start(now, window_start);
                    info!(wake_at = %wake_at, "Planning already checked today");
                    if sleep_or_shutdown(duration_until(now, wake_at), &mut shutdown).await {
                        break;
                    }
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    let wait = self.handle_failure(&e).await;
                    if sleep_or_shutdown(wait, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            }

            let target_date = today + chrono::Duration::days(self.config.check.target_day_offset);
            info!(target = %target_date.format("%d/%m/%Y"), "Checking planning");

            match self.run_cycle(target_date, &mut shutdown).await {
                Ok(None) => break,
                Ok(Some(CycleOutcome::PlanningOpen {
                    activities,
                    bookings_confirmed,
                })) => {
                    if let Err(e) = self.store.set_planning_checked(today) {
                        error!("Failed to mark today as checked: {}", e);
                    }
                    if self.policy.on_success(&mut self.state) {
                        self.notifier.recovered().await;
                    }
                    let weather = self.weather.current().await;
                    self.notifier
                        .schedule_open(target_date, &activities, &weather)
                        .await;
                    let weekday = target_date.weekday().number_from_monday();
                    if let Err(e) = self.store.save_activities(weekday, &activities) {
                        warn!("Failed to persist planning read-model: {}", e);
                    }
                    info!(
                        bookings = bookings_confirmed,
                        "Check cycle complete, planning open"
                    );
                }
                Ok(Some(CycleOutcome::PlanningClosed)) => {
                    let wait = Duration::from_secs(self.config.check.retry_interval_secs);
                    info!(wait_secs = wait.as_secs(), "Planning not open yet, retrying");
                    if sleep_or_shutdown(wait, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    let wait = self.handle_failure(&e).await;
                    if sleep_or_shutdown(wait, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        info!("Checker shutting down");
        Ok(())
    }

    /// One full cycle: launch session, check, book, always tear down.
    /// Returns None when the shutdown signal fired mid-cycle; the session
    /// is already closed by then.
    async fn run_cycle(
        &mut self,
        target_date: NaiveDate,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Option<CycleOutcome>> {
        let timeout = Duration::from_millis(self.config.browser.action_timeout_ms);
        let mut session =
            BrowserSession::launch(&self.config.browser, &self.paths, "check").await?;

        let result = interruptible(
            self.check_and_book(&mut session, target_date, timeout),
            shutdown,
        )
        .await;
        match result {
            None => {
                info!("Shutdown requested mid-cycle, closing session");
                session.close().await;
                Ok(None)
            }
            Some(outcome) => {
                if outcome.is_err() {
                    session.screenshot("error").await;
                }
                session.close().await;
                outcome.map(Some)
            }
        }
    }

    async fn check_and_book(
        &mut self,
        session: &mut BrowserSession,
        target_date: NaiveDate,
        timeout: Duration,
    ) -> Result<CycleOutcome> {
        let site = self.config.site.clone();
        let activities =
            check_day(session, &site, &site.email, &site.password, target_date, timeout).await?;
        if activities.is_empty() {
            return Ok(CycleOutcome::PlanningClosed);
        }

        let weekday = target_date.weekday().number_from_monday();
        let desired = self.store.list_desired(weekday)?;
        let outcome = matcher::plan_bookings(&activities, &desired);
        let confirm_wait = timeout.min(Duration::from_secs(10));

        let mut confirmed = 0;
        let mut current_email = site.email.clone();
        for (email, password, plans) in group_by_identity(&outcome.bookings) {
            let plans = if email == current_email {
                plans
            } else {
                // Relaunch under the new identity: booked markers are
                // per-account, so walk back to the day and re-plan.
                info!(user = %email, "Switching identity for booking");
                session.close().await;
                *session =
                    BrowserSession::launch(&self.config.browser, &self.paths, &email).await?;
                let fresh =
                    check_day(session, &site, &email, &password, target_date, timeout).await?;
                current_email = email.clone();
                if fresh.is_empty() {
                    warn!(user = %email, "Planning empty after identity switch, skipping");
                    continue;
                }
                let wishes: Vec<_> = desired
                    .iter()
                    .filter(|w| w.email == email)
                    .cloned()
                    .collect();
                matcher::plan_bookings(&fresh, &wishes).bookings
            };

            confirmed += execute_bookings(
                session,
                &self.store,
                self.notifier.as_ref(),
                &plans,
                target_date,
                confirm_wait,
            )
            .await?;
        }

        Ok(CycleOutcome::PlanningOpen {
            activities,
            bookings_confirmed: confirmed,
        })
    }

    async fn handle_failure(&mut self, error: &Error) -> Duration {
        error!(
            error = %error,
            count = self.state.consecutive() + 1,
            "Check cycle failed"
        );
        let decision = self
            .policy
            .on_failure(&mut self.state, error.kind(), &error.to_string());
        if let Some(note) = decision.notify {
            self.notifier
                .degraded(&note.message, note.failure_count, note.next_retry_secs)
                .await;
        }
        decision.retry_in
    }
}

/// Login and walk to the target day's activity list.
pub async fn check_day<D: PageDriver + ?Sized>(
    driver: &D,
    site: &SiteConfig,
    email: &str,
    password: &str,
    target_date: NaiveDate,
    timeout: Duration,
) -> Result<Vec<Activity>> {
    flow::login(driver, &site.login_url(), email, password, timeout).await?;
    flow::goto_planning(driver, &site.planning_url(), timeout).await?;
    flow::select_month(driver, target_date, timeout).await?;
    flow::select_day(driver, target_date, timeout).await?;
    let weekday = target_date.weekday().number_from_monday();
    flow::read_activities(driver, weekday, timeout).await
}

/// Run the planned booking attempts for one authenticated identity.
///
/// Soft failures (no confirmation marker, row gone) are logged and do not
/// escalate: the schedule check itself already succeeded.
pub async fn execute_bookings<D: PageDriver + ?Sized>(
    driver: &D,
    store: &PlanningStore,
    notifier: &dyn Notifier,
    plans: &[BookingPlan],
    target_date: NaiveDate,
    confirm_wait: Duration,
) -> Result<u32> {
    let mut confirmed = 0;
    for plan in plans {
        match flow::book_activity(driver, plan.activity_index, confirm_wait).await {
            Ok(true) => {
                let record = store.record_booking(
                    plan.desired.user_id,
                    target_date,
                    &plan.desired.activity,
                )?;
                match record {
                    BookingRecord::Inserted => {
                        info!(
                            activity = %plan.desired.activity,
                            user = %plan.desired.display_name,
                            "Booking confirmed"
                        );
                        notifier
                            .booking_confirmed(
                                &plan.desired.display_name,
                                target_date,
                                &plan.desired.activity,
                            )
                            .await;
                        confirmed += 1;
                    }
                    BookingRecord::AlreadyExists => {
                        debug!(
                            activity = %plan.desired.activity,
                            "Booking already on file, not re-notifying"
                        );
                    }
                }
            }
            Ok(false) => {
                warn!(
                    activity = %plan.desired.activity,
                    user = %plan.desired.display_name,
                    "Booking not confirmed within the wait, leaving for next cycle"
                );
            }
            Err(e) => {
                warn!(
                    activity = %plan.desired.activity,
                    error = %e,
                    "Booking attempt errored, continuing"
                );
            }
        }
    }
    Ok(confirmed)
}

/// Group plans by owning identity, preserving first-appearance order.
fn group_by_identity(plans: &[BookingPlan]) -> Vec<(String, String, Vec<BookingPlan>)> {
    let mut groups: Vec<(String, String, Vec<BookingPlan>)> = Vec::new();
    for plan in plans {
        match groups.iter_mut().find(|(email, _, _)| *email == plan.desired.email) {
            Some((_, _, group)) => group.push(plan.clone()),
            None => groups.push((
                plan.desired.email.clone(),
                plan.desired.password.clone(),
                vec![plan.clone()],
            )),
        }
    }
    groups
}

/// Where to wake up if the current time is outside the operating window.
fn next_wake_outside_window(
    now: NaiveDateTime,
    window_start: NaiveTime,
    window_end: NaiveTime,
) -> Option<NaiveDateTime> {
    let t = now.time();
    if t < window_start {
        Some(now.date().and_time(window_start))
    } else if t > window_end {
        Some(tomorrow_window_start(now, window_start))
    } else {
        None
    }
}

fn tomorrow_window_start(now: NaiveDateTime, window_start: NaiveTime) -> NaiveDateTime {
    (now.date() + chrono::Duration::days(1)).and_time(window_start)
}

fn duration_until(now: NaiveDateTime, target: NaiveDateTime) -> Duration {
    (target - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(Duration::from_secs(1))
}

/// Run a future to completion unless the shutdown signal fires first.
/// None means the work was abandoned mid-flight.
async fn interruptible<F>(work: F, shutdown: &mut broadcast::Receiver<()>) -> Option<F::Output>
where
    F: std::future::Future,
{
    tokio::select! {
        out = work => Some(out),
        _ = shutdown.recv() => None,
    }
}

/// Interruptible sleep; true means shutdown was requested.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    interruptible(tokio::time::sleep(duration), shutdown)
        .await
        .is_none()
}
