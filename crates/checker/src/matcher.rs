//! Reservation matcher: pure planning of which desired reservations get a
//! booking attempt against the day's extracted activity list.

use tracing::info;

use creneau_core::{Activity, DesiredReservation};

/// Why a desired reservation gets no booking attempt this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// No activity with a matching name on the target day.
    NoMatch,
    /// The matching slot has no free spots.
    Full,
    /// The matching slot is already booked; booking again would duplicate.
    AlreadyBooked,
}

/// One desired reservation mapped onto an activity row.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingPlan {
    pub desired: DesiredReservation,
    /// Index of the matched activity in the extracted list (and on the page).
    pub activity_index: usize,
}

#[derive(Debug, Default)]
pub struct PlanOutcome {
    pub bookings: Vec<BookingPlan>,
    pub skips: Vec<(DesiredReservation, SkipReason)>,
}

/// Map each desired reservation to at most one booking attempt.
pub fn plan_bookings(
    activities: &[Activity],
    desired: &[DesiredReservation],
) -> PlanOutcome {
    let mut outcome = PlanOutcome::default();

    for wish in desired {
        let matched = activities
            .iter()
            .enumerate()
            .find(|(_, a)| a.matches_name(&wish.activity));

        match matched {
            None => {
                info!(
                    activity = %wish.activity,
                    user = %wish.display_name,
                    "No matching activity on the schedule"
                );
                outcome.skips.push((wish.clone(), SkipReason::NoMatch));
            }
            Some((_, activity)) if activity.is_full => {
                info!(
                    activity = %activity.name,
                    user = %wish.display_name,
                    "Activity is full, skipping"
                );
                outcome.skips.push((wish.clone(), SkipReason::Full));
            }
            Some((_, activity)) if activity.is_booked => {
                info!(
                    activity = %activity.name,
                    user = %wish.display_name,
                    "Already booked, skipping"
                );
                outcome.skips.push((wish.clone(), SkipReason::AlreadyBooked));
            }
            Some((index, activity)) => {
                info!(
                    activity = %activity.name,
                    user = %wish.display_name,
                    "Planning booking attempt"
                );
                outcome.bookings.push(BookingPlan {
                    desired: wish.clone(),
                    activity_index: index,
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(name: &str, full: bool, booked: bool) -> Activity {
        Activity {
            start_time: "09:30".to_string(),
            name: name.to_string(),
            room: "Salle 1".to_string(),
            capacity: "5/20".to_string(),
            is_full: full,
            is_booked: booked,
            weekday: 3,
        }
    }

    fn wish(user_id: i64, activity: &str) -> DesiredReservation {
        DesiredReservation {
            user_id,
            email: format!("user{}@example.fr", user_id),
            password: "pw".to_string(),
            display_name: format!("User {}", user_id),
            weekday: 3,
            activity: activity.to_string(),
        }
    }

    #[test]
    fn test_full_activity_is_never_attempted() {
        let activities = vec![activity("ZUMBA", true, false)];
        let outcome = plan_bookings(&activities, &[wish(1, "zumba")]);
        assert!(outcome.bookings.is_empty());
        assert_eq!(outcome.skips[0].1, SkipReason::Full);
    }

    #[test]
    fn test_open_activity_is_attempted_exactly_once() {
        let activities = vec![activity("ZUMBA", false, false)];
        let outcome = plan_bookings(&activities, &[wish(1, "zumba")]);
        assert_eq!(outcome.bookings.len(), 1);
        assert_eq!(outcome.bookings[0].activity_index, 0);
        assert!(outcome.skips.is_empty());
    }

    #[test]
    fn test_already_booked_short_circuits() {
        let activities = vec![activity("Yoga", false, true)];
        let outcome = plan_bookings(&activities, &[wish(1, "Yoga")]);
        assert!(outcome.bookings.is_empty());
        assert_eq!(outcome.skips[0].1, SkipReason::AlreadyBooked);
    }

    #[test]
    fn test_no_match_is_skipped() {
        let activities = vec![activity("Pilates", false, false)];
        let outcome = plan_bookings(&activities, &[wish(1, "Boxe")]);
        assert!(outcome.bookings.is_empty());
        assert_eq!(outcome.skips[0].1, SkipReason::NoMatch);
    }

    #[test]
    fn test_match_is_case_insensitive_and_indexed() {
        let activities = vec![
            activity("Yoga", false, false),
            activity("CROSS TRAINING", false, false),
        ];
        let outcome = plan_bookings(&activities, &[wish(1, "cross training")]);
        assert_eq!(outcome.bookings.len(), 1);
        assert_eq!(outcome.bookings[0].activity_index, 1);
    }

    #[test]
    fn test_multiple_wishes_multiple_users() {
        let activities = vec![
            activity("Yoga", false, false),
            activity("Boxe", true, false),
            activity("Pilates", false, false),
        ];
        let wishes = vec![wish(1, "Yoga"), wish(2, "Boxe"), wish(2, "Pilates")];
        let outcome = plan_bookings(&activities, &wishes);
        assert_eq!(outcome.bookings.len(), 2);
        assert_eq!(outcome.skips.len(), 1);
        assert_eq!(outcome.bookings[0].desired.user_id, 1);
        assert_eq!(outcome.bookings[1].desired.user_id, 2);
    }
}
