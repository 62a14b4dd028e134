use serde::{Deserialize, Serialize};

/// One slot on the club's daily schedule, as read off the planning page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Start time as shown on the page, e.g. "09:30".
    pub start_time: String,
    pub name: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub capacity: String,
    /// The slot has no free spots left.
    #[serde(default)]
    pub is_full: bool,
    /// The logged-in account already holds a spot.
    #[serde(default)]
    pub is_booked: bool,
    /// Weekday the slot belongs to (1 = Monday .. 7 = Sunday).
    #[serde(default)]
    pub weekday: u32,
}

impl Activity {
    /// Case-insensitive name match against a wanted activity label.
    pub fn matches_name(&self, wanted: &str) -> bool {
        self.name.trim().to_lowercase() == wanted.trim().to_lowercase()
    }
}

/// A standing wish: book `activity` every week on `weekday` for this user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredReservation {
    pub user_id: i64,
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// 1 = Monday .. 7 = Sunday.
    pub weekday: u32,
    pub activity: String,
}

const MONTHS_FR: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

const WEEKDAYS_FR: [&str; 7] = [
    "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
];

// Abbreviations exactly as the planning page prints them.
const WEEKDAYS_FR_ABBREV: [&str; 7] = ["lun.", "mar.", "mer.", "jeu.", "ven.", "sam.", "dim."];

/// French month name for a 1-based month number; "" when out of range.
pub fn french_month(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTHS_FR.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// French weekday name, 1 = Monday .. 7 = Sunday; "" when out of range.
pub fn french_weekday(weekday: u32) -> &'static str {
    weekday
        .checked_sub(1)
        .and_then(|i| WEEKDAYS_FR.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// Abbreviated weekday as it appears in the day picker, e.g. "mer.".
pub fn french_weekday_abbrev(weekday: u32) -> &'static str {
    weekday
        .checked_sub(1)
        .and_then(|i| WEEKDAYS_FR_ABBREV.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// Reverse lookup: French weekday name back to its 1-based number.
pub fn french_weekday_number(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();
    WEEKDAYS_FR
        .iter()
        .position(|w| *w == lower)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_french_names() {
        assert_eq!(french_month(1), "janvier");
        assert_eq!(french_month(8), "août");
        assert_eq!(french_month(12), "décembre");
        assert_eq!(french_month(13), "");
        assert_eq!(french_weekday(1), "lundi");
        assert_eq!(french_weekday(7), "dimanche");
        assert_eq!(french_weekday_abbrev(3), "mer.");
        // 0 is out of range, not an alias for Monday/January
        assert_eq!(french_month(0), "");
        assert_eq!(french_weekday(0), "");
        assert_eq!(french_weekday_abbrev(0), "");
        assert_eq!(french_weekday(8), "");
        assert_eq!(french_weekday_number("jeudi"), Some(4));
        assert_eq!(french_weekday_number(" Samedi "), Some(6));
        assert_eq!(french_weekday_number("monday"), None);
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let activity = Activity {
            start_time: "09:30".to_string(),
            name: "  Cross Training ".to_string(),
            room: String::new(),
            capacity: String::new(),
            is_full: false,
            is_booked: false,
            weekday: 3,
        };
        assert!(activity.matches_name("cross training"));
        assert!(activity.matches_name("CROSS TRAINING"));
        assert!(!activity.matches_name("Pilates"));
    }
}
