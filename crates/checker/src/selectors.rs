//! Selector strings for the club's Ionic planning UI, kept in one place
//! so a site redesign touches a single file.

use chrono::{Datelike, NaiveDate};
use creneau_core::{french_month, french_weekday_abbrev};

// Login form
pub const EMAIL_INPUT: &str = "input[type='email']";
pub const PASSWORD_INPUT: &str = "input[type='password']";
pub const LOGIN_BUTTON: &str = "//span[contains(text(), 'CONNEXION')]";
pub const OK_BUTTON: &str = "//button[contains(., 'OK')]";

// Present once authenticated
pub const LOGGED_IN_MARKER: &str = "//*[contains(text(), 'Planning')]";

// Planning navigation
pub const MONTH_PICKER: &str = ".booking-month-picker";
pub const MONTH_OK_BUTTON: &str = "//ion-alert//button[contains(.,'OK')]";

// Activity list
pub const ACTIVITY_LIST: &str = "ion-list.htz_booking_list";
pub const ACTIVITY_ITEMS: &str = "ion-item.pl-evt";

/// Month picker option labeled "{French month} {year}".
pub fn month_option_xpath(date: NaiveDate) -> String {
    format!(
        "//button[contains(@class, 'alert-radio-button') and contains(., '{} {}')]",
        french_month(date.month()),
        date.year()
    )
}

/// Calendar cell for a day: matches on the abbreviated weekday and the
/// day-of-month value so e.g. the 18th of the wrong week cannot be hit.
pub fn day_cell_xpath(date: NaiveDate) -> String {
    let abbrev = french_weekday_abbrev(date.weekday().number_from_monday());
    format!(
        "//div[contains(@class, 'booking_x_day')]\
         [.//div[contains(@class, 'weekday') and contains(text(), '{}')]]\
         [.//div[contains(@class, 'val') and text()='{}']]",
        abbrev,
        date.day()
    )
}

/// JS returning the activity list as a JSON array, one object per slot.
pub fn extract_activities_js() -> String {
    format!(
        concat!(
            "(function() {{",
            " var items = document.querySelectorAll('{items}');",
            " var out = [];",
            " for (var i = 0; i < items.length; i++) {{",
            "  var it = items[i];",
            "  var pick = function(sel) {{",
            "   var el = it.querySelector(sel);",
            "   return el ? el.innerText : null;",
            "  }};",
            "  var cap = it.querySelector('.pl-evt-capacity');",
            "  out.push({{",
            "   startTime: pick('.pl-evt-start'),",
            "   name: pick('.pl-evt-label'),",
            "   room: pick('.pl-evt-room'),",
            "   capacity: cap ? cap.innerText : null,",
            "   isFull: cap ? cap.className.indexOf('is-full') >= 0 : false,",
            "   isBooked: !!it.querySelector('.pl-evt-status.booked')",
            "  }});",
            " }}",
            " return out;",
            "}})()"
        ),
        items = ACTIVITY_ITEMS
    )
}

/// JS clicking the nth activity item, returning whether it was found.
pub fn click_activity_js(index: usize) -> String {
    format!(
        concat!(
            "(function() {{",
            " var items = document.querySelectorAll('{items}');",
            " var it = items[{index}];",
            " if (!it) return false;",
            " it.scrollIntoView({{block: 'center'}});",
            " it.click();",
            " return true;",
            "}})()"
        ),
        items = ACTIVITY_ITEMS,
        index = index
    )
}

/// JS checking whether the nth activity item carries the booked marker.
pub fn booked_marker_js(index: usize) -> String {
    format!(
        concat!(
            "(function() {{",
            " var items = document.querySelectorAll('{items}');",
            " var it = items[{index}];",
            " return !!(it && it.querySelector('.pl-evt-status.booked'));",
            "}})()"
        ),
        items = ACTIVITY_ITEMS,
        index = index
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_option_label() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let xpath = month_option_xpath(date);
        assert!(xpath.contains("'mars 2025'"));
        assert!(xpath.contains("alert-radio-button"));
    }

    #[test]
    fn test_day_cell_matches_weekday_and_value() {
        // 2025-03-18 is a Tuesday
        let date = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let xpath = day_cell_xpath(date);
        assert!(xpath.contains("'mar.'"));
        assert!(xpath.contains("text()='18'"));
    }

    #[test]
    fn test_activity_js_uses_item_selector() {
        assert!(extract_activities_js().contains("ion-item.pl-evt"));
        assert!(click_activity_js(2).contains("items[2]"));
        assert!(booked_marker_js(0).contains(".pl-evt-status.booked"));
    }
}
