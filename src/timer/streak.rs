//! Daily streak: the first completed session on a new calendar day lengthens
//! the timer by ten minutes. Missing days costs nothing.

use chrono::NaiveDate;
use log::info;

use crate::state::{SetOptions, StateKey, StateStore, StateValue};

pub const STREAK_INCREMENT_SECS: u64 = 600;

/// Same shape as a browser's `Date.toDateString()`, e.g. `Mon Jan 01 2024`.
pub fn session_date_label(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}

/// Applies the streak rule for a session completed on `today`. Returns the
/// new duration when it changed.
pub fn apply_streak(store: &StateStore, today: NaiveDate) -> Option<u64> {
    let label = session_date_label(today);
    if store.last_session_date().as_deref() == Some(label.as_str()) {
        return None;
    }

    let duration = store.timer_duration().saturating_add(STREAK_INCREMENT_SECS);
    store.set_timer_duration(duration);
    store.set(
        StateKey::LastSessionDate,
        StateValue::Text(Some(label.clone())),
        SetOptions::default(),
    );
    info!("Streak extended on {label}: timer is now {duration}s");
    Some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStorage, KEY_LAST_SESSION_DATE, KEY_TIMER_DURATION};
    use std::sync::Arc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn label_matches_browser_date_string() {
        assert_eq!(session_date_label(day(2024, 1, 1)), "Mon Jan 01 2024");
    }

    #[test]
    fn one_increment_per_calendar_day() {
        let storage = Arc::new(MemoryStorage::new());
        let store = StateStore::load(storage.clone());

        assert_eq!(apply_streak(&store, day(2024, 1, 1)), Some(1200));
        assert_eq!(apply_streak(&store, day(2024, 1, 1)), None);
        assert_eq!(store.timer_duration(), 1200);
        assert_eq!(apply_streak(&store, day(2024, 1, 2)), Some(1800));

        assert_eq!(store.current_timer(), 1800);
        assert_eq!(storage.get_item(KEY_TIMER_DURATION).as_deref(), Some("1800"));
        assert_eq!(
            storage.get_item(KEY_LAST_SESSION_DATE).as_deref(),
            Some("Tue Jan 02 2024")
        );
    }

    #[test]
    fn skipped_days_are_not_penalised() {
        let store = StateStore::load(Arc::new(MemoryStorage::new()));
        apply_streak(&store, day(2024, 1, 1));
        assert_eq!(apply_streak(&store, day(2024, 1, 9)), Some(1800));
    }
}
