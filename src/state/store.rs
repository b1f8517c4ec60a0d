use std::{
    collections::{BTreeMap, HashMap},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, error, warn};
use serde::Serialize;

use crate::storage::{
    KeyValueStore, KEY_DARK_MODE, KEY_FONT_FAMILY, KEY_LAST_SESSION_DATE, KEY_TIMER_DURATION,
};

pub const DEFAULT_TIMER_DURATION_SECS: u64 = 600;
pub const MIN_TIMER_DURATION_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StateKey {
    TimerDuration,
    CurrentTimer,
    IsTimerRunning,
    MenuTitleDismissed,
    DarkMode,
    FontFamily,
    LastSessionDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Seconds,
    Flag,
    Text,
}

impl StateKey {
    pub const ALL: [StateKey; 7] = [
        StateKey::TimerDuration,
        StateKey::CurrentTimer,
        StateKey::IsTimerRunning,
        StateKey::MenuTitleDismissed,
        StateKey::DarkMode,
        StateKey::FontFamily,
        StateKey::LastSessionDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StateKey::TimerDuration => "timerDuration",
            StateKey::CurrentTimer => "currentTimer",
            StateKey::IsTimerRunning => "isTimerRunning",
            StateKey::MenuTitleDismissed => "menuTitleDismissed",
            StateKey::DarkMode => "darkMode",
            StateKey::FontFamily => "fontFamily",
            StateKey::LastSessionDate => "lastSessionDate",
        }
    }

    /// Parses a key name coming from the webview. Unknown names are logged
    /// and rejected rather than creating new state.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = Self::ALL.into_iter().find(|key| key.name() == name);
        if key.is_none() {
            warn!("Unknown state key '{name}'");
        }
        key
    }

    fn kind(self) -> ValueKind {
        match self {
            StateKey::TimerDuration | StateKey::CurrentTimer => ValueKind::Seconds,
            StateKey::IsTimerRunning | StateKey::MenuTitleDismissed | StateKey::DarkMode => {
                ValueKind::Flag
            }
            StateKey::FontFamily | StateKey::LastSessionDate => ValueKind::Text,
        }
    }

    fn storage_key(self) -> Option<&'static str> {
        match self {
            StateKey::TimerDuration => Some(KEY_TIMER_DURATION),
            StateKey::DarkMode => Some(KEY_DARK_MODE),
            StateKey::FontFamily => Some(KEY_FONT_FAMILY),
            StateKey::LastSessionDate => Some(KEY_LAST_SESSION_DATE),
            StateKey::CurrentTimer | StateKey::IsTimerRunning | StateKey::MenuTitleDismissed => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Seconds(u64),
    Flag(bool),
    Text(Option<String>),
}

impl StateValue {
    fn kind(&self) -> ValueKind {
        match self {
            StateValue::Seconds(_) => ValueKind::Seconds,
            StateValue::Flag(_) => ValueKind::Flag,
            StateValue::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            StateValue::Seconds(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            StateValue::Flag(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(value) => value.as_deref(),
            _ => None,
        }
    }

    /// Storage representation; `None` means the entry is removed.
    fn to_storage(&self) -> Option<String> {
        match self {
            StateValue::Seconds(value) => Some(value.to_string()),
            StateValue::Flag(true) => Some("true".to_string()),
            StateValue::Flag(false) => None,
            StateValue::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetOptions {
    pub persist: bool,
    pub notify: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            persist: true,
            notify: true,
        }
    }
}

impl SetOptions {
    pub fn silent() -> Self {
        Self {
            persist: true,
            notify: false,
        }
    }

    pub fn volatile() -> Self {
        Self {
            persist: false,
            notify: true,
        }
    }
}

pub type Subscriber = Arc<dyn Fn(&StateValue, &StateValue) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    key: StateKey,
    id: u64,
}

struct StoreInner {
    values: HashMap<StateKey, StateValue>,
    subscribers: BTreeMap<StateKey, Vec<(u64, Subscriber)>>,
    next_subscription: u64,
}

/// The application state record, mirrored to durable storage for the
/// preference keys. Shared as `Arc<StateStore>`.
pub struct StateStore {
    inner: Mutex<StoreInner>,
    storage: Arc<dyn KeyValueStore>,
}

impl StateStore {
    /// Seeds the store from storage. Missing or malformed entries fall back
    /// to their defaults.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let timer_duration = storage
            .get_item(KEY_TIMER_DURATION)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs >= MIN_TIMER_DURATION_SECS)
            .unwrap_or(DEFAULT_TIMER_DURATION_SECS);
        let dark_mode = storage.get_item(KEY_DARK_MODE).as_deref() == Some("true");
        let font_family = storage
            .get_item(KEY_FONT_FAMILY)
            .filter(|font| !font.trim().is_empty());
        let last_session_date = storage
            .get_item(KEY_LAST_SESSION_DATE)
            .filter(|date| !date.trim().is_empty());

        let values = HashMap::from([
            (StateKey::TimerDuration, StateValue::Seconds(timer_duration)),
            (StateKey::CurrentTimer, StateValue::Seconds(timer_duration)),
            (StateKey::IsTimerRunning, StateValue::Flag(false)),
            (StateKey::MenuTitleDismissed, StateValue::Flag(false)),
            (StateKey::DarkMode, StateValue::Flag(dark_mode)),
            (StateKey::FontFamily, StateValue::Text(font_family)),
            (StateKey::LastSessionDate, StateValue::Text(last_session_date)),
        ]);

        debug!("State store loaded with timer duration {timer_duration}s");

        Self {
            inner: Mutex::new(StoreInner {
                values,
                subscribers: BTreeMap::new(),
                next_subscription: 1,
            }),
            storage,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: StateKey) -> StateValue {
        self.lock()
            .values
            .get(&key)
            .cloned()
            .unwrap_or(StateValue::Text(None))
    }

    /// Sets `key` to `value`. Returns `false` (and changes nothing) when the
    /// value has the wrong type for the key or is out of range.
    pub fn set(&self, key: StateKey, value: StateValue, options: SetOptions) -> bool {
        if value.kind() != key.kind() {
            warn!(
                "Rejected state update for {}: expected {:?}, got {:?}",
                key.name(),
                key.kind(),
                value
            );
            return false;
        }
        if key == StateKey::TimerDuration
            && value.as_seconds().unwrap_or(0) < MIN_TIMER_DURATION_SECS
        {
            warn!("Rejected timer duration {value:?}: below {MIN_TIMER_DURATION_SECS}s");
            return false;
        }

        let (old, subscribers) = {
            let mut inner = self.lock();
            let old = inner
                .values
                .insert(key, value.clone())
                .unwrap_or(StateValue::Text(None));
            let subscribers: Vec<Subscriber> = if options.notify {
                inner
                    .subscribers
                    .get(&key)
                    .map(|list| list.iter().map(|(_, callback)| callback.clone()).collect())
                    .unwrap_or_default()
            } else {
                Vec::new()
            };
            (old, subscribers)
        };

        if options.persist {
            if let Some(storage_key) = key.storage_key() {
                match value.to_storage() {
                    Some(raw) => self.storage.set_item(storage_key, &raw),
                    None => self.storage.remove_item(storage_key),
                }
            }
        }

        for callback in subscribers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(&value, &old)));
            if result.is_err() {
                error!("Subscriber for {} panicked; continuing", key.name());
            }
        }

        true
    }

    /// Registers `callback` for changes to `key`. Callbacks run synchronously
    /// inside `set`, in registration order.
    pub fn subscribe<F>(&self, key: StateKey, callback: F) -> Subscription
    where
        F: Fn(&StateValue, &StateValue) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner
            .subscribers
            .entry(key)
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription { key, id }
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut inner = self.lock();
        match inner.subscribers.get_mut(&subscription.key) {
            Some(list) => {
                let before = list.len();
                list.retain(|(id, _)| *id != subscription.id);
                before != list.len()
            }
            None => false,
        }
    }

    /// Persists a new duration and re-seeds the live countdown with it.
    pub fn set_timer_duration(&self, seconds: u64) -> bool {
        if seconds < MIN_TIMER_DURATION_SECS {
            warn!("Ignoring timer duration {seconds}s: minimum is {MIN_TIMER_DURATION_SECS}s");
            return false;
        }
        self.set(
            StateKey::TimerDuration,
            StateValue::Seconds(seconds),
            SetOptions::default(),
        ) && self.set(
            StateKey::CurrentTimer,
            StateValue::Seconds(seconds),
            SetOptions::default(),
        )
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, StateValue> {
        let inner = self.lock();
        StateKey::ALL
            .into_iter()
            .filter_map(|key| inner.values.get(&key).map(|value| (key.name(), value.clone())))
            .collect()
    }

    pub fn timer_duration(&self) -> u64 {
        self.get(StateKey::TimerDuration)
            .as_seconds()
            .unwrap_or(DEFAULT_TIMER_DURATION_SECS)
    }

    pub fn current_timer(&self) -> u64 {
        self.get(StateKey::CurrentTimer).as_seconds().unwrap_or(0)
    }

    pub fn set_current_timer(&self, seconds: u64) -> bool {
        self.set(
            StateKey::CurrentTimer,
            StateValue::Seconds(seconds),
            SetOptions::default(),
        )
    }

    pub fn is_timer_running(&self) -> bool {
        self.get(StateKey::IsTimerRunning).as_flag().unwrap_or(false)
    }

    pub fn set_timer_running(&self, running: bool) -> bool {
        self.set(
            StateKey::IsTimerRunning,
            StateValue::Flag(running),
            SetOptions::default(),
        )
    }

    pub fn menu_title_dismissed(&self) -> bool {
        self.get(StateKey::MenuTitleDismissed)
            .as_flag()
            .unwrap_or(false)
    }

    pub fn dark_mode(&self) -> bool {
        self.get(StateKey::DarkMode).as_flag().unwrap_or(false)
    }

    pub fn font_family(&self) -> Option<String> {
        self.get(StateKey::FontFamily).as_text().map(str::to_string)
    }

    pub fn last_session_date(&self) -> Option<String> {
        self.get(StateKey::LastSessionDate)
            .as_text()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with(entries: Vec<(&str, &str)>) -> (StateStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::with_entries(entries));
        (StateStore::load(storage.clone()), storage)
    }

    #[test]
    fn defaults_when_storage_is_empty_or_malformed() {
        let (store, _) = store_with(vec![
            (KEY_TIMER_DURATION, "not-a-number"),
            (KEY_DARK_MODE, "yes"),
        ]);
        assert_eq!(store.timer_duration(), 600);
        assert_eq!(store.current_timer(), 600);
        assert!(!store.dark_mode());
        assert_eq!(store.font_family(), None);
        assert_eq!(store.last_session_date(), None);

        let (store, _) = store_with(vec![(KEY_TIMER_DURATION, "30")]);
        assert_eq!(store.timer_duration(), 600);
    }

    #[test]
    fn loads_persisted_preferences() {
        let (store, _) = store_with(vec![
            (KEY_TIMER_DURATION, "1200"),
            (KEY_DARK_MODE, "true"),
            (KEY_FONT_FAMILY, "Georgia, serif"),
            (KEY_LAST_SESSION_DATE, "Mon Jan 01 2024"),
        ]);
        assert_eq!(store.timer_duration(), 1200);
        assert_eq!(store.current_timer(), 1200);
        assert!(store.dark_mode());
        assert_eq!(store.font_family().as_deref(), Some("Georgia, serif"));
        assert_eq!(store.last_session_date().as_deref(), Some("Mon Jan 01 2024"));
    }

    #[test]
    fn set_timer_duration_updates_both_values() {
        let (store, storage) = store_with(vec![]);
        for duration in [60, 61, 900, 3_600, 86_400] {
            assert!(store.set_timer_duration(duration));
            assert_eq!(store.timer_duration(), duration);
            assert_eq!(store.current_timer(), duration);
            assert_eq!(
                storage.get_item(KEY_TIMER_DURATION),
                Some(duration.to_string())
            );
        }
    }

    #[test]
    fn set_timer_duration_below_minimum_is_a_no_op() {
        let (store, _) = store_with(vec![(KEY_TIMER_DURATION, "900")]);
        store.set_current_timer(42);
        for duration in [0, 1, 59] {
            assert!(!store.set_timer_duration(duration));
            assert_eq!(store.timer_duration(), 900);
            assert_eq!(store.current_timer(), 42);
        }
    }

    #[test]
    fn mismatched_value_type_is_rejected() {
        let (store, _) = store_with(vec![]);
        assert!(!store.set(
            StateKey::DarkMode,
            StateValue::Seconds(1),
            SetOptions::default()
        ));
        assert!(!store.dark_mode());
        assert_eq!(StateKey::from_name("darkmode"), None);
        assert_eq!(StateKey::from_name("darkMode"), Some(StateKey::DarkMode));
    }

    #[test]
    fn null_and_false_remove_the_storage_entry() {
        let (store, storage) = store_with(vec![
            (KEY_DARK_MODE, "true"),
            (KEY_FONT_FAMILY, "serif"),
        ]);
        store.set(StateKey::DarkMode, StateValue::Flag(false), SetOptions::default());
        store.set(StateKey::FontFamily, StateValue::Text(None), SetOptions::default());
        assert_eq!(storage.get_item(KEY_DARK_MODE), None);
        assert_eq!(storage.get_item(KEY_FONT_FAMILY), None);
    }

    #[test]
    fn volatile_keys_never_touch_storage() {
        let (store, storage) = store_with(vec![]);
        store.set_current_timer(10);
        store.set_timer_running(true);
        assert_eq!(storage.get_item("currentTimer"), None);
        assert_eq!(storage.get_item("isTimerRunning"), None);
    }

    #[test]
    fn subscribers_run_in_order_with_new_and_old_values() {
        let (store, _) = store_with(vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        store.subscribe(StateKey::CurrentTimer, move |new, old| {
            first
                .lock()
                .unwrap()
                .push(("first", new.as_seconds(), old.as_seconds()));
        });
        let second = seen.clone();
        store.subscribe(StateKey::CurrentTimer, move |new, old| {
            second
                .lock()
                .unwrap()
                .push(("second", new.as_seconds(), old.as_seconds()));
        });

        store.set_current_timer(599);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("first", Some(599), Some(600)),
                ("second", Some(599), Some(600)),
            ]
        );
    }

    #[test]
    fn panicking_subscriber_does_not_break_others_or_the_update() {
        let (store, _) = store_with(vec![]);
        let calls = Arc::new(AtomicUsize::new(0));

        store.subscribe(StateKey::DarkMode, |_, _| panic!("broken observer"));
        let counter = calls.clone();
        store.subscribe(StateKey::DarkMode, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.set(StateKey::DarkMode, StateValue::Flag(true), SetOptions::default()));
        assert!(store.dark_mode());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_and_silent_updates_skip_callbacks() {
        let (store, _) = store_with(vec![]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = store.subscribe(StateKey::FontFamily, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set(
            StateKey::FontFamily,
            StateValue::Text(Some("serif".into())),
            SetOptions::silent(),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(store.unsubscribe(subscription));
        assert!(!store.unsubscribe(subscription));
        store.set(
            StateKey::FontFamily,
            StateValue::Text(Some("mono".into())),
            SetOptions::default(),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
