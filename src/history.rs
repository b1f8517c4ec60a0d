//! Local journal history: a JSON array of entries kept in durable storage as
//! an offline backup of every submitted reflection answer.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::questions::QuestionType;
use crate::storage::{KeyValueStore, KEY_HISTORY, KEY_HISTORY_BACKUP};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub better_today: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
}

impl HistoryEntry {
    pub fn answer(date: DateTime<Utc>, question: QuestionType, text: &str) -> Self {
        let text = Some(text.to_string());
        match question {
            QuestionType::BetterToday => Self {
                date,
                better_today: text,
                meaning: None,
            },
            QuestionType::LifeMeaning => Self {
                date,
                better_today: None,
                meaning: text,
            },
        }
    }

    /// The answers carried by this entry, tagged with their question.
    pub fn answers(&self) -> Vec<(QuestionType, &str)> {
        let mut answers = Vec::new();
        if let Some(text) = self.better_today.as_deref() {
            answers.push((QuestionType::BetterToday, text));
        }
        if let Some(text) = self.meaning.as_deref() {
            answers.push((QuestionType::LifeMeaning, text));
        }
        answers
    }
}

pub struct HistoryLog {
    storage: Arc<dyn KeyValueStore>,
    // Serialises read-modify-write of the stored array.
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Stored items, kept raw so entries this build cannot read survive
    /// the next write. `None` when the blob is not a JSON array.
    fn raw_items(&self) -> Option<Vec<Value>> {
        let Some(raw) = self.storage.get_item(KEY_HISTORY) else {
            return Some(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Some(items),
            Err(err) => {
                warn!("History is not a JSON array: {err}");
                None
            }
        }
    }

    /// Readable entries. Malformed items are skipped, not dropped from storage.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.raw_items()
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable history item {index}: {err}");
                    None
                }
            })
            .collect()
    }

    pub fn append(&self, entry: HistoryEntry) {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut items = match self.raw_items() {
            Some(items) => items,
            None => {
                if let Some(raw) = self.storage.get_item(KEY_HISTORY) {
                    warn!("Moving unreadable history to {KEY_HISTORY_BACKUP}");
                    self.storage.set_item(KEY_HISTORY_BACKUP, &raw);
                }
                Vec::new()
            }
        };
        match serde_json::to_value(&entry) {
            Ok(item) => items.push(item),
            Err(err) => {
                warn!("Failed to serialise history entry: {err}");
                return;
            }
        }
        match serde_json::to_string(&items) {
            Ok(raw) => self.storage.set_item(KEY_HISTORY, &raw),
            Err(err) => warn!("Failed to serialise history: {err}"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::TimeZone;

    #[test]
    fn entries_use_the_camel_case_wire_shape() {
        let storage = Arc::new(MemoryStorage::new());
        let log = HistoryLog::new(storage.clone());
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();

        log.append(HistoryEntry::answer(date, QuestionType::BetterToday, "walk more"));

        let raw = storage.get_item(KEY_HISTORY).unwrap();
        assert_eq!(
            raw,
            r#"[{"date":"2024-01-01T09:30:00Z","betterToday":"walk more"}]"#
        );
    }

    #[test]
    fn append_keeps_existing_entries() {
        let storage = Arc::new(MemoryStorage::with_entries([(
            KEY_HISTORY,
            r#"[{"date":"2023-12-31T10:00:00Z","meaning":"family"}]"#,
        )]));
        let log = HistoryLog::new(storage);

        log.append(HistoryEntry::answer(Utc::now(), QuestionType::BetterToday, "sleep"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].meaning.as_deref(), Some("family"));
        assert_eq!(entries[1].better_today.as_deref(), Some("sleep"));
    }

    #[test]
    fn corrupt_history_reads_as_empty() {
        let storage = Arc::new(MemoryStorage::with_entries([(KEY_HISTORY, "{oops")]));
        assert!(HistoryLog::new(storage).is_empty());
    }

    #[test]
    fn malformed_items_are_skipped_but_kept() {
        let storage = Arc::new(MemoryStorage::with_entries([(
            KEY_HISTORY,
            r#"[{"date":"2023-12-31T10:00:00Z","betterToday":"walk"},{"date":"Mon Jan 01 2024"}]"#,
        )]));
        let log = HistoryLog::new(storage.clone());
        assert_eq!(log.len(), 1);

        log.append(HistoryEntry::answer(Utc::now(), QuestionType::BetterToday, "sleep"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].better_today.as_deref(), Some("walk"));
        assert_eq!(entries[1].better_today.as_deref(), Some("sleep"));
        let raw = storage.get_item(KEY_HISTORY).unwrap();
        assert!(raw.contains(r#""date":"Mon Jan 01 2024""#));
    }

    #[test]
    fn unreadable_blob_is_backed_up_before_the_next_write() {
        let storage = Arc::new(MemoryStorage::with_entries([(KEY_HISTORY, "{oops")]));
        let log = HistoryLog::new(storage.clone());

        log.append(HistoryEntry::answer(Utc::now(), QuestionType::LifeMeaning, "music"));

        assert_eq!(storage.get_item(KEY_HISTORY_BACKUP).as_deref(), Some("{oops"));
        assert_eq!(log.len(), 1);
    }
}
