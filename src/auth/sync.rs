//! Keeping local data and the account in step: journal history is offered
//! for upload after sign-up, the profile's timer settings are pulled after
//! sign-in and pushed after a streak change.

use log::{info, warn};

use crate::db::Profile;
use crate::history::HistoryLog;
use crate::state::{SetOptions, StateKey, StateStore, StateValue};
use crate::state::store::MIN_TIMER_DURATION_SECS;
use crate::storage::{KeyValueStore, KEY_HISTORY_MIGRATED};

use super::{AuthBoundary, BoundaryError, ProfileUpdate};

/// Blocking yes/no and notice dialogs used around history migration.
pub trait Prompter: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
    fn alert(&self, message: &str);
}

/// Accepts every question and logs the notices. Used by the desktop shell,
/// which has no native dialog.
pub struct AutoConfirm;

impl Prompter for AutoConfirm {
    fn confirm(&self, message: &str) -> bool {
        info!("Auto-confirmed: {message}");
        true
    }

    fn alert(&self, message: &str) {
        info!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationReport {
    AlreadyMigrated,
    NothingToMigrate,
    Declined,
    Uploaded { uploaded: usize, failed: usize },
}

/// Offers to upload the local journal to the freshly created account. The
/// local copy is kept either way; the migrated flag only stops the offer
/// from being repeated once everything went up.
pub async fn migrate_local_history(
    backend: &dyn AuthBoundary,
    history: &HistoryLog,
    storage: &dyn KeyValueStore,
    prompter: &dyn Prompter,
) -> MigrationReport {
    if storage.get_item(KEY_HISTORY_MIGRATED).as_deref() == Some("true") {
        return MigrationReport::AlreadyMigrated;
    }

    let entries = history.entries();
    let answers: usize = entries.iter().map(|entry| entry.answers().len()).sum();
    if answers == 0 {
        return MigrationReport::NothingToMigrate;
    }

    if !prompter.confirm(&format!(
        "You have {answers} saved reflections on this device. Add them to your account?"
    )) {
        return MigrationReport::Declined;
    }

    let mut uploaded = 0;
    let mut failed = 0;
    for entry in &entries {
        for (question, text) in entry.answers() {
            match backend.save_response(question, text).await {
                Ok(_) => uploaded += 1,
                Err(err) => {
                    warn!("Could not upload {question} reflection: {err}");
                    failed += 1;
                }
            }
        }
    }

    if failed == 0 {
        storage.set_item(KEY_HISTORY_MIGRATED, "true");
        prompter.alert(&format!("Uploaded {uploaded} reflections to your account."));
    } else {
        prompter.alert(&format!(
            "Uploaded {uploaded} reflections; {failed} could not be saved and will be offered again."
        ));
    }
    info!("History migration finished: {uploaded} uploaded, {failed} failed");

    MigrationReport::Uploaded { uploaded, failed }
}

/// Applies the account's timer settings to local state.
pub async fn pull_profile(
    backend: &dyn AuthBoundary,
    store: &StateStore,
) -> Result<Profile, BoundaryError> {
    let profile = backend.get_user_profile().await?.data;

    if profile.timer_duration >= MIN_TIMER_DURATION_SECS
        && profile.timer_duration != store.timer_duration()
    {
        if store.is_timer_running() {
            // Leave the running countdown alone; the next reset picks it up.
            store.set(
                StateKey::TimerDuration,
                StateValue::Seconds(profile.timer_duration),
                SetOptions::default(),
            );
        } else {
            store.set_timer_duration(profile.timer_duration);
        }
    }
    if let Some(date) = profile.last_session_date.clone() {
        store.set(
            StateKey::LastSessionDate,
            StateValue::Text(Some(date)),
            SetOptions::default(),
        );
    }

    Ok(profile)
}

/// Sends the local timer settings to the account. Returns `None` when
/// nobody is signed in.
pub async fn push_profile(
    backend: &dyn AuthBoundary,
    store: &StateStore,
) -> Option<Result<Profile, BoundaryError>> {
    backend.current_user()?;
    let update = ProfileUpdate {
        display_name: None,
        timer_duration: Some(store.timer_duration()),
        last_session_date: store.last_session_date(),
    };
    Some(
        backend
            .update_user_profile(update)
            .await
            .map(|outcome| outcome.data),
    )
}
