pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod dom;
pub mod history;
pub mod menu;
pub mod modal;
pub mod navigation;
pub mod pointer;
pub mod questions;
pub mod state;
pub mod storage;
pub mod timer;
pub mod transition;
mod utils;
pub mod views;

#[cfg(feature = "desktop")]
mod app_config_commands;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(feature = "desktop")]
pub use shell::run;

#[cfg(feature = "desktop")]
pub(crate) use shell::AppState;

#[cfg(feature = "desktop")]
mod shell {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use log::warn;
    use tauri::{AppHandle, Emitter, Manager, State};
    use tokio::sync::broadcast::error::RecvError;

    use crate::app::{App, AppParts, UiEvent};
    use crate::app_config_commands::{get_app_config, update_app_config};
    use crate::auth::sync::AutoConfirm;
    use crate::auth::{AuthBoundary, DisabledBackend, OfflineBackend, ProfileUpdate, Reply};
    use crate::clock::SystemClock;
    use crate::config::ConfigStore;
    use crate::db::{Database, Profile};
    use crate::dom::{Rect, Viewport, VirtualDom};
    use crate::history::HistoryEntry;
    use crate::state::StateValue;
    use crate::storage::SqliteStorage;
    use crate::timer::{
        commands::{get_timer_snapshot, pause_timer, reset_timer, start_timer},
        TimerEvent,
    };
    use crate::transition::CompletionEvent;

    pub(crate) struct AppState {
        pub(crate) app: Arc<App>,
        pub(crate) dom: Arc<VirtualDom>,
        pub(crate) config: ConfigStore,
    }

    #[tauri::command]
    async fn ui_event(event: UiEvent, state: State<'_, AppState>) -> Result<(), String> {
        state.app.handle(event).await.map_err(|e| e.to_string())
    }

    /// `transitionend` / `animationend` relayed from the page.
    #[tauri::command]
    fn dom_completion(event: CompletionEvent, state: State<AppState>) {
        state.app.complete(event);
    }

    /// Window size and motion preference, sent on load and on every resize.
    #[tauri::command]
    async fn dom_layout(
        width: f64,
        height: f64,
        reduced_motion: bool,
        state: State<'_, AppState>,
    ) -> Result<(), String> {
        state.dom.set_viewport(Viewport { width, height });
        state.dom.set_reduced_motion(reduced_motion);
        state
            .app
            .set_reduced_motion(reduced_motion || state.config.config().reduced_motion);
        state
            .app
            .handle(UiEvent::Resize)
            .await
            .map_err(|e| e.to_string())
    }

    /// Box of one element, measured by the page right before a gesture that
    /// starts from it.
    #[tauri::command]
    fn dom_rect(selector: String, rect: Rect, state: State<AppState>) -> bool {
        state.dom.set_rect(&selector, rect)
    }

    #[tauri::command]
    async fn get_profile(state: State<'_, AppState>) -> Result<Reply<Profile>, String> {
        Ok(state.app.backend.get_user_profile().await.into())
    }

    /// Saves profile columns and mirrors the stored timer duration locally.
    #[tauri::command]
    async fn update_profile(
        update: ProfileUpdate,
        state: State<'_, AppState>,
    ) -> Result<Reply<Profile>, String> {
        let result = state.app.backend.update_user_profile(update).await;
        if let Ok(outcome) = &result {
            state.app.store.set_timer_duration(outcome.data.timer_duration);
        }
        Ok(result.into())
    }

    #[tauri::command]
    fn get_history(state: State<AppState>) -> Vec<HistoryEntry> {
        state.app.history.entries()
    }

    #[tauri::command]
    fn get_state_snapshot(state: State<AppState>) -> BTreeMap<&'static str, StateValue> {
        state.app.store.snapshot()
    }

    fn forward_events(handle: AppHandle, app: &Arc<App>) {
        let mut timer_events = app.timer.subscribe();
        let timer_handle = handle.clone();
        tauri::async_runtime::spawn(async move {
            loop {
                match timer_events.recv().await {
                    Ok(TimerEvent::Tick(snapshot)) => {
                        if let Err(err) = timer_handle.emit("timer-state-changed", &snapshot) {
                            warn!("Failed to emit timer state: {err}");
                        }
                    }
                    Ok(finished @ TimerEvent::Finished { .. }) => {
                        if let Err(err) = timer_handle.emit("timer-finished", &finished) {
                            warn!("Failed to emit timer finish: {err}");
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let mut auth_events = app.backend.subscribe();
        tauri::async_runtime::spawn(async move {
            loop {
                match auth_events.recv().await {
                    Ok(event) => {
                        if let Err(err) = handle.emit("auth-state-changed", &event) {
                            warn!("Failed to emit auth state: {err}");
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        log::info!("Better Life starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let config_store = ConfigStore::new(app_data_dir.join("config.json"))?;
                    let config = config_store.config();

                    let database = Database::new(app_data_dir.join("betterlife.sqlite3"))?;
                    let storage = tauri::async_runtime::block_on(SqliteStorage::open(
                        database.clone(),
                    ))?;

                    let backend: Arc<dyn AuthBoundary> = if config.cloud_enabled {
                        Arc::new(OfflineBackend::new(database, config.oauth_providers.clone()))
                    } else {
                        Arc::new(DisabledBackend::new())
                    };

                    let patch_handle = app.handle().clone();
                    let dom = Arc::new(VirtualDom::with_app_markup().with_sink(move |patch| {
                        if let Err(err) = patch_handle.emit("dom-patch", &patch) {
                            warn!("Failed to emit DOM patch: {err}");
                        }
                    }));

                    let core = App::new(AppParts {
                        config,
                        dom: dom.clone(),
                        storage,
                        backend,
                        clock: Arc::new(SystemClock),
                        prompter: Arc::new(AutoConfirm),
                    });

                    forward_events(app.handle().clone(), &core);
                    {
                        let core = core.clone();
                        tauri::async_runtime::block_on(async move { core.start().await });
                    }

                    app.manage(AppState {
                        app: core,
                        dom,
                        config: config_store,
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                ui_event,
                dom_completion,
                dom_layout,
                dom_rect,
                get_profile,
                update_profile,
                get_history,
                get_state_snapshot,
                get_timer_snapshot,
                start_timer,
                pause_timer,
                reset_timer,
                get_app_config,
                update_app_config,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
