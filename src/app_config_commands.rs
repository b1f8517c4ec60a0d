//! Tauri commands for the user-editable app config (`config.json`).

use tauri::State;

use crate::{config::AppConfig, AppState};

#[tauri::command]
pub async fn get_app_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.config.config())
}

/// Persists `config`. Motion preference applies immediately; everything else
/// is read at the next launch.
#[tauri::command]
pub async fn update_app_config(
    state: State<'_, AppState>,
    config: AppConfig,
) -> Result<AppConfig, String> {
    state
        .config
        .update(config.clone())
        .map_err(|e| e.to_string())?;
    state.app.set_reduced_motion(config.reduced_motion);
    Ok(config)
}
