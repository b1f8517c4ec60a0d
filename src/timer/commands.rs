use tauri::State;

use crate::{
    timer::{TimerController, TimerSnapshot, TimerStatus},
    AppState,
};

fn controller_from_state(state: &State<'_, AppState>) -> TimerController {
    state.app.timer.clone()
}

#[tauri::command]
pub async fn get_timer_snapshot(state: State<'_, AppState>) -> Result<TimerSnapshot, String> {
    Ok(controller_from_state(&state).snapshot())
}

#[tauri::command]
pub async fn start_timer(state: State<'_, AppState>) -> Result<TimerStatus, String> {
    controller_from_state(&state)
        .start()
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn pause_timer(state: State<'_, AppState>) -> Result<TimerStatus, String> {
    Ok(controller_from_state(&state).pause())
}

#[tauri::command]
pub async fn reset_timer(state: State<'_, AppState>) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(&state);
    controller.reset();
    Ok(controller.snapshot())
}
