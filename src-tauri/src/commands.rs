// Tauri commands over the shared workspace.
// Storage failures do not fail a command: the returned snapshot carries the
// error for the UI to show, and the in-memory view simply stays where it was.

use std::sync::MutexGuard;

use chrono::Local;
use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;

use crate::counters::CounterPatch;
use crate::report;
use crate::state::{AppState, Snapshot, Workspace};

pub const COUNTERS_CHANGED: &str = "counters-changed";
pub const PREFERENCES_CHANGED: &str = "preferences-changed";

fn lock(state: &AppState) -> Result<MutexGuard<'_, Workspace>, String> {
    state.workspace.lock().map_err(|e| e.to_string())
}

/// Runs `change` under the workspace lock and broadcasts the resulting snapshot.
fn mutate<T>(
    app: &AppHandle,
    state: &AppState,
    event: &str,
    change: impl FnOnce(&mut Workspace) -> T,
) -> Result<Snapshot, String> {
    let snapshot = {
        let mut workspace = lock(state)?;
        change(&mut workspace);
        workspace.recover();
        workspace.snapshot()
    };

    if let Some(error) = &snapshot.storage_error {
        log::warn!("[Commands] Continuing without persistence: {}", error);
    }
    let _ = app.emit(event, &snapshot);
    Ok(snapshot)
}

/// Asks the user before a destructive action.
async fn confirm(app: &AppHandle, title: &str, message: &str, confirm_label: &str) -> bool {
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog()
        .message(message)
        .title(title)
        .kind(MessageDialogKind::Warning)
        .buttons(MessageDialogButtons::OkCancelCustom(
            confirm_label.to_string(),
            "Cancel".to_string(),
        ))
        .show(move |confirmed| {
            let _ = tx.send(confirmed);
        });
    rx.await.unwrap_or(false)
}

#[tauri::command]
pub fn get_snapshot(state: State<AppState>) -> Result<Snapshot, String> {
    Ok(lock(&state)?.snapshot())
}

#[tauri::command]
pub fn add_counter(app: AppHandle, state: State<AppState>) -> Result<Snapshot, String> {
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.add())
}

#[tauri::command]
pub fn update_counter(
    app: AppHandle,
    state: State<AppState>,
    id: String,
    patch: CounterPatch,
) -> Result<Snapshot, String> {
    log::debug!("[Commands] update_counter {} {:?}", id, patch);
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.update(&id, &patch))
}

#[tauri::command]
pub fn increment_counter(
    app: AppHandle,
    state: State<AppState>,
    id: String,
) -> Result<Snapshot, String> {
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.increment(&id))
}

#[tauri::command]
pub fn decrement_counter(
    app: AppHandle,
    state: State<AppState>,
    id: String,
) -> Result<Snapshot, String> {
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.decrement(&id))
}

#[tauri::command]
pub fn rename_counter(
    app: AppHandle,
    state: State<AppState>,
    id: String,
    name: String,
) -> Result<Snapshot, String> {
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.rename(&id, &name))
}

#[tauri::command]
pub fn delete_counter(
    app: AppHandle,
    state: State<AppState>,
    id: String,
) -> Result<Snapshot, String> {
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.delete(&id))
}

#[tauri::command]
pub fn reorder_counters(
    app: AppHandle,
    state: State<AppState>,
    source: usize,
    target: usize,
) -> Result<Snapshot, String> {
    log::debug!("[Commands] reorder_counters {} -> {}", source, target);
    mutate(&app, &state, COUNTERS_CHANGED, |ws| {
        ws.counters.reorder(source, target)
    })
}

#[tauri::command]
pub fn move_counter(
    app: AppHandle,
    state: State<AppState>,
    active_id: String,
    over_id: String,
) -> Result<Snapshot, String> {
    log::debug!("[Commands] move_counter {} over {}", active_id, over_id);
    mutate(&app, &state, COUNTERS_CHANGED, |ws| {
        ws.counters.move_counter(&active_id, &over_id)
    })
}

#[tauri::command]
pub async fn reset_counters(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Snapshot, String> {
    let confirmed = confirm(
        &app,
        "Reset counters",
        "Reset every counter to 0? This cannot be undone.",
        "Reset",
    )
    .await;
    if !confirmed {
        return Ok(lock(&state)?.snapshot());
    }
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.reset_all())
}

#[tauri::command]
pub async fn remove_all_counters(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Snapshot, String> {
    let message = {
        let workspace = lock(&state)?;
        if workspace.counters.binding().is_unreadable() {
            "Stored counters could not be read. Replace them with an empty list? This cannot be undone."
                .to_string()
        } else {
            format!(
                "Delete all {} counters? This cannot be undone.",
                workspace.counters.len()
            )
        }
    };
    let confirmed = confirm(&app, "Delete all", &message, "Delete all")
    .await;
    if !confirmed {
        return Ok(lock(&state)?.snapshot());
    }
    mutate(&app, &state, COUNTERS_CHANGED, |ws| ws.counters.remove_all())
}

#[tauri::command]
pub fn set_title(app: AppHandle, state: State<AppState>, title: String) -> Result<Snapshot, String> {
    mutate(&app, &state, PREFERENCES_CHANGED, |ws| {
        ws.preferences.commit_title(&title)
    })
}

#[tauri::command]
pub fn toggle_theme(app: AppHandle, state: State<AppState>) -> Result<Snapshot, String> {
    mutate(&app, &state, PREFERENCES_CHANGED, |ws| ws.preferences.toggle_theme())
}

/// Writes the PDF report and reveals it. Returns the written path.
#[tauri::command]
pub async fn export_report(app: AppHandle, state: State<'_, AppState>) -> Result<String, String> {
    let ticket = state.exports.try_begin().map_err(|e| e.to_string())?;

    let (counters, title) = {
        let workspace = lock(&state)?;
        (
            workspace.counters.counters().to_vec(),
            workspace.preferences.display_title().to_string(),
        )
    };
    let dir = state.export_dir(app.path().download_dir().ok());

    let path = tauri::async_runtime::spawn_blocking(move || {
        let _ticket = ticket;
        report::export_report(&dir, &counters, &title, Local::now())
    })
    .await
    .map_err(|e| e.to_string())?
    .map_err(|e| {
        log::error!("[Report] Export failed: {}", e);
        e.to_string()
    })?;

    if let Err(e) = app.opener().reveal_item_in_dir(&path) {
        log::warn!("[Report] Could not reveal {}: {}", path.display(), e);
    }
    Ok(path.display().to_string())
}
