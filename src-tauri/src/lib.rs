// Counter X Library Entry Point
// This file exposes all modules so they can be imported by main.rs
// and tested independently.

// Persistence core (no Tauri imports)
pub mod binding;
pub mod storage;

// Domain logic
pub mod counters;
pub mod preferences;
pub mod report;

// Configuration and shared state
pub mod config;
pub mod state;

// Tauri shell
#[cfg(feature = "desktop")]
pub mod commands;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            // A second instance would race on the storage file; focus the first one instead.
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.set_focus();
            }
        }))
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(if cfg!(debug_assertions) {
                    log::LevelFilter::Info
                } else {
                    log::LevelFilter::Warn
                })
                .build(),
        )
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let data_dir = app.path().app_data_dir()?;
            let config = config::AppConfig::load(&data_dir);
            let storage = state::open_storage(&config, &data_dir);
            if !storage.is_available() {
                log::warn!("[Storage] {} is not writable", data_dir.display());
            }
            app.manage(state::AppState::new(storage, config, data_dir));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_snapshot,
            commands::add_counter,
            commands::update_counter,
            commands::increment_counter,
            commands::decrement_counter,
            commands::rename_counter,
            commands::delete_counter,
            commands::reorder_counters,
            commands::move_counter,
            commands::reset_counters,
            commands::remove_all_counters,
            commands::set_title,
            commands::toggle_theme,
            commands::export_report,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
