// OpenUI Controller - Tauri v2
// Main entry point

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod tray;

use anyhow::Context;
use openui_controller::capability::{CloseAction, ErrorSurface, TrayCapability};
use openui_controller::controller::{LifecycleController, StatusReport, StatusSummary};
use openui_controller::{logging, LauncherSettings, LifecycleError};
use std::sync::Arc;
use std::time::Duration;
use tauri::{AppHandle, Emitter, Manager, State, WindowEvent};
use tauri_plugin_shell::ShellExt;

const EVENT_STATUS: &str = "status-changed";
const EVENT_STATUS_TEXT: &str = "status-text";
const EVENT_START_PROGRESS: &str = "start-progress";
const EVENT_OPERATION_STARTED: &str = "operation-started";
const EVENT_OPERATION_FINISHED: &str = "operation-finished";
const EVENT_ERROR: &str = "launcher-error";

const STATUS_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, serde::Serialize)]
struct ErrorPayload {
    title: String,
    message: String,
}

/// Tauri command to get service status
#[tauri::command]
async fn get_status(
    controller: State<'_, Arc<LifecycleController>>,
) -> Result<StatusReport, String> {
    Ok(controller.status_report().await)
}

/// Tauri command to start both services (returns immediately)
#[tauri::command]
fn start_services(app: AppHandle) {
    spawn_start_all(app);
}

/// Tauri command to stop both services (returns immediately)
#[tauri::command]
fn stop_services(app: AppHandle) {
    spawn_stop_all(app);
}

/// Tauri command to open the web UI in the default browser
#[tauri::command]
fn open_web_ui(app: AppHandle) {
    open_browser(&app);
}

pub(crate) fn spawn_start_all(app: AppHandle) {
    tauri::async_runtime::spawn(async move {
        start_all_and_open(app).await;
    });
}

pub(crate) fn spawn_stop_all(app: AppHandle) {
    tauri::async_runtime::spawn(async move {
        stop_all_and_settle(app).await;
    });
}

pub(crate) fn open_browser(app: &AppHandle) {
    let url = app.state::<LauncherSettings>().browser_url.clone();
    #[allow(deprecated)]
    if let Err(e) = app.shell().open(url.as_str(), None) {
        tracing::warn!(url = %url, error = %e, "failed to open browser");
    }
}

/// Stop services, then exit
pub(crate) fn quit(app: &AppHandle) {
    tracing::info!("closing application...");
    let controller = app.state::<Arc<LifecycleController>>().inner().clone();
    tauri::async_runtime::block_on(async move {
        controller.stop_all().await;
    });
    app.exit(0);
}

/// Start both services, then open the browser
async fn start_all_and_open(app: AppHandle) {
    let controller = app.state::<Arc<LifecycleController>>().inner().clone();
    let settings = app.state::<LauncherSettings>().inner().clone();

    app.emit(EVENT_OPERATION_STARTED, ()).ok();

    let progress_app = app.clone();
    let result = controller
        .start_all(move |progress| {
            progress_app.emit(EVENT_START_PROGRESS, progress).ok();
        })
        .await;

    match result {
        Ok(()) => {
            tokio::time::sleep(settings.ready_pause).await;
            if settings.open_browser_on_ready {
                open_browser(&app);
            }
            emit_status(&app, &controller).await;
        }
        Err(e) if e.is_cancelled() => {
            tracing::info!(error = %e, "startup interrupted by stop");
        }
        Err(e) => {
            app.emit(EVENT_STATUS_TEXT, "❌ Start error").ok();
            report_error(&app, "Startup error", &e);
        }
    }

    app.emit(EVENT_OPERATION_FINISHED, ()).ok();
}

/// Stop both services and refresh status after they had time to exit
async fn stop_all_and_settle(app: AppHandle) {
    let controller = app.state::<Arc<LifecycleController>>().inner().clone();
    let settle = app.state::<LauncherSettings>().stop_settle;

    app.emit(EVENT_OPERATION_STARTED, ()).ok();
    app.emit(EVENT_STATUS_TEXT, "🔄 Stopping services...").ok();

    controller.stop_all().await;
    tokio::time::sleep(settle).await;

    emit_status(&app, &controller).await;
    app.emit(EVENT_OPERATION_FINISHED, ()).ok();
}

async fn emit_status(app: &AppHandle, controller: &LifecycleController) {
    let report = controller.status_report().await;
    app.emit(EVENT_STATUS, report).ok();
}

/// Errors go to a dialog only when there is a visible window to show it in
fn report_error(app: &AppHandle, title: &str, error: &LifecycleError) {
    tracing::error!(error = %error, "{title}");
    match ErrorSurface::for_window(tray::main_window_visible(app)) {
        ErrorSurface::Dialog => {
            let payload = ErrorPayload {
                title: title.to_string(),
                message: error.to_string(),
            };
            app.emit(EVENT_ERROR, payload).ok();
        }
        ErrorSurface::LogOnly => {}
    }
}

/// Keep the frontend in sync with processes started or killed outside the launcher
async fn watch_status(app: AppHandle, controller: Arc<LifecycleController>) {
    let mut last: Option<StatusSummary> = None;
    loop {
        let summary = emit_status_if_changed(&app, &controller, last).await;
        last = Some(summary);
        tokio::time::sleep(STATUS_REFRESH_INTERVAL).await;
    }
}

async fn emit_status_if_changed(
    app: &AppHandle,
    controller: &LifecycleController,
    last: Option<StatusSummary>,
) -> StatusSummary {
    let report = controller.status_report().await;
    let summary = report.summary;
    if last != Some(summary) {
        tracing::debug!(?summary, "status changed");
        app.emit(EVENT_STATUS, report).ok();
    }
    summary
}

fn main() {
    if let Err(e) = logging::init_logging() {
        eprintln!("{e:#}");
    }

    if let Err(e) = run() {
        tracing::error!(error = %format!("{e:#}"), "application failed");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let settings = LauncherSettings::from_env();
    let controller = Arc::new(
        LifecycleController::system(&settings).context("failed to build lifecycle controller")?,
    );

    tracing::info!("OpenUI Controller started");

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .manage(settings)
        .manage(controller.clone())
        .setup(move |app| {
            let app_handle = app.handle().clone();

            let tray_result = tray::setup_tray(&app_handle);
            let capability = TrayCapability::from_tray_result(&tray_result);
            if let Ok(menu_state) = tray_result {
                app_handle.manage(menu_state);
            }
            app_handle.manage(capability);

            if capability.window_initially_visible() {
                tray::show_main_window(&app_handle);
            } else {
                tracing::info!("window hidden - left click on the tray icon to show");
            }

            let watch_handle = app_handle.clone();
            let watch_controller = controller.clone();
            tauri::async_runtime::spawn(async move {
                watch_status(watch_handle, watch_controller).await;
            });

            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::CloseRequested { api, .. } = event {
                let app = window.app_handle();
                let capability = *app.state::<TrayCapability>().inner();
                match capability.close_action() {
                    CloseAction::HideToTray => {
                        api.prevent_close();
                        tray::hide_main_window(app);
                    }
                    CloseAction::Quit => {
                        tracing::info!("window close requested, stopping services...");
                        let controller = app.state::<Arc<LifecycleController>>().inner().clone();
                        tauri::async_runtime::block_on(async move {
                            controller.stop_all().await;
                        });
                    }
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_status,
            start_services,
            stop_services,
            open_web_ui,
        ])
        .run(tauri::generate_context!())
        .context("error while running tauri application")?;

    Ok(())
}
