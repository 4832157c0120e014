// OpenUI Controller - System tray and main window visibility

use openui_controller::capability::toggle_label;
use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{AppHandle, Manager};

const TRAY_ID: &str = "openui-controller-tray";
const MAIN_WINDOW: &str = "main";

const MENU_TOGGLE: &str = "toggle-window";
const MENU_START: &str = "start-services";
const MENU_STOP: &str = "stop-services";
const MENU_OPEN: &str = "open-webui";
const MENU_QUIT: &str = "quit";

/// Tray items whose text changes at runtime
pub struct TrayMenuState {
    toggle_item: MenuItem<tauri::Wry>,
}

pub fn setup_tray(app: &AppHandle) -> tauri::Result<TrayMenuState> {
    let toggle_item = MenuItem::with_id(app, MENU_TOGGLE, toggle_label(false), true, None::<&str>)?;
    let start_item = MenuItem::with_id(app, MENU_START, "🚀 Start Services", true, None::<&str>)?;
    let stop_item = MenuItem::with_id(app, MENU_STOP, "⏹️ Stop Services", true, None::<&str>)?;
    let open_item = MenuItem::with_id(app, MENU_OPEN, "🌐 Open WebUI", true, None::<&str>)?;
    let quit_item = MenuItem::with_id(app, MENU_QUIT, "❌ Quit", true, None::<&str>)?;

    let menu = Menu::with_items(
        app,
        &[
            &toggle_item,
            &PredefinedMenuItem::separator(app)?,
            &start_item,
            &stop_item,
            &open_item,
            &PredefinedMenuItem::separator(app)?,
            &quit_item,
        ],
    )?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .menu(&menu)
        .tooltip("OpenUI Controller")
        .show_menu_on_left_click(false)
        .on_menu_event(|app, event| handle_menu_event(app, event.id().as_ref()))
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                toggle_main_window(tray.app_handle());
            }
        });

    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }
    builder.build(app)?;

    tracing::info!("system tray active - right click for menu");
    Ok(TrayMenuState { toggle_item })
}

fn handle_menu_event(app: &AppHandle, id: &str) {
    match id {
        MENU_TOGGLE => toggle_main_window(app),
        MENU_START => {
            if !main_window_visible(app) {
                show_main_window(app);
            }
            crate::spawn_start_all(app.clone());
        }
        MENU_STOP => crate::spawn_stop_all(app.clone()),
        MENU_OPEN => crate::open_browser(app),
        MENU_QUIT => crate::quit(app),
        other => tracing::debug!(id = other, "unhandled tray menu event"),
    }
}

pub fn main_window_visible(app: &AppHandle) -> bool {
    app.get_webview_window(MAIN_WINDOW)
        .and_then(|window| window.is_visible().ok())
        .unwrap_or(false)
}

pub fn show_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        let _ = window.unminimize();
        if let Err(e) = window.show() {
            tracing::warn!(error = %e, "failed to show main window");
        }
        let _ = window.set_focus();
    }
    sync_toggle_label(app, true);
}

pub fn hide_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        if let Err(e) = window.hide() {
            tracing::warn!(error = %e, "failed to hide main window");
        }
    }
    sync_toggle_label(app, false);
}

fn toggle_main_window(app: &AppHandle) {
    if main_window_visible(app) {
        hide_main_window(app);
    } else {
        show_main_window(app);
    }
}

fn sync_toggle_label(app: &AppHandle, visible: bool) {
    if let Some(state) = app.try_state::<TrayMenuState>() {
        if let Err(e) = state.toggle_item.set_text(toggle_label(visible)) {
            tracing::debug!(error = %e, "failed to update tray label");
        }
    }
}
