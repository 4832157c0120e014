// OpenUI Controller - Presentation capabilities
// Decisions the desktop shell makes once it knows whether a system tray exists

/// Whether a system tray could be created, resolved once at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrayCapability {
    Available,
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseAction {
    HideToTray,
    Quit,
}

/// Where an operation error goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSurface {
    Dialog,
    LogOnly,
}

impl TrayCapability {
    pub fn from_tray_result<T, E: std::fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Available,
            Err(e) => {
                tracing::warn!(error = %e, "system tray not available, window mode only");
                Self::Unavailable
            }
        }
    }

    /// With a tray the window starts hidden
    pub fn window_initially_visible(self) -> bool {
        self == Self::Unavailable
    }

    pub fn close_action(self) -> CloseAction {
        match self {
            Self::Available => CloseAction::HideToTray,
            Self::Unavailable => CloseAction::Quit,
        }
    }
}

impl ErrorSurface {
    /// A dialog needs a visible window to attach to
    pub fn for_window(window_visible: bool) -> Self {
        if window_visible {
            Self::Dialog
        } else {
            Self::LogOnly
        }
    }
}

/// Tray menu label for the show/hide item
pub fn toggle_label(window_visible: bool) -> &'static str {
    if window_visible {
        "🔽 Hide Window"
    } else {
        "📱 Show Window"
    }
}
