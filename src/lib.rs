// OpenUI Controller - Library
// Lifecycle control for a local Ollama model server and Open WebUI

pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod probe;
pub mod process;
pub mod service;

pub use capability::{CloseAction, ErrorSurface, TrayCapability};
pub use config::{LauncherSettings, ServiceId};
pub use controller::{LifecycleController, StartupProgress, StatusReport, StatusSummary};
pub use error::{LifecycleError, Result};
pub use service::LifecycleState;
