// OpenUI Controller - Configuration
// Service definitions and launcher settings, built from defaults plus environment overrides

use std::time::Duration;

/// Environment variable names
pub mod keys {
    pub const OLLAMA_BIN: &str = "OPENUI_CONTROLLER_OLLAMA_BIN";
    pub const WEBUI_BIN: &str = "OPENUI_CONTROLLER_WEBUI_BIN";
    pub const READY_ATTEMPTS: &str = "OPENUI_CONTROLLER_READY_ATTEMPTS";
    pub const READY_INTERVAL_MS: &str = "OPENUI_CONTROLLER_READY_INTERVAL_MS";
    pub const PROBE_TIMEOUT_MS: &str = "OPENUI_CONTROLLER_PROBE_TIMEOUT_MS";
    pub const OPEN_BROWSER: &str = "OPENUI_CONTROLLER_OPEN_BROWSER";
}

pub const MODEL_SERVER_READY_URL: &str = "http://localhost:11434/api/tags";
pub const WEB_UI_URL: &str = "http://localhost:8080";

const DEFAULT_READY_ATTEMPTS: u32 = 30;
const READY_ATTEMPTS_MIN: u32 = 1;
const READY_ATTEMPTS_MAX: u32 = 600;
const DEFAULT_READY_INTERVAL_MS: u64 = 1_000;
const READY_INTERVAL_MIN_MS: u64 = 50;
const READY_INTERVAL_MAX_MS: u64 = 10_000;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;
const PROBE_TIMEOUT_MIN_MS: u64 = 100;
const PROBE_TIMEOUT_MAX_MS: u64 = 30_000;

/// The two services this launcher manages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceId {
    ModelServer,
    WebUi,
}

impl ServiceId {
    pub const ALL: [ServiceId; 2] = [ServiceId::ModelServer, ServiceId::WebUi];
}

/// How a service is found in the OS process table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessMatcher {
    /// Substring of the executable name (`pgrep <pattern>`)
    Name(String),
    /// Substring of the full command line (`pgrep -f <pattern>`)
    CommandLine(String),
}

impl ProcessMatcher {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Name(pattern) | Self::CommandLine(pattern) => pattern,
        }
    }

    pub fn matches(&self, name: &str, command_line: &str) -> bool {
        match self {
            Self::Name(pattern) => name.contains(pattern.as_str()),
            Self::CommandLine(pattern) => command_line.contains(pattern.as_str()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn serve(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["serve".to_string()],
        }
    }
}

/// Static description of a managed service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSpec {
    pub id: ServiceId,
    pub display_name: String,
    pub launch: LaunchCommand,
    pub ready_url: String,
    pub matcher: ProcessMatcher,
}

impl ServiceSpec {
    pub fn model_server(program: &str) -> Self {
        Self {
            id: ServiceId::ModelServer,
            display_name: "Ollama".to_string(),
            launch: LaunchCommand::serve(program),
            ready_url: MODEL_SERVER_READY_URL.to_string(),
            matcher: ProcessMatcher::Name("ollama".to_string()),
        }
    }

    pub fn web_ui(program: &str) -> Self {
        Self {
            id: ServiceId::WebUi,
            display_name: "WebUI".to_string(),
            launch: LaunchCommand::serve(program),
            ready_url: WEB_UI_URL.to_string(),
            matcher: ProcessMatcher::CommandLine("open-webui".to_string()),
        }
    }
}

/// Bounded readiness polling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_READY_INTERVAL_MS),
            max_attempts: DEFAULT_READY_ATTEMPTS,
            request_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

/// Launcher settings (never persisted)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LauncherSettings {
    pub model_server: ServiceSpec,
    pub web_ui: ServiceSpec,
    pub readiness: ReadinessPolicy,
    pub browser_url: String,
    pub open_browser_on_ready: bool,
    /// Pause after signalling before the status is refreshed
    pub stop_settle: Duration,
    /// Pause at 100% before the browser opens
    pub ready_pause: Duration,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            model_server: ServiceSpec::model_server("ollama"),
            web_ui: ServiceSpec::web_ui("open-webui"),
            readiness: ReadinessPolicy::default(),
            browser_url: WEB_UI_URL.to_string(),
            open_browser_on_ready: true,
            stop_settle: Duration::from_secs(2),
            ready_pause: Duration::from_secs(1),
        }
    }
}

impl LauncherSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from defaults plus whatever `lookup` returns for each key
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(program) = non_empty(lookup(keys::OLLAMA_BIN)) {
            settings.model_server.launch.program = program;
        }
        if let Some(program) = non_empty(lookup(keys::WEBUI_BIN)) {
            settings.web_ui.launch.program = program;
        }

        settings.readiness.max_attempts = parse_clamped(
            keys::READY_ATTEMPTS,
            lookup(keys::READY_ATTEMPTS),
            DEFAULT_READY_ATTEMPTS as u64,
            READY_ATTEMPTS_MIN as u64,
            READY_ATTEMPTS_MAX as u64,
        ) as u32;
        settings.readiness.interval = Duration::from_millis(parse_clamped(
            keys::READY_INTERVAL_MS,
            lookup(keys::READY_INTERVAL_MS),
            DEFAULT_READY_INTERVAL_MS,
            READY_INTERVAL_MIN_MS,
            READY_INTERVAL_MAX_MS,
        ));
        settings.readiness.request_timeout = Duration::from_millis(parse_clamped(
            keys::PROBE_TIMEOUT_MS,
            lookup(keys::PROBE_TIMEOUT_MS),
            DEFAULT_PROBE_TIMEOUT_MS,
            PROBE_TIMEOUT_MIN_MS,
            PROBE_TIMEOUT_MAX_MS,
        ));

        if let Some(raw) = lookup(keys::OPEN_BROWSER) {
            match parse_bool(&raw) {
                Some(value) => settings.open_browser_on_ready = value,
                None => tracing::warn!(key = keys::OPEN_BROWSER, value = %raw, "ignoring invalid boolean"),
            }
        }

        settings
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_clamped(key: &str, raw: Option<String>, default: u64, min: u64, max: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(value) => {
            let clamped = value.clamp(min, max);
            if clamped != value {
                tracing::warn!(key, value, clamped, "setting out of range, clamping");
            }
            clamped
        }
        Err(_) => {
            tracing::warn!(key, value = %raw, default, "ignoring invalid number");
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_known_endpoints() {
        let settings = LauncherSettings::from_lookup(|_| None);

        assert_eq!(settings.model_server.launch.program, "ollama");
        assert_eq!(settings.model_server.launch.args, vec!["serve"]);
        assert_eq!(settings.model_server.ready_url, "http://localhost:11434/api/tags");
        assert_eq!(settings.web_ui.launch.program, "open-webui");
        assert_eq!(settings.web_ui.ready_url, "http://localhost:8080");
        assert_eq!(settings.readiness.max_attempts, 30);
        assert_eq!(settings.readiness.interval, Duration::from_secs(1));
        assert_eq!(settings.readiness.request_timeout, Duration::from_secs(2));
        assert!(settings.open_browser_on_ready);
    }

    #[test]
    fn overrides_are_applied_and_clamped() {
        let settings = LauncherSettings::from_lookup(lookup_from(&[
            (keys::OLLAMA_BIN, "/opt/ollama/bin/ollama"),
            (keys::WEBUI_BIN, "  "),
            (keys::READY_ATTEMPTS, "5000"),
            (keys::READY_INTERVAL_MS, "250"),
            (keys::PROBE_TIMEOUT_MS, "soon"),
            (keys::OPEN_BROWSER, "off"),
        ]));

        assert_eq!(settings.model_server.launch.program, "/opt/ollama/bin/ollama");
        assert_eq!(settings.web_ui.launch.program, "open-webui");
        assert_eq!(settings.readiness.max_attempts, 600);
        assert_eq!(settings.readiness.interval, Duration::from_millis(250));
        assert_eq!(settings.readiness.request_timeout, Duration::from_secs(2));
        assert!(!settings.open_browser_on_ready);
    }

    #[test]
    fn name_matcher_ignores_command_line() {
        let matcher = ProcessMatcher::Name("ollama".to_string());
        assert!(matcher.matches("ollama", "/usr/bin/ollama serve"));
        assert!(!matcher.matches("python3", "python3 -m ollama_client"));
    }

    #[test]
    fn command_line_matcher_sees_interpreted_scripts() {
        let matcher = ProcessMatcher::CommandLine("open-webui".to_string());
        assert!(matcher.matches("python3", "/home/u/.local/bin/open-webui serve"));
        assert!(!matcher.matches("open-webui", "webui serve"));
    }
}
