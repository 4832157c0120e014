// OpenUI Controller - Lifecycle controller
// Start/stop/status for the model server and the web UI over injected process and probe backends

use crate::config::{LauncherSettings, ReadinessPolicy, ServiceId};
use crate::error::{LifecycleError, Result};
use crate::probe::{wait_until_ready, HttpProbe, ReadinessProbe};
use crate::process::{ProcessBackend, SystemProcessTable};
use crate::service::{LifecycleEvent, LifecycleState, ManagedService};
use serde::Serialize;
use std::sync::Arc;

/// Coarse status, derived only from the process table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusSummary {
    BothUp,
    OnlyModelServerUp,
    OnlyWebUiUp,
    BothDown,
}

impl StatusSummary {
    pub fn classify(model_server_up: bool, web_ui_up: bool) -> Self {
        match (model_server_up, web_ui_up) {
            (true, true) => Self::BothUp,
            (true, false) => Self::OnlyModelServerUp,
            (false, true) => Self::OnlyWebUiUp,
            (false, false) => Self::BothDown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BothUp => "✅ Services active",
            Self::OnlyModelServerUp => "🟡 Ollama only active",
            Self::OnlyWebUiUp => "🟠 WebUI only active",
            Self::BothDown => "● Services stopped",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Spawned { pid: u32, attempts: u32 },
    AlreadyRunning { attempts: u32 },
}

impl StartOutcome {
    pub fn spawned(&self) -> bool {
        matches!(self, Self::Spawned { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartPhase {
    Launching,
    WaitingReady,
}

/// One step of `start_all`, with the percentage the progress bar shows
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupProgress {
    pub percent: u8,
    pub message: String,
}

impl StartupProgress {
    fn step(id: ServiceId, name: &str, phase: StartPhase) -> Self {
        let (percent, message) = match (id, phase) {
            (ServiceId::ModelServer, StartPhase::Launching) => (10, format!("🔄 Starting {name}...")),
            (ServiceId::ModelServer, StartPhase::WaitingReady) => (30, format!("⏳ Waiting for {name}...")),
            (ServiceId::WebUi, StartPhase::Launching) => (50, format!("🔄 Starting {name}...")),
            (ServiceId::WebUi, StartPhase::WaitingReady) => (70, format!("⏳ Waiting for {name}...")),
        };
        Self { percent, message }
    }

    pub fn ready() -> Self {
        Self {
            percent: 100,
            message: "✅ Services ready!".to_string(),
        }
    }
}

/// Snapshot handed to the frontend
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub summary: StatusSummary,
    pub label: String,
    pub model_server: LifecycleState,
    pub web_ui: LifecycleState,
}

pub struct LifecycleController {
    processes: Arc<dyn ProcessBackend>,
    probe: Arc<dyn ReadinessProbe>,
    readiness: ReadinessPolicy,
    model_server: ManagedService,
    web_ui: ManagedService,
}

impl LifecycleController {
    pub fn new(
        settings: &LauncherSettings,
        processes: Arc<dyn ProcessBackend>,
        probe: Arc<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            processes,
            probe,
            readiness: settings.readiness,
            model_server: ManagedService::new(settings.model_server.clone()),
            web_ui: ManagedService::new(settings.web_ui.clone()),
        }
    }

    /// Controller backed by the OS process table and an HTTP probe
    pub fn system(settings: &LauncherSettings) -> Result<Self> {
        let probe = HttpProbe::new(settings.readiness.request_timeout)?;
        Ok(Self::new(
            settings,
            Arc::new(SystemProcessTable::new()),
            Arc::new(probe),
        ))
    }

    pub fn service(&self, id: ServiceId) -> &ManagedService {
        match id {
            ServiceId::ModelServer => &self.model_server,
            ServiceId::WebUi => &self.web_ui,
        }
    }

    pub fn state(&self, id: ServiceId) -> LifecycleState {
        self.service(id).state()
    }

    /// Whether a matching process exists. Query failures count as "not running".
    pub async fn is_running(&self, id: ServiceId) -> bool {
        let service = self.service(id);
        match self.processes.find(&service.spec().matcher).await {
            Ok(pids) => !pids.is_empty(),
            Err(e) => {
                tracing::warn!(service = %service.name(), error = %e, "process query failed, assuming not running");
                false
            }
        }
    }

    /// Start `id` if needed and wait for it to answer its readiness probe
    pub async fn start(&self, id: ServiceId) -> Result<StartOutcome> {
        self.start_with(id, &|_: StartPhase| {}).await
    }

    async fn start_with(
        &self,
        id: ServiceId,
        on_phase: &(dyn Fn(StartPhase) + Send + Sync),
    ) -> Result<StartOutcome> {
        let service = self.service(id);
        let spec = service.spec();

        // The lock covers check-then-spawn only, so a stop never waits on readiness polling.
        let op = service.lock_operation().await;
        let mut stop_requested = service.subscribe_stop();
        service.apply(LifecycleEvent::StartRequested);
        on_phase(StartPhase::Launching);

        let spawned_pid = if self.is_running(id).await {
            tracing::info!(service = %spec.display_name, "already running, not spawning");
            service.apply(LifecycleEvent::AlreadyRunning);
            None
        } else {
            tracing::info!(service = %spec.display_name, program = %spec.launch.program, "starting service");
            match self.processes.spawn(&spec.launch).await {
                Ok(pid) => {
                    service.apply(LifecycleEvent::Spawned);
                    Some(pid)
                }
                Err(e) => {
                    tracing::error!(service = %spec.display_name, error = %e, "failed to spawn");
                    service.apply(LifecycleEvent::SpawnFailed);
                    return Err(e);
                }
            }
        };
        drop(op);

        on_phase(StartPhase::WaitingReady);
        let ready = wait_until_ready(
            self.probe.as_ref(),
            &spec.display_name,
            &spec.ready_url,
            &self.readiness,
        );
        let result = tokio::select! {
            result = ready => result,
            _ = stop_requested.changed() => {
                tracing::info!(service = %spec.display_name, "stop requested, abandoning readiness wait");
                return Err(LifecycleError::Cancelled {
                    service: spec.display_name.clone(),
                });
            }
        };

        match result {
            Ok(attempts) => {
                service.apply(LifecycleEvent::Ready);
                Ok(match spawned_pid {
                    Some(pid) => StartOutcome::Spawned { pid, attempts },
                    None => StartOutcome::AlreadyRunning { attempts },
                })
            }
            Err(e) => {
                tracing::error!(service = %spec.display_name, error = %e, "service failed to become ready");
                service.apply(LifecycleEvent::TimedOut);
                Err(e)
            }
        }
    }

    /// Signal every process of `id` to terminate. Returns how many were signalled.
    pub async fn stop(&self, id: ServiceId) -> Result<usize> {
        let service = self.service(id);
        let _op = service.lock_operation().await;

        tracing::info!(service = %service.name(), "stopping service");
        service.signal_stop();
        let result = self.processes.terminate(&service.spec().matcher).await;
        service.apply(LifecycleEvent::StopRequested);
        result
    }

    /// Start the model server, then the web UI. Stops at the first failure.
    pub async fn start_all<F>(&self, progress: F) -> Result<()>
    where
        F: Fn(StartupProgress) + Send + Sync,
    {
        for id in ServiceId::ALL {
            let name = self.service(id).name().to_string();
            let report = |phase: StartPhase| progress(StartupProgress::step(id, &name, phase));
            self.start_with(id, &report).await?;
        }
        progress(StartupProgress::ready());
        Ok(())
    }

    /// Stop both services. Individual failures are logged and otherwise ignored.
    pub async fn stop_all(&self) {
        let (model_server, web_ui) =
            tokio::join!(self.stop(ServiceId::ModelServer), self.stop(ServiceId::WebUi));

        for (id, result) in [(ServiceId::ModelServer, model_server), (ServiceId::WebUi, web_ui)] {
            match result {
                Ok(signalled) => {
                    tracing::info!(service = %self.service(id).name(), signalled, "stop requested")
                }
                Err(e) => {
                    tracing::warn!(service = %self.service(id).name(), error = %e, "stop failed (ignored)")
                }
            }
        }
    }

    /// Classify from the two process-table checks
    pub async fn status_summary(&self) -> StatusSummary {
        let (model_server_up, web_ui_up) = tokio::join!(
            self.is_running(ServiceId::ModelServer),
            self.is_running(ServiceId::WebUi)
        );
        self.model_server
            .apply(LifecycleEvent::Observed { running: model_server_up });
        self.web_ui.apply(LifecycleEvent::Observed { running: web_ui_up });
        StatusSummary::classify(model_server_up, web_ui_up)
    }

    pub async fn status_report(&self) -> StatusReport {
        let summary = self.status_summary().await;
        StatusReport {
            summary,
            label: summary.label().to_string(),
            model_server: self.model_server.state(),
            web_ui: self.web_ui.state(),
        }
    }
}
