// OpenUI Controller - Process table
// Lookup, detached spawn and termination of managed service processes

use crate::config::{LaunchCommand, ProcessMatcher};
use crate::error::{LifecycleError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
#[cfg(target_os = "windows")]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// PIDs of every process matching `matcher`, excluding the launcher itself.
    async fn find(&self, matcher: &ProcessMatcher) -> Result<Vec<u32>>;

    /// Launch `command` detached from the launcher and return its PID.
    async fn spawn(&self, command: &LaunchCommand) -> Result<u32>;

    /// Send a termination signal to every matching process.
    ///
    /// Returns the number of processes signalled. Zero matches is not an error.
    async fn terminate(&self, matcher: &ProcessMatcher) -> Result<usize>;
}

/// OS process table
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );
        system
    }

    fn matching_pids(system: &System, matcher: &ProcessMatcher) -> Vec<Pid> {
        let own_pid = sysinfo::get_current_pid().ok();
        system
            .processes()
            .iter()
            .filter(|(pid, _)| Some(**pid) != own_pid)
            // Threads show up as their own entries on Linux; only whole processes count.
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter(|(_, process)| {
                let name = process.name().to_string_lossy();
                let command_line = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ");
                matcher.matches(&name, &command_line)
            })
            .map(|(pid, _)| *pid)
            .collect()
    }
}

#[async_trait]
impl ProcessBackend for SystemProcessTable {
    async fn find(&self, matcher: &ProcessMatcher) -> Result<Vec<u32>> {
        let matcher = matcher.clone();
        tokio::task::spawn_blocking(move || {
            let system = Self::snapshot();
            Self::matching_pids(&system, &matcher)
                .into_iter()
                .map(|pid| pid.as_u32())
                .collect()
        })
        .await
        .map_err(|e| LifecycleError::process_query(e.to_string()))
    }

    async fn spawn(&self, command: &LaunchCommand) -> Result<u32> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(target_os = "windows")]
        cmd.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);

        let child = cmd.spawn().map_err(|source| LifecycleError::SpawnFailed {
            program: command.program.clone(),
            source,
        })?;

        // Dropping the handle detaches the child; tokio reaps it once it exits.
        let pid = child.id().unwrap_or_default();
        tracing::info!(program = %command.program, pid, "spawned detached process");
        Ok(pid)
    }

    async fn terminate(&self, matcher: &ProcessMatcher) -> Result<usize> {
        let matcher = matcher.clone();
        let pattern = matcher.pattern().to_string();
        let (signalled, failed) = tokio::task::spawn_blocking(move || {
            let system = Self::snapshot();
            let mut signalled = 0usize;
            let mut failed = 0usize;
            for pid in Self::matching_pids(&system, &matcher) {
                let Some(process) = system.process(pid) else {
                    continue;
                };
                let delivered = process
                    .kill_with(Signal::Term)
                    .unwrap_or_else(|| process.kill());
                if delivered {
                    signalled += 1;
                } else {
                    failed += 1;
                }
            }
            (signalled, failed)
        })
        .await
        .map_err(|e| LifecycleError::process_query(e.to_string()))?;

        tracing::debug!(pattern = %pattern, signalled, failed, "sent termination signal");
        if failed > 0 {
            return Err(LifecycleError::Terminate { pattern, failed });
        }
        Ok(signalled)
    }
}
