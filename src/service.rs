// OpenUI Controller - Managed service state
// Per-service lifecycle state, the lock that serializes spawn/stop, and the stop signal

use crate::config::ServiceSpec;
use std::sync::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard};

/// Service lifecycle state for the frontend
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Stopped,
    Starting,
    WaitingReady,
    Running,
    Error,
}

/// What happened to a service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    StartRequested,
    Spawned,
    AlreadyRunning,
    SpawnFailed,
    Ready,
    TimedOut,
    StopRequested,
    /// A process-table observation outside of any start/stop operation
    Observed { running: bool },
}

impl LifecycleState {
    /// Next state after `event`. Events that make no sense in the current state leave it unchanged.
    pub fn on(self, event: LifecycleEvent) -> LifecycleState {
        use LifecycleEvent as E;
        use LifecycleState as S;

        match (self, event) {
            (_, E::StopRequested) => S::Stopped,
            (S::Starting | S::WaitingReady, E::Observed { .. }) => self,
            (_, E::Observed { running: true }) => S::Running,
            (S::Running, E::Observed { running: false }) => S::Stopped,
            (_, E::Observed { running: false }) => self,
            (S::Starting | S::WaitingReady, E::StartRequested) => self,
            (_, E::StartRequested) => S::Starting,
            (S::Starting, E::Spawned | E::AlreadyRunning) => S::WaitingReady,
            (S::Starting, E::SpawnFailed) => S::Error,
            (S::WaitingReady, E::Ready) => S::Running,
            (S::WaitingReady, E::TimedOut) => S::Error,
            (state, _) => state,
        }
    }
}

/// Runtime handle for one managed service
pub struct ManagedService {
    spec: ServiceSpec,
    state: Mutex<LifecycleState>,
    op_lock: AsyncMutex<()>,
    stop_signal: watch::Sender<u64>,
}

impl ManagedService {
    pub fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(LifecycleState::Stopped),
            op_lock: AsyncMutex::new(()),
            stop_signal: watch::Sender::new(0),
        }
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.display_name
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Apply `event` and return the resulting state
    pub fn apply(&self, event: LifecycleEvent) -> LifecycleState {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = guard.on(event);
        if next != *guard {
            tracing::debug!(service = %self.spec.display_name, from = ?*guard, to = ?next, ?event, "state change");
        }
        *guard = next;
        next
    }

    /// Held around the running check and spawn of a start, and around a stop
    pub async fn lock_operation(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().await
    }

    /// Receiver that fires on the next stop request
    pub fn subscribe_stop(&self) -> watch::Receiver<u64> {
        self.stop_signal.subscribe()
    }

    /// Wake any start still waiting for readiness
    pub fn signal_stop(&self) {
        self.stop_signal.send_modify(|generation| *generation += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use LifecycleState as S;

    #[test]
    fn successful_start_walks_through_waiting() {
        let state = S::Stopped
            .on(E::StartRequested)
            .on(E::Spawned)
            .on(E::Ready);
        assert_eq!(state, S::Running);

        assert_eq!(S::Stopped.on(E::StartRequested), S::Starting);
        assert_eq!(S::Starting.on(E::AlreadyRunning), S::WaitingReady);
    }

    #[test]
    fn failures_land_in_error() {
        assert_eq!(S::Starting.on(E::SpawnFailed), S::Error);
        assert_eq!(S::WaitingReady.on(E::TimedOut), S::Error);
        assert_eq!(S::Error.on(E::StartRequested), S::Starting);
    }

    #[test]
    fn stop_always_wins() {
        for state in [S::Stopped, S::Starting, S::WaitingReady, S::Running, S::Error] {
            assert_eq!(state.on(E::StopRequested), S::Stopped);
        }
    }

    #[test]
    fn observations_reconcile_idle_states_only() {
        assert_eq!(S::Running.on(E::Observed { running: false }), S::Stopped);
        assert_eq!(S::Stopped.on(E::Observed { running: true }), S::Running);
        assert_eq!(S::Error.on(E::Observed { running: true }), S::Running);
        assert_eq!(S::Error.on(E::Observed { running: false }), S::Error);
        assert_eq!(S::Starting.on(E::Observed { running: false }), S::Starting);
        assert_eq!(S::WaitingReady.on(E::Observed { running: true }), S::WaitingReady);
    }

    #[tokio::test]
    async fn stop_signal_reaches_earlier_subscribers_only() {
        let service = ManagedService::new(crate::config::ServiceSpec::model_server("ollama"));
        let mut before = service.subscribe_stop();

        service.signal_stop();
        let mut after = service.subscribe_stop();

        assert!(before.has_changed().unwrap());
        before.changed().await.unwrap();
        assert!(!after.has_changed().unwrap());
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        assert_eq!(S::Stopped.on(E::Ready), S::Stopped);
        assert_eq!(S::Running.on(E::TimedOut), S::Running);
        assert_eq!(S::Starting.on(E::Ready), S::Starting);
    }
}
