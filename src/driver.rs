//! Driver spawns and manages the link tasks

use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::SensorProvider;
use crate::sampler::Sampler;
use crate::session::{SessionManager, SessionPhase};
use crate::state::{SessionState, StateSnapshot};
use crate::stats::{LinkStats, StatsSnapshot};
use crate::transport::Connector;
use crate::{LinkConfig, LinkError, Result};

/// Driver spawns the session manager and the sampler
///
/// The two tasks share one [`SessionState`] and nothing else. The session
/// manager owns the connector, the sampler owns the sensor.
pub struct Driver;

impl Driver {
    /// Validate `config` and spawn both tasks on the current runtime
    pub fn spawn<C, S>(connector: C, sensor: S, config: &LinkConfig) -> Result<LinkHandle>
    where
        C: Connector,
        S: SensorProvider,
    {
        config.validate()?;

        let state = SessionState::from_config(config)?;
        let stats = Arc::new(LinkStats::new());
        let cancel = CancellationToken::new();

        let manager =
            SessionManager::new(connector, state.clone(), config, Arc::clone(&stats), cancel.clone());
        let phases = manager.phases();
        let sampler = Sampler::new(sensor, state.clone(), config, Arc::clone(&stats), cancel.clone());

        let tasks = vec![tokio::spawn(manager.run()), tokio::spawn(sampler.run())];

        info!(
            peer = %config.peer,
            rate = %state.rate(),
            rates = ?state.allowed_rates().rates(),
            "Link tasks spawned"
        );
        Ok(LinkHandle { state, phases, stats, cancel, tasks })
    }
}

/// Handle to a running link
///
/// Dropping the handle cancels both tasks.
pub struct LinkHandle {
    state: SessionState,
    phases: watch::Receiver<SessionPhase>,
    stats: Arc<LinkStats>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LinkHandle {
    /// Shared state, for inspection
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Current session phase
    pub fn phase(&self) -> SessionPhase {
        *self.phases.borrow()
    }

    /// Phase changes as a stream, starting with the current phase
    pub fn phase_updates(&self) -> impl Stream<Item = SessionPhase> + 'static {
        WatchStream::new(self.phases.clone())
    }

    /// Wait until the session manager enters `phase`
    pub async fn wait_for_phase(&self, phase: SessionPhase) -> Result<()> {
        let mut phases = self.phases.clone();
        match phases.wait_for(|p| *p == phase).await {
            Ok(_) => Ok(()),
            Err(_) => Err(LinkError::connection_failed("session manager stopped")),
        }
    }

    /// Token cancelling both tasks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel both tasks and wait for them to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Link task ended abnormally");
            }
        }
        info!("Link shut down");
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        debug!("Dropping link handle");
        self.cancel.cancel();
    }
}
