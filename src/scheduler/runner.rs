//! Scheduler background loop.
//!
//! Spawns a tokio task that periodically checks for due triggers and
//! queues them for the engine. The last run of every trigger is persisted
//! to `scheduler.json` in the data directory so a restart neither repeats a
//! slot that already ran nor forgets one that was missed while down.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::EngineEvent;
use crate::error::{ChoreError, Result};
use crate::scheduler::triggers::{ScheduledTrigger, TriggerKind};

/// Interval between scheduler ticks (seconds).
const DEFAULT_TICK_SECS: u64 = 30;

/// Persisted run state of one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TriggerRun {
    kind: TriggerKind,
    last_run: DateTime<Utc>,
}

/// Persisted scheduler state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchedulerState {
    /// Schema version.
    #[serde(default = "default_state_version")]
    version: u8,
    #[serde(default)]
    runs: Vec<TriggerRun>,
}

fn default_state_version() -> u8 {
    1
}

/// Fires workflow triggers on their weekly schedule.
pub struct TriggerScheduler {
    triggers: Vec<ScheduledTrigger>,
    /// Path to persisted scheduler state. `None` keeps state in memory only.
    state_path: Option<PathBuf>,
    /// Engine queue that receives due triggers.
    events_tx: mpsc::Sender<EngineEvent>,
    tick_secs: u64,
}

impl TriggerScheduler {
    pub fn new(triggers: Vec<ScheduledTrigger>, events_tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            triggers,
            state_path: Some(Self::default_state_path()),
            events_tx,
            tick_secs: DEFAULT_TICK_SECS,
        }
    }

    /// Persist state at `path` instead of the default location.
    pub fn with_state_path(mut self, path: Option<PathBuf>) -> Self {
        self.state_path = path;
        self
    }

    pub fn with_tick_secs(mut self, secs: u64) -> Self {
        self.tick_secs = secs.max(1);
        self
    }

    pub fn triggers(&self) -> &[ScheduledTrigger] {
        &self.triggers
    }

    /// Default path for the scheduler state file.
    pub fn default_state_path() -> PathBuf {
        crate::paths::data_dir().join("scheduler.json")
    }

    /// Restore persisted last runs. Triggers without a persisted run are
    /// armed at `now`, so slots that passed before the first start never fire.
    pub fn load_state(&mut self, now: DateTime<Utc>) {
        let state = match load_state_from_path(self.state_path.as_ref()) {
            Ok(state) => state,
            Err(e) => {
                warn!("cannot load scheduler state: {e}");
                SchedulerState::default()
            }
        };

        for trigger in &mut self.triggers {
            let persisted = state
                .runs
                .iter()
                .find(|run| run.kind == trigger.kind)
                .map(|run| run.last_run);
            trigger.last_run = Some(persisted.unwrap_or(now));
        }

        if let Some(path) = &self.state_path {
            debug!("loaded scheduler state from {}", path.display());
        }
    }

    fn save_state(&self) {
        let state = SchedulerState {
            version: default_state_version(),
            runs: self
                .triggers
                .iter()
                .filter_map(|t| {
                    t.last_run.map(|last_run| TriggerRun {
                        kind: t.kind,
                        last_run,
                    })
                })
                .collect(),
        };
        if let Err(e) = save_state_to_path(self.state_path.as_ref(), &state) {
            error!("cannot persist scheduler state: {e}");
        }
    }

    /// Queue every due trigger. Returns how many were queued.
    ///
    /// # Errors
    ///
    /// Returns an error once the engine queue is closed.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let due: Vec<TriggerKind> = self
            .triggers
            .iter()
            .filter(|t| t.is_due(now))
            .map(|t| t.kind)
            .collect();

        for kind in &due {
            debug!(trigger = %kind, "trigger due");
            self.events_tx
                .send(EngineEvent::Trigger { kind: *kind, at: now })
                .await
                .map_err(|_| ChoreError::Scheduler("engine queue closed".to_owned()))?;
            if let Some(trigger) = self.triggers.iter_mut().find(|t| t.kind == *kind) {
                trigger.mark_run(now);
            }
        }

        if !due.is_empty() {
            self.save_state();
        }
        Ok(due.len())
    }

    /// Start the scheduler background loop.
    pub fn run(mut self) -> tokio::task::JoinHandle<()> {
        self.load_state(Utc::now());

        tokio::spawn(async move {
            let enabled = self.triggers.iter().filter(|t| t.enabled).count();
            info!("scheduler started with {enabled} enabled triggers");
            for trigger in self.triggers.iter().filter(|t| t.enabled) {
                debug!(trigger = %trigger.kind, schedule = %trigger.schedule, "trigger armed");
            }

            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(self.tick_secs));
            loop {
                interval.tick().await;
                if let Err(e) = self.tick(Utc::now()).await {
                    debug!("scheduler stopping: {e}");
                    return;
                }
            }
        })
    }
}

fn load_state_from_path(path: Option<&PathBuf>) -> Result<SchedulerState> {
    let Some(path) = path else {
        return Ok(SchedulerState::default());
    };

    let bytes = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SchedulerState::default());
        }
        Err(e) => {
            return Err(ChoreError::Scheduler(format!("cannot read state: {e}")));
        }
    };

    serde_json::from_slice(&bytes)
        .map_err(|e| ChoreError::Scheduler(format!("cannot parse state: {e}")))
}

fn save_state_to_path(path: Option<&PathBuf>, state: &SchedulerState) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ChoreError::Scheduler(format!("cannot create state dir: {e}")))?;
    }

    let json = serde_json::to_string_pretty(state)
        .map_err(|e| ChoreError::Scheduler(format!("cannot serialize state: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| ChoreError::Scheduler(format!("cannot write state: {e}")))?;
    Ok(())
}
