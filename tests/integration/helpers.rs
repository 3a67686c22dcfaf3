//! Shared helpers for integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chorewheel::channels::{
    InboundMessage, MessageGateway, OutboundMessage, Outbox, RecipientKind,
};
use chorewheel::config::ChoreConfig;
use chorewheel::cycle::CycleKey;
use chorewheel::model::{AssignmentStatus, CategoryId, ParticipantId, TaskId, WeeklyAssignment};
use chorewheel::scheduler::TriggerKind;
use chorewheel::store::{ChoreStore, SqliteChoreStore};
use chorewheel::{ChoreEngine, TriggerOutcome};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

pub(crate) const GROUP: &str = "household-group";
pub(crate) const ADMIN: &str = "+491700000000";

/// Gateway that records every outbound message instead of sending it.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingGateway {
    /// Remove and return everything sent so far.
    pub(crate) fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().expect("sent lock"))
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        self.sent.lock().expect("sent lock").push(message);
        Ok(())
    }

    async fn run(&self, _inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Texts sent directly to `address`.
pub(crate) fn texts_to(sent: &[OutboundMessage], address: &str) -> Vec<String> {
    sent.iter()
        .filter(|m| m.kind == RecipientKind::Contact && m.recipient == address)
        .map(|m| m.text.clone())
        .collect()
}

/// Texts posted to the household group.
pub(crate) fn group_posts(sent: &[OutboundMessage]) -> Vec<String> {
    sent.iter()
        .filter(|m| m.kind == RecipientKind::Group)
        .map(|m| m.text.clone())
        .collect()
}

/// Monday 2026-10-12 at the given time (UTC), inside week 2026-W42.
pub(crate) fn monday(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 12, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn week() -> CycleKey {
    CycleKey::containing(monday(9))
}

/// An engine over an in-memory store and a recording gateway.
pub(crate) struct Harness {
    pub engine: ChoreEngine,
    pub store: Arc<SqliteChoreStore>,
    pub gateway: Arc<RecordingGateway>,
}

pub(crate) fn test_config() -> ChoreConfig {
    let mut config = ChoreConfig::default();
    config.messaging.group = Some(GROUP.to_owned());
    config.messaging.rate_limit_per_minute = 0;
    config.admin.allowed = vec![ADMIN.to_owned()];
    config.admin.forward_to = Some(ADMIN.to_owned());
    config
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(test_config())
    }

    pub(crate) fn with_config(config: ChoreConfig) -> Self {
        let store = Arc::new(SqliteChoreStore::open_in_memory().expect("in-memory store"));
        let gateway = Arc::new(RecordingGateway::default());
        let outbox = Arc::new(Outbox::new(
            gateway.clone(),
            config.messaging.rate_limit_per_minute,
            config.messaging.group.clone(),
        ));
        let engine = ChoreEngine::new(store.clone(), outbox, &config);
        Self {
            engine,
            store,
            gateway,
        }
    }

    pub(crate) async fn say(&mut self, sender: &str, text: &str, at: DateTime<Utc>) {
        self.engine
            .handle_inbound(&InboundMessage::new(sender, text), at)
            .await
            .expect("inbound handled");
    }

    pub(crate) async fn trigger(&self, kind: TriggerKind, at: DateTime<Utc>) -> TriggerOutcome {
        self.engine
            .run_trigger(kind, at)
            .await
            .expect("trigger ran")
    }

    pub(crate) fn records(&self) -> Vec<WeeklyAssignment> {
        self.store
            .assignments_for_cycle(week())
            .expect("cycle records")
    }

    pub(crate) fn open_holder(&self, task: TaskId) -> Option<ParticipantId> {
        self.records()
            .into_iter()
            .find(|r| r.task_id == task && r.status.is_open())
            .map(|r| r.participant_id)
    }

    pub(crate) fn score(&self, participant: ParticipantId, category: CategoryId) -> u64 {
        self.store
            .ledger_entries()
            .expect("ledger")
            .into_iter()
            .filter(|e| e.participant_id == participant && e.category_id == category)
            .map(|e| e.points)
            .sum()
    }

    /// Give `participant` a starting score through a completed record in an
    /// old cycle.
    pub(crate) fn seed_score(
        &self,
        participant: ParticipantId,
        task: TaskId,
        category: CategoryId,
        points: u32,
    ) {
        let old = CycleKey::new(2020, 10).expect("valid cycle");
        let record = self
            .store
            .create_pending(old, task, participant)
            .expect("create")
            .expect("no open record in the old cycle");
        assert!(
            self.store
                .transition(record.id, AssignmentStatus::Pending, AssignmentStatus::Confirmed)
                .expect("confirm")
        );
        assert!(
            self.store
                .complete_and_credit(record.id, Some(category), points)
                .expect("credit")
        );
    }
}
