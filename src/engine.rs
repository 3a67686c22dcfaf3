//! The chore workflow engine.
//!
//! [`ChoreEngine`] owns every piece of workflow state and handles one
//! [`EngineEvent`] at a time. The cycle each event acts on is derived from
//! the event's own timestamp, never from a shared clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::allocation::Allocator;
use crate::channels::{InboundMessage, Outbox};
use crate::commands::Command;
use crate::config::{AdminConfig, ChoreConfig};
use crate::cycle::CycleKey;
use crate::error::Result;
use crate::ledger::ScoreLedger;
use crate::lifecycle::Lifecycle;
use crate::messages;
use crate::model::Participant;
use crate::reassign::ResolveOutcome;
use crate::scheduler::triggers::TriggerKind;
use crate::session::{SessionEngine, SessionReply, UpdateParticipantFlow};
use crate::store::ChoreStore;

/// Work item for the engine queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Inbound {
        message: InboundMessage,
        at: DateTime<Utc>,
    },
    Trigger {
        kind: TriggerKind,
        at: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Inbound { at, .. } | Self::Trigger { at, .. } => *at,
        }
    }
}

/// Summary of one trigger run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Allocated {
        created: usize,
        already_open: usize,
        unassigned: usize,
    },
    Messaged {
        sent: usize,
    },
    Swept {
        expired: usize,
        reassigned: usize,
    },
    Digest {
        posted: bool,
    },
}

impl std::fmt::Display for TriggerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocated {
                created,
                already_open,
                unassigned,
            } => write!(
                f,
                "{created} assignments created, {already_open} already open, {unassigned} unassigned"
            ),
            Self::Messaged { sent } => write!(f, "{sent} messages sent"),
            Self::Swept {
                expired,
                reassigned,
            } => write!(f, "{expired} expired, {reassigned} reassigned"),
            Self::Digest { posted: true } => f.write_str("digest posted"),
            Self::Digest { posted: false } => f.write_str("all tasks accepted, no digest"),
        }
    }
}

pub struct ChoreEngine {
    store: Arc<dyn ChoreStore>,
    outbox: Arc<Outbox>,
    allocator: Allocator,
    lifecycle: Lifecycle,
    ledger: ScoreLedger,
    sessions: SessionEngine,
    admin: AdminConfig,
}

impl ChoreEngine {
    pub fn new(store: Arc<dyn ChoreStore>, outbox: Arc<Outbox>, config: &ChoreConfig) -> Self {
        let ttl = config.session.ttl();
        Self {
            allocator: Allocator::new(store.clone(), config.allocation),
            lifecycle: Lifecycle::new(store.clone(), outbox.clone()),
            ledger: ScoreLedger::new(store.clone()),
            sessions: SessionEngine::new(store.clone(), ttl),
            admin: config.admin.clone(),
            store,
            outbox,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChoreStore> {
        &self.store
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Handle one queued event.
    pub async fn handle_event(&mut self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::Inbound { message, at } => self.handle_inbound(&message, at).await,
            EngineEvent::Trigger { kind, at } => {
                let outcome = self.run_trigger(kind, at).await?;
                info!(trigger = %kind, %outcome, "trigger finished");
                Ok(())
            }
        }
    }

    /// Dispatch one inbound message.
    pub async fn handle_inbound(&mut self, message: &InboundMessage, at: DateTime<Utc>) -> Result<()> {
        if message.from_self {
            debug!(sender = %message.sender, "ignoring own message");
            return Ok(());
        }
        self.sessions.purge_expired(at);

        let Some(participant) = self.store.participant_by_address(&message.sender)? else {
            return self.forward_unknown(message).await;
        };

        let command = Command::parse(&message.text);
        debug!(participant = %participant.id, ?command, "inbound command");

        let is_admin = self.admin.is_admin(&participant.address);
        if command.requires_admin() && !is_admin {
            info!(participant = %participant.id, "admin command refused");
            self.reply(&participant, messages::not_authorized()).await;
            return Ok(());
        }

        match command {
            Command::Reply(reply) => {
                let cycle = CycleKey::containing(at);
                let outcome = self
                    .lifecycle
                    .handle_reply(&participant, reply, cycle, at)
                    .await?;
                debug!(participant = %participant.id, ?outcome, "reply handled");
            }
            Command::Overview => {
                self.reply(&participant, messages::command_overview(is_admin))
                    .await;
            }
            Command::Report => {
                let text = messages::score_report(
                    &self.store.participants()?,
                    &self.store.categories()?,
                    &self.ledger.snapshot()?,
                );
                self.reply(&participant, text).await;
            }
            Command::ChangeNumbers => {
                let reply = self.sessions.start(
                    &participant,
                    Arc::new(UpdateParticipantFlow::new()),
                    at,
                )?;
                self.send_session_reply(&participant, reply).await;
            }
            Command::Cancel => {
                let text = if self.sessions.cancel(&participant, at) {
                    messages::session_cancelled()
                } else {
                    messages::no_session()
                };
                self.reply(&participant, text).await;
            }
            Command::TriggerHelp => {
                self.reply(&participant, messages::trigger_overview()).await;
            }
            Command::Trigger(name) => match TriggerKind::parse(&name) {
                Some(kind) => {
                    let outcome = self.run_trigger(kind, at).await?;
                    info!(participant = %participant.id, trigger = %kind, %outcome, "trigger run on request");
                    self.reply(&participant, messages::trigger_done(kind)).await;
                }
                None => {
                    self.reply(&participant, messages::unknown_trigger(&name))
                        .await;
                }
            },
            Command::Free(text) => {
                let reply = self.sessions.handle(&participant, &text, at)?;
                if reply == SessionReply::NoSession {
                    debug!(participant = %participant.id, "free text without session ignored");
                }
                self.send_session_reply(&participant, reply).await;
            }
        }
        Ok(())
    }

    /// Run one workflow trigger against the cycle containing `at`.
    pub async fn run_trigger(&self, kind: TriggerKind, at: DateTime<Utc>) -> Result<TriggerOutcome> {
        let cycle = CycleKey::containing(at);
        info!(trigger = %kind, %cycle, "running trigger");

        let outcome = match kind {
            TriggerKind::AllocateCycle => {
                let report = self.allocator.allocate_cycle(cycle)?;
                self.lifecycle.announce(&report.created).await?;
                TriggerOutcome::Allocated {
                    created: report.created.len(),
                    already_open: report.already_open.len(),
                    unassigned: report.unassigned.len(),
                }
            }
            TriggerKind::RequestConfirmation => TriggerOutcome::Messaged {
                sent: self.lifecycle.request_confirmation(cycle).await?,
            },
            TriggerKind::RemindPending => TriggerOutcome::Messaged {
                sent: self.lifecycle.remind_pending(cycle).await?,
            },
            TriggerKind::SweepAndReassignPending => {
                let report = self.lifecycle.sweep(cycle).await?;
                TriggerOutcome::Swept {
                    expired: report.expired.len(),
                    reassigned: report
                        .resolutions
                        .iter()
                        .filter(|r| matches!(r, ResolveOutcome::Reassigned(_)))
                        .count(),
                }
            }
            TriggerKind::DigestIfIncomplete => TriggerOutcome::Digest {
                posted: self.lifecycle.digest_if_incomplete(cycle).await?,
            },
            TriggerKind::CompletionSurvey => TriggerOutcome::Messaged {
                sent: self.lifecycle.completion_survey(cycle).await?,
            },
        };
        Ok(outcome)
    }

    async fn forward_unknown(&self, message: &InboundMessage) -> Result<()> {
        match &self.admin.forward_to {
            Some(admin) => {
                info!(sender = %message.sender, "forwarding message from unknown sender");
                self.outbox
                    .to_contact(admin, messages::forwarded(&message.sender, &message.text))
                    .await;
            }
            None => debug!(sender = %message.sender, "dropping message from unknown sender"),
        }
        Ok(())
    }

    async fn reply(&self, participant: &Participant, text: String) {
        self.outbox.to_contact(&participant.address, text).await;
    }

    async fn send_session_reply(&self, participant: &Participant, reply: SessionReply) {
        if let SessionReply::Send(texts) = reply {
            for text in texts {
                self.reply(participant, text).await;
            }
        }
    }
}
