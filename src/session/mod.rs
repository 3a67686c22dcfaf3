//! Multi-step interactive sessions for administrative dialogues.
//!
//! Sub-modules:
//! - `flow`: the [`Flow`] trait and [`UpdateParticipantFlow`].
//! - `store`: per-owner [`SessionStore`] with expiry.
//! - `replies`: the correlated [`ReplyRegister`].
//!
//! [`SessionEngine`] runs a flow's script: every inbound message is consumed
//! by exactly one `Await` step, after which the following `Prompt` steps are
//! sent until the next `Await` or the end of the script.

pub mod flow;
pub mod replies;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

pub use flow::{Captured, Flow, Step, UpdateParticipantFlow};
pub use replies::{CorrelationId, ReplyError, ReplyRegister};
pub use store::{InteractiveSession, SessionId, SessionStore};

use crate::error::{ChoreError, Result};
use crate::messages;
use crate::model::Participant;
use crate::store::ChoreStore;

impl From<ReplyError> for ChoreError {
    fn from(e: ReplyError) -> Self {
        ChoreError::Session(e.to_string())
    }
}

/// What the caller should do after feeding a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReply {
    /// Send these texts to the owner, in order.
    Send(Vec<String>),
    /// The owner has no live session.
    NoSession,
}

pub struct SessionEngine {
    store: Arc<dyn ChoreStore>,
    sessions: SessionStore,
    replies: ReplyRegister,
    ttl: Duration,
}

impl SessionEngine {
    pub fn new(store: Arc<dyn ChoreStore>, ttl: Duration) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
            replies: ReplyRegister::new(),
            ttl,
        }
    }

    pub fn has_session(&mut self, owner: &Participant, now: DateTime<Utc>) -> bool {
        self.live(owner, now).is_some()
    }

    /// Start `flow` for `owner`. Refused while the owner has a live session.
    pub fn start(
        &mut self,
        owner: &Participant,
        flow: Arc<dyn Flow>,
        now: DateTime<Utc>,
    ) -> Result<SessionReply> {
        if self.has_session(owner, now) || self.replies.is_waiting(&owner.address, now) {
            return Ok(SessionReply::Send(vec![messages::session_busy()]));
        }

        let mut session = InteractiveSession {
            id: SessionId::new(),
            owner: owner.id,
            flow: flow.clone(),
            step: 0,
            values: HashMap::new(),
            awaiting: None,
            expires_at: now + self.ttl,
        };
        let mut out = vec![flow.opening(self.store.as_ref())?];
        info!(session = %session.id, owner = %owner.id, flow = flow.name(), "session started");
        self.advance(owner, &mut session, &mut out, now)?;
        Ok(SessionReply::Send(out))
    }

    /// Feed one inbound message to the owner's session.
    pub fn handle(
        &mut self,
        owner: &Participant,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionReply> {
        self.replies.purge_expired(now);
        let Some(mut session) = self.live(owner, now) else {
            return Ok(SessionReply::NoSession);
        };

        if self.replies.claim(&owner.address, now).is_none() {
            // The wait lapsed or was never opened; the session cannot continue.
            debug!(session = %session.id, "session has no open reply wait, dropping");
            self.sessions.cancel(owner.id);
            return Ok(SessionReply::NoSession);
        }
        session.awaiting = None;

        let field = match session.flow.script().get(session.step) {
            Some(Step::Await { field }) => *field,
            _ => {
                self.sessions.cancel(owner.id);
                return Err(ChoreError::Session(format!(
                    "session {} is not waiting for input",
                    session.id
                )));
            }
        };

        let captured =
            session
                .flow
                .accept(field, text, &session.values, self.store.as_ref())?;
        let mut out = Vec::new();
        match captured {
            Captured::Rejected(reason) => {
                out.push(reason);
                self.wait(owner, &mut session, now)?;
                self.sessions.put(session);
            }
            Captured::Accepted(value) => {
                debug!(session = %session.id, field, "session value captured");
                session.values.insert(field.to_owned(), value);
                session.step += 1;
                self.advance(owner, &mut session, &mut out, now)?;
            }
        }
        Ok(SessionReply::Send(out))
    }

    /// Cancel the owner's session. Returns whether one was live.
    pub fn cancel(&mut self, owner: &Participant, now: DateTime<Utc>) -> bool {
        let live = self.has_session(owner, now);
        if let Some(session) = self.sessions.cancel(owner.id) {
            if let Some(id) = session.awaiting {
                self.replies.cancel(id);
            }
            info!(session = %session.id, owner = %owner.id, "session cancelled");
        }
        live
    }

    /// Drop lapsed sessions and waits.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.sessions.purge_expired(now);
        let count = expired.len();
        for session in expired {
            self.release(session);
        }
        self.replies.purge_expired(now);
        count
    }

    /// The owner's live session. An expired one is dropped with its wait.
    fn live(&mut self, owner: &Participant, now: DateTime<Utc>) -> Option<InteractiveSession> {
        if let Some(expired) = self.sessions.take_expired(owner.id, now) {
            self.release(expired);
        }
        self.sessions.get(owner.id, now).cloned()
    }

    fn release(&mut self, session: InteractiveSession) {
        if let Some(id) = session.awaiting {
            self.replies.cancel(id);
        }
        debug!(session = %session.id, owner = %session.owner, "session expired");
    }

    /// Run prompts from the current step until the next `Await` or the end.
    fn advance(
        &mut self,
        owner: &Participant,
        session: &mut InteractiveSession,
        out: &mut Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let flow = session.flow.clone();
        let script = flow.script();
        while let Some(Step::Prompt(text)) = script.get(session.step) {
            out.push(text.clone());
            session.step += 1;
        }

        if session.step >= script.len() {
            let done = flow.complete(&session.values, self.store.as_ref());
            self.sessions.cancel(owner.id);
            out.push(done?);
            info!(session = %session.id, owner = %owner.id, flow = flow.name(), "session completed");
            return Ok(());
        }

        self.wait(owner, session, now)?;
        self.sessions.put(session.clone());
        Ok(())
    }

    fn wait(
        &mut self,
        owner: &Participant,
        session: &mut InteractiveSession,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let id = self.replies.open(&owner.address, self.ttl, now)?;
        session.awaiting = Some(id);
        session.expires_at = now + self.ttl;
        Ok(())
    }
}
