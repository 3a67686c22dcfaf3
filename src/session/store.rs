//! In-memory session storage keyed by session owner.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::flow::Flow;
use super::replies::CorrelationId;
use crate::model::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One running multi-step dialogue.
#[derive(Clone)]
pub struct InteractiveSession {
    pub id: SessionId,
    pub owner: ParticipantId,
    pub flow: Arc<dyn Flow>,
    /// Index of the next script step.
    pub step: usize,
    /// Captured values by field name.
    pub values: HashMap<String, String>,
    /// The open reply wait while the session sits on an `Await` step.
    pub awaiting: Option<CorrelationId>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for InteractiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveSession")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("flow", &self.flow.name())
            .field("step", &self.step)
            .field("values", &self.values)
            .field("awaiting", &self.awaiting)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// At most one session per owner. Expired sessions are invisible.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<ParticipantId, InteractiveSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The owner's live session, if it has not expired.
    pub fn get(&self, owner: ParticipantId, now: DateTime<Utc>) -> Option<&InteractiveSession> {
        self.sessions.get(&owner).filter(|s| s.expires_at > now)
    }

    /// Insert or replace the owner's session.
    pub fn put(&mut self, session: InteractiveSession) {
        self.sessions.insert(session.owner, session);
    }

    /// Remove the owner's session regardless of expiry.
    pub fn cancel(&mut self, owner: ParticipantId) -> Option<InteractiveSession> {
        self.sessions.remove(&owner)
    }

    /// Remove and return the owner's session if it has expired.
    pub fn take_expired(
        &mut self,
        owner: ParticipantId,
        now: DateTime<Utc>,
    ) -> Option<InteractiveSession> {
        if self
            .sessions
            .get(&owner)
            .is_some_and(|s| s.expires_at <= now)
        {
            return self.sessions.remove(&owner);
        }
        None
    }

    /// Remove and return every expired session.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<InteractiveSession> {
        let expired: Vec<ParticipantId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.expires_at <= now)
            .map(|(owner, _)| *owner)
            .collect();
        expired
            .into_iter()
            .filter_map(|owner| self.sessions.remove(&owner))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
