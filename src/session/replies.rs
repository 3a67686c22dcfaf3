//! Correlated waits for the next message from one address.
//!
//! A session step that needs input opens a wait on the owner's address and
//! the next inbound message from that address claims it. Waits expire, can
//! be cancelled, and a second concurrent wait on one address is refused.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Identifies one open wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("a reply from {address} is already awaited")]
    Busy { address: String },
}

#[derive(Debug, Clone)]
struct Wait {
    id: CorrelationId,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ReplyRegister {
    waits: HashMap<String, Wait>,
}

impl ReplyRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a wait on `address` that lapses after `ttl`.
    pub fn open(
        &mut self,
        address: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<CorrelationId, ReplyError> {
        if let Some(existing) = self.waits.get(address)
            && existing.expires_at > now
        {
            return Err(ReplyError::Busy {
                address: address.to_owned(),
            });
        }
        let id = CorrelationId::new();
        self.waits.insert(
            address.to_owned(),
            Wait {
                id,
                expires_at: now + ttl,
            },
        );
        Ok(id)
    }

    /// Consume the live wait on `address`, if any.
    pub fn claim(&mut self, address: &str, now: DateTime<Utc>) -> Option<CorrelationId> {
        let wait = self.waits.remove(address)?;
        (wait.expires_at > now).then_some(wait.id)
    }

    /// Whether a live wait exists on `address`.
    pub fn is_waiting(&self, address: &str, now: DateTime<Utc>) -> bool {
        self.waits
            .get(address)
            .is_some_and(|w| w.expires_at > now)
    }

    /// Drop a wait by id. Returns whether it existed.
    pub fn cancel(&mut self, id: CorrelationId) -> bool {
        let before = self.waits.len();
        self.waits.retain(|_, w| w.id != id);
        self.waits.len() != before
    }

    /// Drop every lapsed wait. Returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.waits.len();
        self.waits.retain(|_, w| w.expires_at > now);
        before - self.waits.len()
    }

    pub fn len(&self) -> usize {
        self.waits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waits.is_empty()
    }
}
