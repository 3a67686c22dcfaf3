//! Rate limiting for outbound messages.
//!
//! A sliding one-minute window keeps the bot inside the messaging
//! platform's send limits when a trigger fans out to every participant.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiting error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateLimitError {
    /// Window is full; must wait before sending.
    #[error("rate limit exceeded; retry after {retry_after_secs}s")]
    Exceeded { retry_after_secs: u64 },
}

/// Sliding-window limiter. A limit of `0` disables limiting.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_messages_per_minute: u32,
    window: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_messages_per_minute: u32) -> Self {
        Self {
            max_messages_per_minute,
            window: VecDeque::new(),
        }
    }

    /// Record a send at the current instant, or report how long to wait.
    pub fn try_send(&mut self) -> Result<(), RateLimitError> {
        self.try_send_at(Instant::now())
    }

    fn try_send_at(&mut self, now: Instant) -> Result<(), RateLimitError> {
        if self.max_messages_per_minute == 0 {
            return Ok(());
        }

        while let Some(&first) = self.window.front() {
            if now.duration_since(first) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if self.window.len() >= self.max_messages_per_minute as usize
            && let Some(&oldest) = self.window.front()
        {
            let remaining = WINDOW.saturating_sub(now.duration_since(oldest));
            let retry_after_secs = remaining.as_secs().saturating_add(1);
            return Err(RateLimitError::Exceeded { retry_after_secs });
        }

        self.window.push_back(now);
        Ok(())
    }

    /// Sends left in the current window.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        if self.max_messages_per_minute == 0 {
            return u32::MAX;
        }
        self.max_messages_per_minute
            .saturating_sub(self.window.len() as u32)
    }
}
