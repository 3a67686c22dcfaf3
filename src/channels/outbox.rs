//! Outbound delivery: rate limiting and failure policy in front of a gateway.
//!
//! Transport failures never reach the workflow. They are logged and the
//! send reports `false`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::channels::rate_limit::{RateLimitError, RateLimiter};
use crate::channels::traits::{MessageGateway, OutboundMessage};

pub struct Outbox {
    gateway: Arc<dyn MessageGateway>,
    limiter: Mutex<RateLimiter>,
    group: Option<String>,
}

impl Outbox {
    pub fn new(
        gateway: Arc<dyn MessageGateway>,
        max_messages_per_minute: u32,
        group: Option<String>,
    ) -> Self {
        Self {
            gateway,
            limiter: Mutex::new(RateLimiter::new(max_messages_per_minute)),
            group: group.filter(|g| !g.trim().is_empty()),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn MessageGateway> {
        &self.gateway
    }

    /// Household group id, if one is configured.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Send a direct message to one address.
    pub async fn to_contact(&self, address: &str, text: impl Into<String>) -> bool {
        self.deliver(OutboundMessage::contact(address, text)).await
    }

    /// Post to the household group. Without a configured group nothing is sent.
    pub async fn to_group(&self, text: impl Into<String>) -> bool {
        let Some(group) = self.group.clone() else {
            warn!("no group configured, dropping group message");
            return false;
        };
        self.deliver(OutboundMessage::group(group, text)).await
    }

    /// Wait for a rate-limit slot, then send. Returns whether the transport
    /// accepted the message.
    pub async fn deliver(&self, message: OutboundMessage) -> bool {
        self.acquire_slot().await;

        let recipient = message.recipient.clone();
        match self.gateway.send(message).await {
            Ok(()) => {
                debug!(gateway = self.gateway.id(), %recipient, "message sent");
                true
            }
            Err(e) => {
                warn!(gateway = self.gateway.id(), %recipient, "send failed: {e}");
                false
            }
        }
    }

    async fn acquire_slot(&self) {
        loop {
            let wait = {
                let mut limiter = self.limiter.lock().await;
                match limiter.try_send() {
                    Ok(()) => return,
                    Err(RateLimitError::Exceeded { retry_after_secs }) => retry_after_secs,
                }
            };
            debug!(retry_after_secs = wait, "outbound rate limit reached, waiting");
            tokio::time::sleep(Duration::from_secs(wait)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::channels::traits::{InboundMessage, RecipientKind};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recording {
        sent: StdMutex<Vec<OutboundMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageGateway for Recording {
        fn id(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("transport down");
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn run(&self, _inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn contact_and_group_messages_are_delivered() {
        let gateway = Arc::new(Recording::default());
        let outbox = Outbox::new(gateway.clone(), 0, Some("household".to_owned()));

        assert!(outbox.to_contact("+491", "hallo").await);
        assert!(outbox.to_group("übersicht").await);

        let sent = gateway.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, RecipientKind::Contact);
        assert_eq!(sent[1].kind, RecipientKind::Group);
        assert_eq!(sent[1].recipient, "household");
    }

    #[tokio::test]
    async fn group_message_without_group_is_dropped() {
        let gateway = Arc::new(Recording::default());
        let outbox = Outbox::new(gateway.clone(), 0, Some("  ".to_owned()));
        assert!(!outbox.to_group("übersicht").await);
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let gateway = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let outbox = Outbox::new(gateway, 0, None);
        assert!(!outbox.to_contact("+491", "hallo").await);
    }
}
