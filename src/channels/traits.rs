use async_trait::async_trait;
use tokio::sync::mpsc;

/// Inbound message received from the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender address in the transport's format (phone number for WhatsApp).
    pub sender: String,
    pub text: String,
    /// Set when the transport echoes a message this process sent itself.
    pub from_self: bool,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            from_self: false,
        }
    }
}

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    /// A single participant or the admin contact.
    Contact,
    /// The household group chat.
    Group,
}

/// Outbound message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub kind: RecipientKind,
    pub text: String,
}

impl OutboundMessage {
    pub fn contact(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            kind: RecipientKind::Contact,
            text: text.into(),
        }
    }

    pub fn group(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            kind: RecipientKind::Group,
            text: text.into(),
        }
    }
}

/// Messaging transport contract. New transports only need to implement this trait.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Stable transport identifier (e.g. `whatsapp`, `relay`).
    fn id(&self) -> &'static str;

    /// Deliver one message.
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()>;

    /// Start receiving inbound messages and forwarding them to the engine queue.
    async fn run(&self, inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()>;

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
