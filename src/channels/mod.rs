//! Messaging transports (WhatsApp Cloud API, HTTP relay bridge) and the
//! inbound webhook gateway.
//!
//! Design goal: transports are pluggable behind [`MessageGateway`]. The
//! engine only ever talks to an [`Outbox`], which owns rate limiting and
//! swallows delivery failures.

pub mod gateway;
pub mod outbox;
pub mod rate_limit;
pub mod relay;
pub mod traits;
pub mod whatsapp;

use std::sync::Arc;

use crate::config::{MessagingConfig, Transport, ValidationIssue};

pub use outbox::Outbox;
pub use relay::RelayAdapter;
pub use traits::{InboundMessage, MessageGateway, OutboundMessage, RecipientKind};
pub use whatsapp::WhatsAppAdapter;

/// Canonical sender address: separators removed and a leading `+` added to
/// bare digit strings, so it matches stored participant addresses.
pub fn normalize_sender(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '/'))
        .collect();
    if compact.starts_with(|c: char| c.is_ascii_digit()) {
        format!("+{compact}")
    } else {
        compact
    }
}

/// Check the messaging section for settings that would make the transport
/// unusable.
pub fn validate_messaging(config: &MessagingConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    match config.transport {
        Transport::WhatsApp => {
            let wa = &config.whatsapp;
            if wa.access_token.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    "messaging.whatsapp.access_token",
                    "WhatsApp access token is empty",
                ));
            }
            if wa.phone_number_id.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    "messaging.whatsapp.phone_number_id",
                    "WhatsApp phone_number_id is empty",
                ));
            }
            if wa.verify_token.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    "messaging.whatsapp.verify_token",
                    "WhatsApp webhook verify token is empty",
                ));
            }
            if !config.gateway.enabled {
                issues.push(ValidationIssue::error(
                    "messaging.gateway.enabled",
                    "WhatsApp delivers inbound messages by webhook; enable the gateway",
                ));
            }
            if config.group.is_some() {
                issues.push(ValidationIssue::warning(
                    "messaging.group",
                    "the WhatsApp Cloud API cannot post to groups; digests will not be delivered",
                ));
            }
        }
        Transport::Relay => {
            if config.relay.base_url.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    "messaging.relay.base_url",
                    "relay base_url is empty",
                ));
            }
            if !config.gateway.enabled {
                issues.push(ValidationIssue::warning(
                    "messaging.gateway.enabled",
                    "gateway disabled; the relay has nowhere to push inbound messages",
                ));
            }
        }
    }

    if config.group.is_none() {
        issues.push(ValidationIssue::warning(
            "messaging.group",
            "no group configured; digests are not posted",
        ));
    }

    let gateway_token_missing = config
        .gateway
        .bearer_token
        .as_deref()
        .is_none_or(|t| t.trim().is_empty());
    if config.gateway.enabled && gateway_token_missing {
        issues.push(ValidationIssue::warning(
            "messaging.gateway.bearer_token",
            "relay webhook accepts unauthenticated posts",
        ));
    }

    issues
}

/// Build the configured transport. The WhatsApp adapter is also returned on
/// its own so the gateway can parse its webhooks.
pub fn build_transport(
    config: &MessagingConfig,
) -> (Arc<dyn MessageGateway>, Option<Arc<WhatsAppAdapter>>) {
    match config.transport {
        Transport::WhatsApp => {
            let adapter = Arc::new(WhatsAppAdapter::new(&config.whatsapp));
            (adapter.clone(), Some(adapter))
        }
        Transport::Relay => (Arc::new(RelayAdapter::new(&config.relay)), None),
    }
}
