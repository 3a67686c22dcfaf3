use crate::channels::normalize_sender;
use crate::channels::traits::{InboundMessage, MessageGateway, OutboundMessage, RecipientKind};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;
use tokio::sync::mpsc;

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// WhatsApp Business Cloud API transport.
///
/// Inbound messages are webhook-driven (push) and arrive through the
/// gateway. The Cloud API has no group messaging, so group sends fail and
/// are logged by the outbox.
#[derive(Clone)]
pub struct WhatsAppAdapter {
    access_token: String,
    phone_number_id: String,
    verify_token: String,
    business_number: String,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppAdapter {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            verify_token: config.verify_token.clone(),
            business_number: normalize_sender(&config.business_number),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_owned()),
            client: reqwest::Client::new(),
        }
    }

    pub fn verify_token(&self) -> &str {
        &self.verify_token
    }

    /// Parse a webhook payload into inbound messages. Non-text messages and
    /// entries without a sender are skipped.
    #[must_use]
    pub fn parse_webhook_payload(&self, payload: &serde_json::Value) -> Vec<InboundMessage> {
        let mut inbound = Vec::new();
        let Some(entries) = payload.get("entry").and_then(serde_json::Value::as_array) else {
            return inbound;
        };

        for entry in entries {
            let Some(changes) = entry.get("changes").and_then(serde_json::Value::as_array) else {
                continue;
            };

            for change in changes {
                let Some(messages) = change
                    .get("value")
                    .and_then(|v| v.get("messages"))
                    .and_then(serde_json::Value::as_array)
                else {
                    continue;
                };

                for msg in messages {
                    let from = msg
                        .get("from")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default();
                    if from.is_empty() {
                        continue;
                    }
                    let sender = normalize_sender(from);

                    let text = msg
                        .get("text")
                        .and_then(|v| v.get("body"))
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_owned();
                    if text.is_empty() {
                        continue;
                    }

                    let from_self =
                        !self.business_number.is_empty() && sender == self.business_number;
                    inbound.push(InboundMessage {
                        sender,
                        text,
                        from_self,
                    });
                }
            }
        }

        inbound
    }
}

#[async_trait]
impl MessageGateway for WhatsAppAdapter {
    fn id(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        if message.kind == RecipientKind::Group {
            anyhow::bail!("whatsapp cloud api cannot post to groups");
        }
        if self.access_token.trim().is_empty() {
            anyhow::bail!("whatsapp access token is empty");
        }
        if self.phone_number_id.trim().is_empty() {
            anyhow::bail!("whatsapp phone_number_id is empty");
        }

        let to = message
            .recipient
            .strip_prefix('+')
            .unwrap_or(message.recipient.as_str());
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": message.text
            }
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("whatsapp send failed ({status}): {body}");
        }

        Ok(())
    }

    async fn run(&self, _inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        // Webhook-only transport: inbound traffic arrives through the gateway.
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        if self.access_token.trim().is_empty() || self.phone_number_id.trim().is_empty() {
            return Ok(false);
        }
        let url = format!("{}/{}", self.api_base, self.phone_number_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
