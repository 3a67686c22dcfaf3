use crate::channels::traits::{InboundMessage, MessageGateway, OutboundMessage, RecipientKind};
use crate::config::RelayConfig;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// HTTP bridge transport.
///
/// Talks to a local bridge process that owns the actual messaging session
/// (for example a WhatsApp Web client). Outbound messages are posted to
/// `{base_url}/send`; the bridge pushes inbound messages to the gateway's
/// `/webhook` route. Unlike the Cloud API, the bridge can post to groups.
#[derive(Clone)]
pub struct RelayAdapter {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct RelaySendBody<'a> {
    to: &'a str,
    kind: &'static str,
    text: &'a str,
}

impl RelayAdapter {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl MessageGateway for RelayAdapter {
    fn id(&self) -> &'static str {
        "relay"
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("relay base_url is empty");
        }

        let body = RelaySendBody {
            to: &message.recipient,
            kind: match message.kind {
                RecipientKind::Contact => "contact",
                RecipientKind::Group => "group",
            },
            text: &message.text,
        };
        let url = format!("{}/send", self.base_url);
        let response = self
            .request(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("relay send failed ({status}): {body}");
        }
        Ok(())
    }

    async fn run(&self, _inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        // The bridge pushes inbound traffic to the gateway's webhook route.
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        if self.base_url.is_empty() {
            return Ok(false);
        }
        let url = format!("{}/health", self.base_url);
        let response = self.request(self.client.get(&url)).send().await?;
        Ok(response.status().is_success())
    }
}
