//! Configuration types for the chore rotation service.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::allocation::AllocationPolicy;
use crate::error::{ChoreError, Result};
use crate::scheduler::triggers::{Schedule, ScheduledTrigger, TriggerKind};
use crate::session::flow::normalize_address;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoreConfig {
    /// Database location.
    pub store: StoreConfig,
    /// Admin allow-list and forwarding contact.
    pub admin: AdminConfig,
    /// Transport, gateway and outbound limits.
    pub messaging: MessagingConfig,
    /// Weekly trigger schedule.
    pub schedule: ScheduleConfig,
    /// Allocation tie-break and conflict policy.
    pub allocation: AllocationPolicy,
    /// Interactive session lifetime.
    pub session: SessionConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: crate::paths::database_file(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Addresses allowed to run `change numbers` and `do ...`.
    pub allowed: Vec<String>,
    /// Contact that receives messages from unknown senders.
    pub forward_to: Option<String>,
}

impl AdminConfig {
    /// Whether `address` is on the allow-list. Both sides are compared in
    /// their normalized form.
    pub fn is_admin(&self, address: &str) -> bool {
        let wanted = canonical(address);
        self.allowed.iter().any(|a| canonical(a) == wanted)
    }
}

fn canonical(address: &str) -> String {
    normalize_address(address).unwrap_or_else(|| address.trim().to_owned())
}

/// Which transport carries messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// WhatsApp Business Cloud API.
    #[default]
    #[serde(rename = "whatsapp")]
    WhatsApp,
    /// Local HTTP bridge.
    Relay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub transport: Transport,
    /// Household group id for digests.
    pub group: Option<String>,
    /// Outbound messages per minute; `0` disables limiting.
    pub rate_limit_per_minute: u32,
    /// Capacity of the engine's event queue.
    pub queue_size: usize,
    pub whatsapp: WhatsAppConfig,
    pub relay: RelayConfig,
    pub gateway: GatewayConfig,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            group: None,
            rate_limit_per_minute: 20,
            queue_size: 64,
            whatsapp: WhatsAppConfig::default(),
            relay: RelayConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// WhatsApp Business Cloud API credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    /// Token echoed during webhook verification.
    pub verify_token: String,
    /// The bot's own number; inbound messages from it are dropped.
    pub business_number: String,
    /// Graph API base URL override.
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bridge base URL, e.g. `http://127.0.0.1:3000`.
    pub base_url: String,
    /// Bearer token sent to the bridge.
    pub token: Option<String>,
}

/// Inbound webhook listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Bearer token required on `POST /webhook`.
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_owned(),
            port: 4088,
            bearer_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Run triggers automatically. When off, use `chorewheel trigger`.
    pub enabled: bool,
    /// Seconds between due checks.
    pub tick_secs: u64,
    /// Triggers that never fire automatically.
    pub disabled: Vec<TriggerKind>,
    pub allocate_cycle: Schedule,
    pub request_confirmation: Schedule,
    pub remind_pending: Schedule,
    pub sweep_and_reassign_pending: Schedule,
    pub digest_if_incomplete: Schedule,
    pub completion_survey: Schedule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: 30,
            disabled: Vec::new(),
            allocate_cycle: TriggerKind::AllocateCycle.default_schedule(),
            request_confirmation: TriggerKind::RequestConfirmation.default_schedule(),
            remind_pending: TriggerKind::RemindPending.default_schedule(),
            sweep_and_reassign_pending: TriggerKind::SweepAndReassignPending.default_schedule(),
            digest_if_incomplete: TriggerKind::DigestIfIncomplete.default_schedule(),
            completion_survey: TriggerKind::CompletionSurvey.default_schedule(),
        }
    }
}

impl ScheduleConfig {
    pub fn schedule_for(&self, kind: TriggerKind) -> Schedule {
        match kind {
            TriggerKind::AllocateCycle => self.allocate_cycle,
            TriggerKind::RequestConfirmation => self.request_confirmation,
            TriggerKind::RemindPending => self.remind_pending,
            TriggerKind::SweepAndReassignPending => self.sweep_and_reassign_pending,
            TriggerKind::DigestIfIncomplete => self.digest_if_incomplete,
            TriggerKind::CompletionSurvey => self.completion_survey,
        }
    }

    /// Every trigger with its configured schedule and enabled flag.
    pub fn triggers(&self) -> Vec<ScheduledTrigger> {
        TriggerKind::ALL
            .into_iter()
            .map(|kind| {
                let mut trigger = ScheduledTrigger::new(kind, self.schedule_for(kind));
                trigger.enabled = !self.disabled.contains(&kind);
                trigger
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle lifetime of an interactive session.
    pub ttl_minutes: u64,
}

/// Longest accepted session lifetime: one week.
pub const MAX_SESSION_TTL_MINUTES: u64 = 7 * 24 * 60;

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_minutes: 30 }
    }
}

impl SessionConfig {
    /// Session lifetime, clamped to `1..=MAX_SESSION_TTL_MINUTES` minutes.
    pub fn ttl(&self) -> chrono::Duration {
        let minutes = self.ttl_minutes.clamp(1, MAX_SESSION_TTL_MINUTES);
        i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or_else(|| chrono::Duration::days(7))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files. Console only when unset.
    pub dir: Option<PathBuf>,
    /// Default filter when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Configuration validation issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced before startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub id: String,
    pub severity: ValidationSeverity,
    pub summary: String,
}

impl ValidationIssue {
    pub fn error(id: &str, summary: &str) -> Self {
        Self {
            id: id.to_owned(),
            severity: ValidationSeverity::Error,
            summary: summary.to_owned(),
        }
    }

    pub fn warning(id: &str, summary: &str) -> Self {
        Self {
            id: id.to_owned(),
            severity: ValidationSeverity::Warning,
            summary: summary.to_owned(),
        }
    }
}

impl ChoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ChoreError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ChoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/chorewheel/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_dir().join("config.toml")
    }

    /// Check the whole configuration. Errors block startup; warnings are logged.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = crate::channels::validate_messaging(&self.messaging);

        if self.admin.allowed.is_empty() {
            issues.push(ValidationIssue::warning(
                "admin.allowed",
                "no admin addresses; `change numbers` and `do` are unavailable",
            ));
        }
        for entry in &self.admin.allowed {
            if normalize_address(entry).is_none() {
                issues.push(ValidationIssue::warning(
                    "admin.allowed",
                    &format!("`{entry}` is not an international number and never matches"),
                ));
            }
        }
        if self.admin.forward_to.is_none() {
            issues.push(ValidationIssue::warning(
                "admin.forward_to",
                "messages from unknown senders are dropped",
            ));
        }
        if self.messaging.queue_size == 0 {
            issues.push(ValidationIssue::error(
                "messaging.queue_size",
                "event queue size must be at least 1",
            ));
        }
        if self.session.ttl_minutes == 0 {
            issues.push(ValidationIssue::error(
                "session.ttl_minutes",
                "session lifetime must be at least one minute",
            ));
        } else if self.session.ttl_minutes > MAX_SESSION_TTL_MINUTES {
            issues.push(ValidationIssue::error(
                "session.ttl_minutes",
                "session lifetime must not exceed one week (10080 minutes)",
            ));
        }
        if self.schedule.tick_secs == 0 {
            issues.push(ValidationIssue::error(
                "schedule.tick_secs",
                "scheduler tick must be at least one second",
            ));
        }
        for kind in TriggerKind::ALL {
            if !self.schedule.schedule_for(kind).is_valid() {
                issues.push(ValidationIssue::error(
                    &format!("schedule.{}", kind.as_str().replace('-', "_")),
                    "hour must be 0-23 and minute 0-59",
                ));
            }
        }

        issues
    }
}
