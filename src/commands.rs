//! Inbound command grammar.

use crate::lifecycle::Reply;

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ja`, `nein`, `erledigt` or `unerledigt`.
    Reply(Reply),
    /// `admin`: command overview.
    Overview,
    /// `report`: score summary.
    Report,
    /// `change numbers`: start the participant update dialogue.
    ChangeNumbers,
    /// `abbrechen`: cancel the running dialogue.
    Cancel,
    /// `do help`: list the triggers.
    TriggerHelp,
    /// `do <trigger-name>`: run one trigger now. The name is not validated here.
    Trigger(String),
    /// Anything else, trimmed but with its original case.
    Free(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lowered = trimmed.to_lowercase();
        match lowered.as_str() {
            "ja" => Self::Reply(Reply::Yes),
            "nein" => Self::Reply(Reply::No),
            "erledigt" => Self::Reply(Reply::Done),
            "unerledigt" => Self::Reply(Reply::NotDone),
            "admin" => Self::Overview,
            "report" => Self::Report,
            "change numbers" => Self::ChangeNumbers,
            "abbrechen" => Self::Cancel,
            "do help" => Self::TriggerHelp,
            other => match other.strip_prefix("do ") {
                Some(name) if !name.trim().is_empty() => Self::Trigger(name.trim().to_owned()),
                _ => Self::Free(trimmed.to_owned()),
            },
        }
    }

    /// Whether only allow-listed senders may run this command.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::ChangeNumbers | Self::TriggerHelp | Self::Trigger(_)
        )
    }
}
