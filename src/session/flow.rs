//! Scripted dialogue definitions.
//!
//! A flow is a fixed script of prompts and awaited inputs plus the
//! validation and side effect that belong to it.

use std::collections::HashMap;

use crate::error::{ChoreError, Result};
use crate::messages;
use crate::model::ParticipantId;
use crate::store::ChoreStore;

/// One step of a flow's script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send the text and advance without consuming input.
    Prompt(String),
    /// Consume one inbound message into `field`.
    Await { field: &'static str },
}

/// Result of validating a captured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    /// Normalised value to store.
    Accepted(String),
    /// Text sent back; the step does not advance.
    Rejected(String),
}

pub trait Flow: Send + Sync {
    fn name(&self) -> &'static str;

    fn script(&self) -> &[Step];

    /// Intro text sent when the session starts.
    fn opening(&self, store: &dyn ChoreStore) -> Result<String>;

    /// Validate and normalise the raw input for `field`.
    fn accept(
        &self,
        field: &str,
        raw: &str,
        values: &HashMap<String, String>,
        store: &dyn ChoreStore,
    ) -> Result<Captured>;

    /// Run the flow's side effect and return the confirmation text.
    fn complete(&self, values: &HashMap<String, String>, store: &dyn ChoreStore) -> Result<String>;
}

const TARGET: &str = "target";
const NAME: &str = "name";
const ADDRESS: &str = "address";

/// Admin dialogue: pick a participant, then replace their name and address.
pub struct UpdateParticipantFlow {
    script: Vec<Step>,
}

impl UpdateParticipantFlow {
    pub fn new() -> Self {
        Self {
            script: vec![
                Step::Await { field: TARGET },
                Step::Prompt(messages::ask_name()),
                Step::Await { field: NAME },
                Step::Prompt(messages::ask_address()),
                Step::Await { field: ADDRESS },
            ],
        }
    }
}

impl Default for UpdateParticipantFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// `+` followed by 7-15 digits after removing spaces, dashes and slashes.
pub fn normalize_address(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '/'))
        .collect();
    let digits = compact.strip_prefix('+')?;
    let valid = (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    valid.then_some(compact)
}

fn target_of(values: &HashMap<String, String>) -> Result<ParticipantId> {
    values
        .get(TARGET)
        .and_then(|v| v.parse::<i64>().ok())
        .map(ParticipantId)
        .ok_or_else(|| ChoreError::Session("update flow finished without a target".to_owned()))
}

impl Flow for UpdateParticipantFlow {
    fn name(&self) -> &'static str {
        "update-participant"
    }

    fn script(&self) -> &[Step] {
        &self.script
    }

    fn opening(&self, store: &dyn ChoreStore) -> Result<String> {
        Ok(messages::participant_listing(&store.participants()?))
    }

    fn accept(
        &self,
        field: &str,
        raw: &str,
        values: &HashMap<String, String>,
        store: &dyn ChoreStore,
    ) -> Result<Captured> {
        let raw = raw.trim();
        match field {
            TARGET => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => store.participant(ParticipantId(id))?,
                    Err(_) => None,
                };
                Ok(match found {
                    Some(p) => Captured::Accepted(p.id.to_string()),
                    None => Captured::Rejected(messages::invalid_participant()),
                })
            }
            NAME => Ok(if raw.is_empty() {
                Captured::Rejected(messages::invalid_name())
            } else {
                Captured::Accepted(raw.to_owned())
            }),
            ADDRESS => {
                let Some(address) = normalize_address(raw) else {
                    return Ok(Captured::Rejected(messages::invalid_address()));
                };
                let target = target_of(values)?;
                let taken = store
                    .participant_by_address(&address)?
                    .is_some_and(|p| p.id != target);
                Ok(if taken {
                    Captured::Rejected(messages::address_taken())
                } else {
                    Captured::Accepted(address)
                })
            }
            other => Err(ChoreError::Session(format!(
                "update flow has no field `{other}`"
            ))),
        }
    }

    fn complete(&self, values: &HashMap<String, String>, store: &dyn ChoreStore) -> Result<String> {
        let target = target_of(values)?;
        let name = values
            .get(NAME)
            .ok_or_else(|| ChoreError::Session("update flow finished without a name".to_owned()))?;
        let address = values.get(ADDRESS).ok_or_else(|| {
            ChoreError::Session("update flow finished without an address".to_owned())
        })?;
        store.update_participant(target, name, address)?;
        tracing::info!(participant = %target, "participant contact data updated");
        Ok(messages::participant_updated(name, address))
    }
}
