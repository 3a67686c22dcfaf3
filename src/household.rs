//! Household seed file: participants, categories, tasks and who may do what.
//!
//! ```toml
//! [[category]]
//! name = "kitchen"
//!
//! [[participant]]
//! name = "Anna"
//! address = "+491701111111"
//!
//! [[task]]
//! name = "Küche putzen"
//! points = 5
//! category = "kitchen"
//! eligible = ["Anna"]
//! ```
//!
//! Importing is additive and idempotent: categories and tasks are matched by
//! name, participants by address, and existing rows are left untouched.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ChoreError, Result};
use crate::model::{CategoryId, ParticipantId};
use crate::session::flow::normalize_address;
use crate::store::ChoreStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseholdFile {
    #[serde(rename = "category")]
    pub categories: Vec<CategorySeed>,
    #[serde(rename = "participant")]
    pub participants: Vec<ParticipantSeed>,
    #[serde(rename = "task")]
    pub tasks: Vec<TaskSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSeed {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSeed {
    pub name: String,
    #[serde(default)]
    pub points: u32,
    /// Category name. A task without one earns no points.
    #[serde(default)]
    pub category: Option<String>,
    /// Participant names in roster order.
    #[serde(default)]
    pub eligible: Vec<String>,
}

/// Rows created by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub categories: usize,
    pub participants: usize,
    pub tasks: usize,
    pub eligibility: usize,
}

impl HouseholdFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ChoreError::Config(e.to_string()))
    }

    /// Write the file's contents into `store`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid address, a participant name listed twice, or a
    /// reference to an unknown category or an unknown or ambiguous participant name. Rows written before the failing entry stay written.
    pub fn import(&self, store: &dyn ChoreStore) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        let mut names = HashSet::new();
        for seed in &self.participants {
            if !names.insert(seed.name.as_str()) {
                return Err(ChoreError::Config(format!(
                    "participant name `{}` appears more than once",
                    seed.name
                )));
            }
        }

        let mut categories: HashMap<String, CategoryId> = store
            .categories()?
            .into_iter()
            .map(|c| (c.name, c.id))
            .collect();
        for seed in &self.categories {
            if !categories.contains_key(&seed.name) {
                let id = store.add_category(&seed.name)?;
                categories.insert(seed.name.clone(), id);
                report.categories += 1;
            }
        }

        for seed in &self.participants {
            let address = normalize_address(&seed.address).ok_or_else(|| {
                ChoreError::Config(format!(
                    "participant {}: invalid address `{}`",
                    seed.name, seed.address
                ))
            })?;
            if store.participant_by_address(&address)?.is_none() {
                store.add_participant(&seed.name, &address)?;
                report.participants += 1;
            }
        }
        let mut participants: HashMap<String, Vec<ParticipantId>> = HashMap::new();
        for p in store.participants()? {
            participants.entry(p.name).or_default().push(p.id);
        }

        let mut tasks: HashMap<String, _> = store
            .tasks()?
            .into_iter()
            .map(|t| (t.name, t.id))
            .collect();
        for seed in &self.tasks {
            let category = match &seed.category {
                Some(name) => Some(*categories.get(name).ok_or_else(|| {
                    ChoreError::Config(format!("task {}: unknown category `{name}`", seed.name))
                })?),
                None => None,
            };
            let task = match tasks.get(&seed.name) {
                Some(id) => *id,
                None => {
                    let id = store.add_task(&seed.name, seed.points, category)?;
                    tasks.insert(seed.name.clone(), id);
                    report.tasks += 1;
                    id
                }
            };

            let before = store.roster()?.eligible(task).len();
            for name in &seed.eligible {
                let participant = match participants.get(name).map(Vec::as_slice) {
                    Some([id]) => *id,
                    Some(_) => {
                        return Err(ChoreError::Config(format!(
                            "task {}: participant name `{name}` is ambiguous",
                            seed.name
                        )));
                    }
                    None => {
                        return Err(ChoreError::Config(format!(
                            "task {}: unknown participant `{name}`",
                            seed.name
                        )));
                    }
                };
                store.add_eligibility(task, participant)?;
            }
            report.eligibility += store.roster()?.eligible(task).len() - before;
        }

        info!(
            categories = report.categories,
            participants = report.participants,
            tasks = report.tasks,
            eligibility = report.eligibility,
            "household imported"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::store::SqliteChoreStore;

    const SAMPLE: &str = r#"
[[category]]
name = "kitchen"

[[category]]
name = "bathroom"

[[participant]]
name = "Anna"
address = "+49 170 1111111"

[[participant]]
name = "Ben"
address = "+491702222222"

[[task]]
name = "Küche putzen"
points = 5
category = "kitchen"
eligible = ["Ben", "Anna"]

[[task]]
name = "Bad putzen"
points = 3
category = "bathroom"
eligible = ["Anna"]

[[task]]
name = "Blumen gießen"
"#;

    #[test]
    fn import_creates_everything_in_order() {
        let store = SqliteChoreStore::open_in_memory().unwrap();
        let file = HouseholdFile::parse(SAMPLE).unwrap();

        let report = file.import(&store).unwrap();
        assert_eq!(
            report,
            ImportReport {
                categories: 2,
                participants: 2,
                tasks: 3,
                eligibility: 3,
            }
        );

        let anna = store.participant_by_address("+491701111111").unwrap().unwrap();
        let ben = store.participant_by_address("+491702222222").unwrap().unwrap();
        let tasks = store.tasks().unwrap();
        assert_eq!(tasks[0].points, 5);
        assert!(tasks[2].category_id.is_none());
        assert_eq!(store.roster().unwrap().eligible(tasks[0].id), &[ben.id, anna.id]);
    }

    #[test]
    fn import_is_idempotent() {
        let store = SqliteChoreStore::open_in_memory().unwrap();
        let file = HouseholdFile::parse(SAMPLE).unwrap();
        file.import(&store).unwrap();

        assert_eq!(file.import(&store).unwrap(), ImportReport::default());
        assert_eq!(store.tasks().unwrap().len(), 3);
    }

    #[test]
    fn unknown_references_are_rejected() {
        let store = SqliteChoreStore::open_in_memory().unwrap();
        let file = HouseholdFile::parse(
            r#"
[[task]]
name = "Bad"
category = "garden"
"#,
        )
        .unwrap();
        assert!(matches!(file.import(&store), Err(ChoreError::Config(_))));

        let file = HouseholdFile::parse(
            r#"
[[participant]]
name = "Anna"
address = "0170 123"
"#,
        )
        .unwrap();
        assert!(matches!(file.import(&store), Err(ChoreError::Config(_))));
    }

    #[test]
    fn duplicate_participant_names_are_rejected() {
        let store = SqliteChoreStore::open_in_memory().unwrap();
        let file = HouseholdFile::parse(
            r#"
[[participant]]
name = "Anna"
address = "+491701111111"

[[participant]]
name = "Anna"
address = "+491702222222"
"#,
        )
        .unwrap();
        assert!(matches!(file.import(&store), Err(ChoreError::Config(_))));
        assert!(store.participants().unwrap().is_empty());
    }

    #[test]
    fn eligibility_by_ambiguous_stored_name_is_rejected() {
        let store = SqliteChoreStore::open_in_memory().unwrap();
        store.add_participant("Anna", "+491701111111").unwrap();
        store.add_participant("Anna", "+491702222222").unwrap();
        let file = HouseholdFile::parse(
            r#"
[[task]]
name = "Bad"
eligible = ["Anna"]
"#,
        )
        .unwrap();
        assert!(matches!(file.import(&store), Err(ChoreError::Config(_))));
        assert!(store.roster().unwrap().is_empty());
    }
}
