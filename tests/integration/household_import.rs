//! Household file import into an on-disk store, then a first allocation.

use std::sync::Arc;

use chorewheel::channels::Outbox;
use chorewheel::household::HouseholdFile;
use chorewheel::scheduler::TriggerKind;
use chorewheel::store::{ChoreStore, SqliteChoreStore};
use chorewheel::{ChoreEngine, TriggerOutcome};

use crate::helpers::{RecordingGateway, monday, test_config};

const HOUSEHOLD: &str = r#"
[[category]]
name = "kitchen"

[[participant]]
name = "Anna"
address = "+49 171 1111111"

[[participant]]
name = "Ben"
address = "+491722222222"

[[task]]
name = "Küche"
points = 5
category = "kitchen"
eligible = ["Anna", "Ben"]

[[task]]
name = "Bad"
points = 3
category = "kitchen"
eligible = ["Ben"]
"#;

#[tokio::test]
async fn imported_household_survives_reopen_and_allocates() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("household.toml");
    let db = dir.path().join("data").join("chorewheel.db");
    std::fs::write(&seed, HOUSEHOLD).unwrap();

    {
        let store = SqliteChoreStore::open(&db).unwrap();
        let report = HouseholdFile::from_file(&seed)
            .unwrap()
            .import(&store)
            .unwrap();
        assert_eq!(report.tasks, 2);
        assert_eq!(report.eligibility, 3);
    }

    let store = Arc::new(SqliteChoreStore::open(&db).unwrap());
    assert_eq!(store.participants().unwrap().len(), 2);

    let config = test_config();
    let gateway = Arc::new(RecordingGateway::default());
    let outbox = Arc::new(Outbox::new(gateway.clone(), 0, config.messaging.group.clone()));
    let engine = ChoreEngine::new(store.clone(), outbox, &config);

    let outcome = engine
        .run_trigger(TriggerKind::AllocateCycle, monday(8))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TriggerOutcome::Allocated {
            created: 2,
            already_open: 0,
            unassigned: 0
        }
    );
    assert_eq!(gateway.take().len(), 2);
}
