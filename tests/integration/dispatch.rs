//! Inbound command dispatch: admin gating, forwarding, sessions and the
//! queued worker.

use chorewheel::channels::InboundMessage;
use chorewheel::engine::EngineEvent;
use chorewheel::messages;
use chorewheel::model::ParticipantId;
use chorewheel::scheduler::TriggerKind;
use chorewheel::store::ChoreStore;
use chrono::Duration;
use tokio::sync::mpsc;

use crate::helpers::{ADMIN, Harness, monday, texts_to};

const ANNA: &str = "+491711111111";
const BEN: &str = "+491722222222";

fn household(h: &Harness) -> (ParticipantId, ParticipantId, ParticipantId) {
    let admin = h.store.add_participant("Admin", ADMIN).unwrap();
    let anna = h.store.add_participant("Anna", ANNA).unwrap();
    let ben = h.store.add_participant("Ben", BEN).unwrap();
    let task = h.store.add_task("Küche", 3, None).unwrap();
    h.store.add_eligibility(task, anna).unwrap();
    (admin, anna, ben)
}

#[tokio::test]
async fn own_messages_are_dropped() {
    let mut h = Harness::new();
    household(&h);
    let mut echo = InboundMessage::new(ANNA, "admin");
    echo.from_self = true;
    h.engine.handle_inbound(&echo, monday(9)).await.unwrap();
    assert!(h.gateway.take().is_empty());
}

#[tokio::test]
async fn unknown_sender_is_forwarded_to_admin() {
    let mut h = Harness::new();
    household(&h);
    h.say("+499999999999", "Wer bin ich?", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, ADMIN),
        vec![messages::forwarded("+499999999999", "Wer bin ich?")]
    );
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn admin_commands_are_gated() {
    let mut h = Harness::new();
    household(&h);

    h.say(ANNA, "do allocate-cycle", monday(9)).await;
    h.say(ANNA, "change numbers", monday(9)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), ANNA),
        vec![messages::not_authorized(), messages::not_authorized()]
    );
    assert!(h.records().is_empty());

    h.say(ADMIN, "do allocate-cycle", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, ADMIN),
        vec![messages::trigger_done(TriggerKind::AllocateCycle)]
    );
    assert_eq!(h.records().len(), 1);

    h.say(ADMIN, "do nap", monday(9)).await;
    h.say(ADMIN, "do help", monday(9)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), ADMIN),
        vec![messages::unknown_trigger("nap"), messages::trigger_overview()]
    );
}

#[tokio::test]
async fn overview_and_report() {
    let mut h = Harness::new();
    household(&h);

    h.say(ANNA, "admin", monday(9)).await;
    h.say(ADMIN, "Admin", monday(9)).await;
    h.say(BEN, "report", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(texts_to(&sent, ANNA), vec![messages::command_overview(false)]);
    assert_eq!(texts_to(&sent, ADMIN), vec![messages::command_overview(true)]);

    let report = texts_to(&sent, BEN);
    assert_eq!(report.len(), 1);
    assert!(report[0].starts_with("Punktestand:"));
    assert!(report[0].contains("Anna: 0"));
}

#[tokio::test]
async fn change_numbers_dialogue_updates_participant() {
    let mut h = Harness::new();
    let (_admin, _anna, ben) = household(&h);

    h.say(ADMIN, "change numbers", monday(9)).await;
    let listing = texts_to(&h.gateway.take(), ADMIN);
    assert_eq!(listing.len(), 1);
    assert!(listing[0].contains(&format!("{ben}: Ben ({BEN})")));

    h.say(ADMIN, "42", monday(9)).await;
    h.say(ADMIN, &ben.to_string(), monday(9)).await;
    h.say(ADMIN, "Benjamin", monday(9)).await;
    h.say(ADMIN, ANNA, monday(9)).await;
    h.say(ADMIN, "+49 172 3333333", monday(9)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), ADMIN),
        vec![
            messages::invalid_participant(),
            messages::ask_name(),
            messages::ask_address(),
            messages::address_taken(),
            messages::participant_updated("Benjamin", "+491723333333"),
        ]
    );

    let updated = h.store.participant(ben).unwrap().unwrap();
    assert_eq!(updated.name, "Benjamin");
    assert_eq!(updated.address, "+491723333333");

    // Session is gone: free text is ignored again.
    h.say(ADMIN, "noch etwas", monday(9)).await;
    h.say(ADMIN, "abbrechen", monday(9)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), ADMIN),
        vec![messages::no_session()]
    );
}

#[tokio::test]
async fn cancelled_and_expired_sessions_stop_consuming_input() {
    let mut h = Harness::new();
    household(&h);

    h.say(ADMIN, "change numbers", monday(9)).await;
    h.say(ADMIN, "change numbers", monday(9)).await;
    h.say(ADMIN, "abbrechen", monday(9)).await;
    h.say(ADMIN, "2", monday(9)).await;
    let sent = texts_to(&h.gateway.take(), ADMIN);
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[1], messages::session_busy());
    assert_eq!(sent[2], messages::session_cancelled());

    h.say(ADMIN, "change numbers", monday(10)).await;
    h.gateway.take();
    let later = monday(10) + Duration::minutes(31);
    h.say(ADMIN, "2", later).await;
    assert!(h.gateway.take().is_empty());
}

#[tokio::test]
async fn worker_handles_queued_events_in_order() {
    let h = Harness::new();
    let (_admin, anna, _ben) = household(&h);
    let (tx, rx) = mpsc::channel(8);

    tx.send(EngineEvent::Trigger {
        kind: TriggerKind::AllocateCycle,
        at: monday(8),
    })
    .await
    .unwrap();
    tx.send(EngineEvent::Inbound {
        message: InboundMessage::new(ANNA, "ja"),
        at: monday(9),
    })
    .await
    .unwrap();
    tx.send(EngineEvent::Inbound {
        message: InboundMessage::new(ANNA, "unerledigt"),
        at: monday(9),
    })
    .await
    .unwrap();
    drop(tx);

    let Harness {
        engine,
        store,
        gateway,
    } = h;
    chorewheel::runtime::run_worker(engine, rx).await;

    let records = store
        .assignments_for_cycle(crate::helpers::week())
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].participant_id, anna);
    assert_eq!(
        records[0].status,
        chorewheel::model::AssignmentStatus::Confirmed
    );
    assert_eq!(
        texts_to(&gateway.take(), ANNA),
        vec![
            messages::assigned("Anna", "Küche", crate::helpers::week()),
            messages::confirmed("Küche"),
            messages::incomplete("Küche"),
        ]
    );
}

#[tokio::test]
async fn oversized_session_ttl_is_clamped() {
    let mut config = crate::helpers::test_config();
    config.session.ttl_minutes = u64::MAX;
    let mut h = Harness::with_config(config);
    household(&h);

    h.say(ADMIN, "change numbers", monday(9)).await;
    assert_eq!(texts_to(&h.gateway.take(), ADMIN).len(), 1);

    // Still live six days later, gone after the one-week cap.
    h.say(ADMIN, "42", monday(9) + Duration::days(6)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), ADMIN),
        vec![messages::invalid_participant()]
    );
    h.say(ADMIN, "42", monday(9) + Duration::days(14)).await;
    assert!(h.gateway.take().is_empty());
}

#[tokio::test]
async fn formatted_admin_entry_still_grants_access() {
    let mut config = crate::helpers::test_config();
    config.admin.allowed = vec!["+49 170 0000000".to_owned()];
    let mut h = Harness::with_config(config);
    household(&h);

    h.say(ADMIN, "do allocate-cycle", monday(9)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), ADMIN),
        vec![messages::trigger_done(TriggerKind::AllocateCycle)]
    );
}
