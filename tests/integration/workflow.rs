//! Weekly workflow end to end: allocation, replies, reassignment, sweep and
//! digest, driven through `ChoreEngine` against an in-memory store.

use chorewheel::allocation::ConflictPolicy;
use chorewheel::lifecycle::{Reply, ReplyOutcome};
use chorewheel::messages;
use chorewheel::model::{AssignmentStatus, CategoryId, ParticipantId, TaskId};
use chorewheel::scheduler::TriggerKind;
use chorewheel::store::ChoreStore;
use chorewheel::TriggerOutcome;
use chrono::{Duration, TimeZone, Utc};

use crate::helpers::{Harness, group_posts, monday, test_config, texts_to, week};

const P1: &str = "+491711111111";
const P2: &str = "+491722222222";
const P3: &str = "+491733333333";

struct Kitchen {
    category: CategoryId,
    task: TaskId,
    p1: ParticipantId,
    p2: ParticipantId,
}

/// One kitchen task worth 3 points; P1 starts with 5 points, P2 with 2.
fn kitchen(h: &Harness) -> Kitchen {
    let category = h.store.add_category("kitchen").unwrap();
    let p1 = h.store.add_participant("P1", P1).unwrap();
    let p2 = h.store.add_participant("P2", P2).unwrap();
    let task = h.store.add_task("Küche", 3, Some(category)).unwrap();
    h.store.add_eligibility(task, p1).unwrap();
    h.store.add_eligibility(task, p2).unwrap();
    h.seed_score(p1, task, category, 5);
    h.seed_score(p2, task, category, 2);
    Kitchen {
        category,
        task,
        p1,
        p2,
    }
}

#[tokio::test]
async fn decline_confirm_complete_credits_once() {
    let mut h = Harness::new();
    let k = kitchen(&h);

    let outcome = h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    assert_eq!(
        outcome,
        TriggerOutcome::Allocated {
            created: 1,
            already_open: 0,
            unassigned: 0
        }
    );
    // Lower score gets the task.
    assert_eq!(h.open_holder(k.task), Some(k.p2));
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, P2),
        vec![messages::assigned("P2", "Küche", week())]
    );

    h.say(P2, "nein", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(texts_to(&sent, P2), vec![messages::declined("Küche")]);
    assert_eq!(
        texts_to(&sent, P1),
        vec![messages::reassigned("P1", "Küche", week())]
    );

    let records = h.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].participant_id, k.p2);
    assert_eq!(records[0].status, AssignmentStatus::Declined);
    assert_eq!(records[1].participant_id, k.p1);
    assert_eq!(records[1].status, AssignmentStatus::Pending);
    assert_ne!(records[0].id, records[1].id);

    h.say(P1, "Ja", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(texts_to(&sent, P1), vec![messages::confirmed("Küche")]);
    let posts = group_posts(&sent);
    assert_eq!(posts.len(), 1);
    assert!(posts[0].starts_with("Alle Aufgaben für Woche 2026-W42 sind vergeben:"));
    assert!(posts[0].contains("- Küche: P1 (bestätigt)"));

    h.say(P1, "erledigt", monday(10)).await;
    let sent = h.gateway.take();
    assert_eq!(texts_to(&sent, P1), vec![messages::completed("Küche", 3)]);
    assert_eq!(h.score(k.p1, k.category), 8);
    assert_eq!(h.score(k.p2, k.category), 2);

    // Replays change nothing.
    h.say(P1, "ja", monday(11)).await;
    h.say(P1, "erledigt", monday(11)).await;
    h.say(P2, "ja", monday(11)).await;
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, P1),
        vec![messages::nothing_pending(), messages::nothing_confirmed()]
    );
    assert_eq!(texts_to(&sent, P2), vec![messages::nothing_pending()]);
    assert_eq!(h.score(k.p1, k.category), 8);
    assert_eq!(h.records()[0].status, AssignmentStatus::Declined);
}

#[tokio::test]
async fn second_task_holder_does_not_disturb_reassignment() {
    let mut h = Harness::new();
    let k = kitchen(&h);
    let bathroom = h.store.add_category("bathroom").unwrap();
    let p3 = h.store.add_participant("P3", P3).unwrap();
    let bad = h.store.add_task("Bad", 2, Some(bathroom)).unwrap();
    h.store.add_eligibility(bad, p3).unwrap();

    let outcome = h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    assert_eq!(
        outcome,
        TriggerOutcome::Allocated {
            created: 2,
            already_open: 0,
            unassigned: 0
        }
    );
    assert_eq!(h.open_holder(k.task), Some(k.p2));
    assert_eq!(h.open_holder(bad), Some(p3));
    h.gateway.take();

    // P3 is busy with the bathroom, P2 declined: only P1 remains.
    h.say(P2, "nein", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, P1),
        vec![messages::reassigned("P1", "Küche", week())]
    );
    assert!(texts_to(&sent, P3).is_empty());
    assert_eq!(h.open_holder(k.task), Some(k.p1));
    assert_eq!(h.open_holder(bad), Some(p3));

    h.say(P1, "ja", monday(9)).await;
    let sent = h.gateway.take();
    assert_eq!(texts_to(&sent, P1), vec![messages::confirmed("Küche")]);
    // Bathroom still pending, so no "all assigned" post yet.
    assert!(group_posts(&sent).is_empty());

    h.say(P1, "erledigt", monday(10)).await;
    assert_eq!(h.score(k.p1, k.category), 8);
    assert_eq!(h.score(p3, bathroom), 0);

    let records = h.records();
    assert_eq!(records.len(), 3);
    let status_of = |participant: ParticipantId, task: TaskId| {
        records
            .iter()
            .find(|r| r.participant_id == participant && r.task_id == task)
            .map(|r| r.status)
    };
    assert_eq!(status_of(k.p2, k.task), Some(AssignmentStatus::Declined));
    assert_eq!(status_of(k.p1, k.task), Some(AssignmentStatus::Completed));
    assert_eq!(status_of(p3, bad), Some(AssignmentStatus::Pending));
}

#[tokio::test]
async fn allocation_runs_once_per_cycle() {
    let h = Harness::new();
    let k = kitchen(&h);

    h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    let again = h.trigger(TriggerKind::AllocateCycle, monday(9)).await;
    assert_eq!(
        again,
        TriggerOutcome::Allocated {
            created: 0,
            already_open: 1,
            unassigned: 0
        }
    );
    assert_eq!(h.records().len(), 1);
    assert_eq!(h.open_holder(k.task), Some(k.p2));
}

#[tokio::test]
async fn not_done_keeps_record_confirmed() {
    let mut h = Harness::new();
    let k = kitchen(&h);
    h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    h.say(P2, "ja", monday(9)).await;
    h.gateway.take();

    let survey = h.trigger(TriggerKind::CompletionSurvey, monday(18)).await;
    assert_eq!(survey, TriggerOutcome::Messaged { sent: 1 });
    assert_eq!(
        texts_to(&h.gateway.take(), P2),
        vec![messages::completion_survey("P2", "Küche")]
    );

    h.say(P2, "unerledigt", monday(19)).await;
    assert_eq!(
        texts_to(&h.gateway.take(), P2),
        vec![messages::incomplete("Küche")]
    );
    assert_eq!(h.records()[0].status, AssignmentStatus::Confirmed);
    assert_eq!(h.score(k.p2, k.category), 2);
}

#[tokio::test]
async fn completion_before_week_start_is_refused() {
    let h = Harness::new();
    let k = kitchen(&h);
    let next = week().next();
    let p2 = h.store.participant(k.p2).unwrap().unwrap();

    h.trigger(TriggerKind::AllocateCycle, next.starts_at()).await;
    let lifecycle = h.engine.lifecycle();
    assert!(matches!(
        lifecycle.handle_reply(&p2, Reply::Yes, next, monday(9)).await.unwrap(),
        ReplyOutcome::Confirmed(_)
    ));
    h.gateway.take();

    assert_eq!(
        lifecycle.handle_reply(&p2, Reply::Done, next, monday(9)).await.unwrap(),
        ReplyOutcome::WeekNotStarted
    );
    assert_eq!(
        texts_to(&h.gateway.take(), P2),
        vec![messages::week_not_started(next)]
    );
    assert_eq!(h.score(k.p2, k.category), 2);

    assert!(matches!(
        lifecycle
            .handle_reply(&p2, Reply::Done, next, next.starts_at())
            .await
            .unwrap(),
        ReplyOutcome::Completed { points: 3, .. }
    ));
    assert_eq!(h.score(k.p2, k.category), 5);
}

#[tokio::test]
async fn sweep_expires_all_then_reassigns() {
    let h = Harness::new();
    let p1 = h.store.add_participant("P1", P1).unwrap();
    let p2 = h.store.add_participant("P2", P2).unwrap();
    let p3 = h.store.add_participant("P3", P3).unwrap();
    let bad = h.store.add_task("Bad", 4, None).unwrap();
    let flur = h.store.add_task("Flur", 2, None).unwrap();
    for task in [bad, flur] {
        for p in [p1, p2, p3] {
            h.store.add_eligibility(task, p).unwrap();
        }
    }

    h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    assert_eq!(h.open_holder(bad), Some(p1));
    assert_eq!(h.open_holder(flur), Some(p2));
    h.gateway.take();

    let wednesday = monday(10) + Duration::days(2);
    assert_eq!(
        h.trigger(TriggerKind::RequestConfirmation, wednesday).await,
        TriggerOutcome::Messaged { sent: 2 }
    );
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, P1),
        vec![messages::assignment_request("P1", "Bad", week())]
    );

    let friday = monday(10) + Duration::days(4);
    assert_eq!(
        h.trigger(TriggerKind::RemindPending, friday).await,
        TriggerOutcome::Messaged { sent: 2 }
    );
    h.gateway.take();

    let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
    assert_eq!(
        h.trigger(TriggerKind::SweepAndReassignPending, saturday).await,
        TriggerOutcome::Swept {
            expired: 2,
            reassigned: 1
        }
    );
    // P3 takes the first task; nobody is left for the second.
    assert_eq!(h.open_holder(bad), Some(p3));
    assert_eq!(h.open_holder(flur), None);
    let sent = h.gateway.take();
    assert_eq!(
        texts_to(&sent, P3),
        vec![messages::reassigned("P3", "Bad", week())]
    );
    assert!(texts_to(&sent, P1).is_empty());

    let sunday = saturday + Duration::days(1);
    assert_eq!(
        h.trigger(TriggerKind::DigestIfIncomplete, sunday).await,
        TriggerOutcome::Digest { posted: true }
    );
    let posts = group_posts(&h.gateway.take());
    assert_eq!(posts.len(), 1);
    assert!(posts[0].contains("- Bad: P3 (offen)"));
    assert!(posts[0].contains("- Flur: niemand (nicht vergeben)"));
}

#[tokio::test]
async fn digest_skipped_when_everything_accepted() {
    let mut h = Harness::new();
    kitchen(&h);
    h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    h.say(P2, "ja", monday(9)).await;
    h.gateway.take();

    let sunday = monday(8) + Duration::days(6);
    assert_eq!(
        h.trigger(TriggerKind::DigestIfIncomplete, sunday).await,
        TriggerOutcome::Digest { posted: false }
    );
    assert!(h.gateway.take().is_empty());
}

/// Two tasks only P1 may do; P2 is idle but not eligible.
fn double_assignment(h: &Harness) -> (TaskId, TaskId, ParticipantId, ParticipantId) {
    let p1 = h.store.add_participant("P1", P1).unwrap();
    let p2 = h.store.add_participant("P2", P2).unwrap();
    let small = h.store.add_task("Müll", 3, None).unwrap();
    let big = h.store.add_task("Bad", 5, None).unwrap();
    h.store.add_eligibility(small, p1).unwrap();
    h.store.add_eligibility(big, p1).unwrap();
    (small, big, p1, p2)
}

#[tokio::test]
async fn double_assignment_leaves_surplus_unassigned_by_default() {
    let h = Harness::new();
    let (small, big, p1, _p2) = double_assignment(&h);

    assert_eq!(
        h.trigger(TriggerKind::AllocateCycle, monday(8)).await,
        TriggerOutcome::Allocated {
            created: 1,
            already_open: 0,
            unassigned: 1
        }
    );
    assert_eq!(h.open_holder(big), Some(p1));
    assert_eq!(h.open_holder(small), None);
}

#[tokio::test]
async fn double_assignment_rehomed_to_any_idle_participant() {
    let mut config = test_config();
    config.allocation.conflict = ConflictPolicy::AnyIdle;
    let h = Harness::with_config(config);
    let (small, big, p1, p2) = double_assignment(&h);

    assert_eq!(
        h.trigger(TriggerKind::AllocateCycle, monday(8)).await,
        TriggerOutcome::Allocated {
            created: 2,
            already_open: 0,
            unassigned: 0
        }
    );
    assert_eq!(h.open_holder(big), Some(p1));
    assert_eq!(h.open_holder(small), Some(p2));
}

#[tokio::test]
async fn task_without_category_completes_without_credit() {
    let mut h = Harness::new();
    let p1 = h.store.add_participant("P1", P1).unwrap();
    let task = h.store.add_task("Blumen", 2, None).unwrap();
    h.store.add_eligibility(task, p1).unwrap();

    h.trigger(TriggerKind::AllocateCycle, monday(8)).await;
    h.say(P1, "ja", monday(9)).await;
    h.say(P1, "erledigt", monday(10)).await;

    assert_eq!(h.records()[0].status, AssignmentStatus::Completed);
    assert!(h.store.ledger_entries().unwrap().is_empty());
}
