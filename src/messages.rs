//! User-facing message texts (German, as the household uses them).
//!
//! Every text the bot sends is built here so wording stays consistent
//! across triggers, replies and sessions.

use crate::cycle::CycleKey;
use crate::ledger::LedgerSnapshot;
use crate::model::{AssignmentStatus, Category, Participant};
use crate::scheduler::triggers::TriggerKind;

pub fn assigned(name: &str, task: &str, cycle: CycleKey) -> String {
    format!("Hallo {name}! Deine Aufgabe in Woche {cycle}: \"{task}\".")
}

pub fn assignment_request(name: &str, task: &str, cycle: CycleKey) -> String {
    format!(
        "Hallo {name}! In Woche {cycle} bist du für \"{task}\" eingeteilt. \
         Übernimmst du die Aufgabe? Antworte mit \"ja\" oder \"nein\"."
    )
}

pub fn reminder(name: &str, task: &str) -> String {
    format!(
        "Erinnerung, {name}: Du hast noch nicht bestätigt, ob du \"{task}\" übernimmst. \
         Bitte antworte mit \"ja\" oder \"nein\"."
    )
}

pub fn reassigned(name: &str, task: &str, cycle: CycleKey) -> String {
    format!(
        "Hallo {name}! \"{task}\" wurde in Woche {cycle} neu vergeben und ist jetzt bei dir. \
         Übernimmst du die Aufgabe? Antworte mit \"ja\" oder \"nein\"."
    )
}

pub fn completion_survey(name: &str, task: &str) -> String {
    format!(
        "Hallo {name}! Hast du \"{task}\" diese Woche erledigt? \
         Antworte mit \"erledigt\" oder \"unerledigt\"."
    )
}

pub fn confirmed(task: &str) -> String {
    format!("Danke! \"{task}\" ist für dich eingetragen.")
}

pub fn declined(task: &str) -> String {
    format!("Alles klar, \"{task}\" wird neu vergeben.")
}

pub fn completed(task: &str, points: u32) -> String {
    format!("Super! \"{task}\" ist erledigt, dir wurden {points} Punkte gutgeschrieben.")
}

pub fn incomplete(task: &str) -> String {
    format!("Okay, \"{task}\" bleibt offen. Melde dich mit \"erledigt\", sobald du fertig bist.")
}

pub fn nothing_pending() -> String {
    "Du hast keine offene Anfrage. Entweder hast du schon geantwortet oder diese Woche keine Aufgabe."
        .to_owned()
}

pub fn nothing_confirmed() -> String {
    "Du hast diese Woche keine bestätigte Aufgabe.".to_owned()
}

pub fn week_not_started(cycle: CycleKey) -> String {
    format!("Woche {cycle} hat noch nicht begonnen. Du kannst die Aufgabe erst danach als erledigt melden.")
}

pub fn no_longer_applicable() -> String {
    "Diese Antwort passt nicht mehr zum aktuellen Stand deiner Aufgabe.".to_owned()
}

/// One line of a cycle digest.
pub struct DigestLine<'a> {
    pub task: &'a str,
    pub holder: Option<&'a str>,
    pub status: Option<AssignmentStatus>,
}

fn status_label(status: Option<AssignmentStatus>) -> &'static str {
    match status {
        Some(AssignmentStatus::Pending) => "offen",
        Some(AssignmentStatus::Confirmed) => "bestätigt",
        Some(AssignmentStatus::Completed) => "erledigt",
        Some(AssignmentStatus::Declined) | None => "nicht vergeben",
    }
}

pub fn digest(cycle: CycleKey, all_confirmed: bool, lines: &[DigestLine<'_>]) -> String {
    let mut out = if all_confirmed {
        format!("Alle Aufgaben für Woche {cycle} sind vergeben:")
    } else {
        format!("Stand der Aufgaben für Woche {cycle}:")
    };
    for line in lines {
        out.push('\n');
        out.push_str(&format!(
            "- {}: {} ({})",
            line.task,
            line.holder.unwrap_or("niemand"),
            status_label(line.status)
        ));
    }
    out
}

pub fn score_report(
    participants: &[Participant],
    categories: &[Category],
    ledger: &LedgerSnapshot,
) -> String {
    let mut out = String::from("Punktestand:");
    for participant in participants {
        let per_category: Vec<String> = categories
            .iter()
            .map(|c| format!("{} {}", c.name, ledger.score(participant.id, c.id)))
            .collect();
        out.push('\n');
        if per_category.is_empty() {
            out.push_str(&format!(
                "{}: {}",
                participant.name,
                ledger.total(participant.id)
            ));
        } else {
            out.push_str(&format!(
                "{}: {} (gesamt {})",
                participant.name,
                per_category.join(", "),
                ledger.total(participant.id)
            ));
        }
    }
    out
}

pub fn command_overview(is_admin: bool) -> String {
    let mut out = String::from(
        "Befehle:\n\
         ja / nein - Aufgabe annehmen oder ablehnen\n\
         erledigt / unerledigt - Aufgabe als erledigt melden oder offen lassen\n\
         report - Punktestand anzeigen\n\
         abbrechen - laufenden Dialog beenden",
    );
    if is_admin {
        out.push_str(
            "\n\nAdmin:\n\
             change numbers - Name und Nummer eines Teilnehmers ändern\n\
             do help - verfügbare Aktionen anzeigen\n\
             do <aktion> - Aktion sofort ausführen",
        );
    }
    out
}

pub fn trigger_overview() -> String {
    let mut out = String::from("Aktionen:");
    for kind in TriggerKind::ALL {
        out.push_str(&format!("\ndo {kind}"));
    }
    out
}

pub fn trigger_done(kind: TriggerKind) -> String {
    format!("Aktion \"{kind}\" ausgeführt.")
}

pub fn unknown_trigger(name: &str) -> String {
    format!("Unbekannte Aktion \"{name}\". Schreib \"do help\" für die Liste.")
}

pub fn not_authorized() -> String {
    "Dieser Befehl ist nur für Admins.".to_owned()
}

pub fn forwarded(sender: &str, text: &str) -> String {
    format!("Nachricht von {sender}:\n{text}")
}

// -- sessions ---------------------------------------------------------------

pub fn participant_listing(participants: &[Participant]) -> String {
    let mut out = String::from("Wessen Daten sollen geändert werden? Antworte mit der Nummer:");
    for p in participants {
        out.push_str(&format!("\n{}: {} ({})", p.id, p.name, p.address));
    }
    out
}

pub fn ask_name() -> String {
    "Wie lautet der neue Name?".to_owned()
}

pub fn ask_address() -> String {
    "Wie lautet die neue Nummer (mit Ländervorwahl, z. B. +4917012345678)?".to_owned()
}

pub fn invalid_participant() -> String {
    "Diese Nummer gibt es nicht. Bitte wähle eine aus der Liste.".to_owned()
}

pub fn invalid_name() -> String {
    "Der Name darf nicht leer sein.".to_owned()
}

pub fn invalid_address() -> String {
    "Das ist keine gültige Nummer. Bitte mit + und Ländervorwahl angeben.".to_owned()
}

pub fn address_taken() -> String {
    "Diese Nummer gehört schon einem anderen Teilnehmer.".to_owned()
}

pub fn participant_updated(name: &str, address: &str) -> String {
    format!("Gespeichert: {name}, {address}.")
}

pub fn session_cancelled() -> String {
    "Dialog abgebrochen.".to_owned()
}

pub fn no_session() -> String {
    "Es läuft gerade kein Dialog.".to_owned()
}

pub fn session_busy() -> String {
    "Es läuft bereits ein Dialog. Schreib \"abbrechen\", um ihn zu beenden.".to_owned()
}
