//! ---
//! emc_section: "05-networking-external-interfaces"
//! emc_subsection: "binary"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Operator CLI for the R-EMC message store."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use clap::Args;
use r_emc_msg::MessageId;
use r_emc_persistence::{replay_journal, JournalEntry};

use crate::{Completion, Session};

#[derive(Debug, Args)]
pub struct EligibilityArgs {
    /// Restrict output to one message.
    #[arg(long, value_name = "ID")]
    id: Option<String>,
    /// Only list messages that may be sent now.
    #[arg(long)]
    eligible_only: bool,
}

pub fn status(session: &Session) -> Result<Completion> {
    let result = session.reconciler.reconcile_log(&session.store.log());
    if session.json {
        session.print_json(&result.views)?;
    } else if result.views.is_empty() {
        println!("No emitters defined");
    } else {
        println!(
            "{:<12} {:<20} {:>9} {:>9} {:>8} {:>8}  STATE",
            "EMITTER", "NAME", "AMPLITUDE", "DIRECTION", "PRI", "PW"
        );
        for view in result.views.values() {
            let state = match (view.removed, view.active, view.transmitted) {
                (true, _, _) => "removed",
                (false, true, _) => "active",
                (false, false, true) => "idle",
                (false, false, false) => "pending",
            };
            println!(
                "{:<12} {:<20} {:>9} {:>9} {:>8} {:>8}  {}",
                view.target_id.as_str(),
                view.name,
                number(view.amplitude),
                number(view.direction),
                number(view.pri),
                number(view.pulse_width),
                state
            );
        }
    }
    print_diagnostics(session, &result.diagnostics);
    Ok(Completion::Done)
}

pub fn eligibility(session: &Session, args: &EligibilityArgs) -> Result<Completion> {
    let log = session.store.log();
    let result = session.reconciler.reconcile_log(&log);
    let filter = args.id.as_deref().map(MessageId::from);
    if let Some(id) = &filter {
        if log.get(id).is_none() {
            return Err(anyhow!("message {id} not found"));
        }
    }

    let rows: Vec<_> = log
        .iter()
        .filter(|entry| filter.as_ref().map_or(true, |id| entry.id() == id))
        .filter_map(|entry| {
            result
                .eligibility
                .get(entry.id())
                .map(|decision| (entry, *decision))
        })
        .filter(|(_, decision)| !args.eligible_only || decision.eligible)
        .collect();

    if session.json {
        let body: Vec<_> = rows
            .iter()
            .map(|(entry, decision)| {
                serde_json::json!({
                    "id": entry.id(),
                    "name": entry.record().name(),
                    "type": entry.message_type(),
                    "targetId": entry.target(),
                    "sent": entry.is_sent(),
                    "eligible": decision.eligible,
                    "reason": decision.reason,
                })
            })
            .collect();
        session.print_json(&body)?;
    } else {
        for (entry, decision) in &rows {
            println!(
                "{:<38} {:<16} {:<10} sent={:<5} eligible={:<5} ({:?})",
                entry.id().as_str(),
                entry.message_type().as_str(),
                entry.target().map(|t| t.as_str()).unwrap_or("-"),
                entry.is_sent(),
                decision.eligible,
                decision.reason
            );
        }
    }
    Ok(Completion::Done)
}

pub fn messages(session: &Session) -> Result<Completion> {
    let log = session.store.log();
    if session.json {
        let records: Vec<_> = log.iter().map(|entry| entry.record()).collect();
        session.print_json(&records)?;
    } else {
        for entry in log.iter() {
            let record = entry.record();
            println!(
                "{} {:<38} {:<16} {:<20} saved={:<5} sent={:<5} {}",
                record.created_at().to_rfc3339(),
                record.id().as_str(),
                record.message_type().as_str(),
                record.name(),
                record.is_saved(),
                record.is_sent(),
                record.raw_parameters()
            );
        }
    }
    print_diagnostics(session, log.diagnostics());
    Ok(Completion::Done)
}

pub fn journal(session: &Session) -> Result<Completion> {
    let path = session
        .journal
        .as_ref()
        .ok_or_else(|| anyhow!("no journal configured (set store.journal or pass --journal)"))?;
    let mut entries: Vec<JournalEntry> = Vec::new();
    if path.exists() {
        replay_journal(path, |entry| {
            entries.push(entry);
            Ok(())
        })?;
    }
    if session.json {
        session.print_json(&entries)?;
    } else {
        for entry in &entries {
            println!(
                "{:>6} {} {}",
                entry.sequence,
                entry.timestamp.to_rfc3339(),
                serde_json::to_string(&entry.operation)?
            );
        }
    }
    Ok(Completion::Done)
}

fn print_diagnostics(session: &Session, diagnostics: &[r_emc_core::Diagnostic]) {
    if session.json {
        return;
    }
    for diagnostic in diagnostics {
        eprintln!("warning: {diagnostic}");
    }
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_owned())
}
