//! ---
//! emc_section: "05-networking-external-interfaces"
//! emc_subsection: "binary"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Operator CLI for the R-EMC message store."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use anyhow::{bail, Result};
use clap::Args;
use r_emc_core::WriteIntent;
use r_emc_msg::{encode, keys, MessageId, MessageType, ParamValue, ParameterMap};
use r_emc_persistence::{WriteOutcome, WriteRequest};

use crate::{Completion, Session};

/// Description of a prospective message.
#[derive(Debug, Args)]
pub struct MessageArgs {
    /// Operator label.
    #[arg(long)]
    name: String,
    /// Message type, e.g. addEmitter, start-emitter, STOP_EMITTER.
    #[arg(long = "type", value_name = "TYPE", value_parser = parse_type)]
    message_type: MessageType,
    /// Target emitter id.
    #[arg(long, value_name = "EMITTER", conflicts_with = "raw")]
    target: Option<String>,
    /// Additional parameter as KEY=VALUE; numbers and true/false are typed.
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param, conflicts_with = "raw")]
    params: Vec<(String, ParamValue)>,
    /// Pre-encoded parameter payload, stored verbatim.
    #[arg(long, value_name = "JSON")]
    raw: Option<String>,
}

impl MessageArgs {
    fn request(&self, intent: WriteIntent) -> Result<WriteRequest> {
        let payload = match &self.raw {
            Some(raw) => raw.clone(),
            None => {
                let mut map: ParameterMap = self.params.iter().cloned().collect();
                if let Some(target) = &self.target {
                    map.insert(keys::TARGET_ID.to_owned(), ParamValue::from(target.as_str()));
                }
                encode(&map)?
            }
        };
        Ok(WriteRequest::new(
            self.name.clone(),
            self.message_type.clone(),
            payload,
            intent,
        ))
    }
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    message: MessageArgs,
    /// Persist the message.
    #[arg(long)]
    save: bool,
    /// Transmit the message.
    #[arg(long)]
    send: bool,
    /// Overwrite conflicting saved messages.
    #[arg(long)]
    confirm: bool,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Message id.
    id: String,
}

impl IdArgs {
    fn id(&self) -> MessageId {
        MessageId::from(self.id.as_str())
    }
}

pub fn conflicts(session: &Session, args: &MessageArgs) -> Result<Completion> {
    let conflicts = session.store.conflicts(&args.request(WriteIntent::SAVE)?);
    if session.json {
        session.print_json(&conflicts)?;
    } else if conflicts.is_empty() {
        println!("No conflicts");
    } else {
        for conflict in &conflicts {
            println!(
                "{} {} {} ({:?})",
                conflict.id,
                conflict.message_type,
                conflict.name,
                conflict.reason
            );
        }
    }
    Ok(if conflicts.is_empty() {
        Completion::Done
    } else {
        Completion::Declined
    })
}

pub fn submit(session: &mut Session, args: &SubmitArgs) -> Result<Completion> {
    if !args.save && !args.send {
        bail!("pass --save, --send, or both");
    }
    let intent = WriteIntent {
        save: args.save,
        send: args.send,
    };
    let outcome = session
        .store
        .submit(args.message.request(intent)?, args.confirm)?;
    report(session, &outcome)
}

pub fn send(session: &mut Session, args: &IdArgs) -> Result<Completion> {
    let outcome = session.store.send(&args.id())?;
    report(session, &outcome)
}

pub fn resend(session: &mut Session, args: &IdArgs) -> Result<Completion> {
    let outcome = session.store.resend(&args.id())?;
    report(session, &outcome)
}

pub fn mark_sent(session: &mut Session, args: &IdArgs) -> Result<Completion> {
    let id = args.id();
    session.store.mark_sent(&id)?;
    if session.json {
        session.print_json(&serde_json::json!({ "id": id, "sent": true }))?;
    } else {
        println!("{id} marked as sent");
    }
    Ok(Completion::Done)
}

pub fn delete(session: &mut Session, args: &IdArgs) -> Result<Completion> {
    let removed = session.store.delete(&args.id())?;
    if session.json {
        session.print_json(&removed)?;
    } else {
        println!("Deleted {} ({})", removed.id(), removed.name());
    }
    Ok(Completion::Done)
}

fn report(session: &Session, outcome: &WriteOutcome) -> Result<Completion> {
    if session.json {
        session.print_json(outcome)?;
    } else {
        match outcome {
            WriteOutcome::Accepted { record, replaced } => {
                println!(
                    "Accepted {} (saved={}, sent={})",
                    record.id(),
                    record.is_saved(),
                    record.is_sent()
                );
                for id in replaced {
                    println!("  replaced {id}");
                }
            }
            WriteOutcome::Conflicts { conflicts } => {
                println!("Conflicts with saved messages; re-run with --confirm to overwrite:");
                for conflict in conflicts {
                    println!("  {} {} ({:?})", conflict.id, conflict.name, conflict.reason);
                }
            }
            WriteOutcome::Refused {
                name,
                message_type,
                eligibility,
            } => {
                println!(
                    "Refused {message_type} '{name}': not eligible ({:?})",
                    eligibility.reason
                );
            }
        }
    }
    Ok(if outcome.is_accepted() {
        Completion::Done
    } else {
        Completion::Declined
    })
}

fn parse_type(raw: &str) -> std::result::Result<MessageType, std::convert::Infallible> {
    raw.parse()
}

fn parse_param(raw: &str) -> std::result::Result<(String, ParamValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = match value.trim() {
        "true" => ParamValue::Flag(true),
        "false" => ParamValue::Flag(false),
        text => text
            .parse::<f64>()
            .map(ParamValue::Number)
            .unwrap_or_else(|_| ParamValue::from(text)),
    };
    Ok((key.to_owned(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_typed() {
        assert_eq!(
            parse_param("amplitude=12.5").unwrap(),
            ("amplitude".to_owned(), ParamValue::Number(12.5))
        );
        assert_eq!(
            parse_param("name=Coastal radar").unwrap(),
            ("name".to_owned(), ParamValue::from("Coastal radar"))
        );
        assert_eq!(
            parse_param("armed=true").unwrap().1,
            ParamValue::Flag(true)
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn type_spellings_are_folded() {
        assert_eq!(parse_type("start-emitter").unwrap(), MessageType::StartEmitter);
        assert_eq!(parse_type("REMOVE_EMITTER").unwrap(), MessageType::RemoveEmitter);
        assert_eq!(
            parse_type("calibrate").unwrap(),
            MessageType::Other("calibrate".into())
        );
    }
}
