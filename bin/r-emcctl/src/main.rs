//! ---
//! emc_section: "05-networking-external-interfaces"
//! emc_subsection: "binary"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Operator CLI for the R-EMC message store."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prometheus::{Encoder, Registry, TextEncoder};
use r_emc_common::config::AppConfig;
use r_emc_common::init_tracing;
use r_emc_core::{EngineMetrics, ProjectorOptions, Reconciler};
use r_emc_persistence::{MessageStore, StoreMetrics, StoreSettings};
use serde::Serialize;

mod query;
mod write;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "R-EMC message store and emitter state utility",
    long_about = None
)]
struct Cli {
    /// Configuration file (R_EMC_CONFIG takes precedence when set).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the store document path from the configuration.
    #[arg(long, global = true, value_name = "FILE")]
    store: Option<PathBuf>,
    /// Override the journal path from the configuration.
    #[arg(long, global = true, value_name = "FILE")]
    journal: Option<PathBuf>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the projected state of every emitter.
    Status,
    /// Show whether each message may be sent now.
    Eligibility(query::EligibilityArgs),
    /// List stored messages in log order.
    Messages,
    /// Preview saved messages a new message would collide with.
    Conflicts(write::MessageArgs),
    /// Save and/or send a new message.
    Submit(write::SubmitArgs),
    /// Transmit a stored message (a new record if it was already sent).
    Send(write::IdArgs),
    /// Transmit a copy of a stored message as a new record.
    Resend(write::IdArgs),
    /// Flag a stored message as sent without transmitting it.
    MarkSent(write::IdArgs),
    /// Delete a stored message.
    Delete(write::IdArgs),
    /// Print the operation journal.
    Journal,
}

/// State shared by every subcommand.
pub(crate) struct Session {
    pub store: MessageStore,
    pub reconciler: Reconciler,
    pub journal: Option<PathBuf>,
    pub json: bool,
    registry: Option<Arc<Registry>>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let mut candidates = Vec::new();
        if let Some(path) = &cli.config {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from("configs/emc.toml"));
        let loaded = AppConfig::load_or_default(&candidates)?;
        let mut config = loaded.config;
        if let Some(store) = &cli.store {
            config.store.path = store.clone();
        }
        if let Some(journal) = &cli.journal {
            config.store.journal = Some(journal.clone());
        }
        config.validate()?;

        init_tracing("r-emcctl", &config.logging)?;
        tracing::debug!(
            source = ?loaded.source,
            store = %config.store.path.display(),
            "configuration resolved"
        );

        let settings = StoreSettings {
            enforce_eligibility: config.store.enforce_eligibility,
            require_confirmation: config.store.require_confirmation,
        };
        let mut store = MessageStore::open(&config.store.path, settings)
            .with_context(|| format!("unable to open store {}", config.store.path.display()))?;
        if let Some(journal) = &config.store.journal {
            store = store
                .with_journal(journal)
                .with_context(|| format!("unable to open journal {}", journal.display()))?;
        }

        let mut reconciler = Reconciler::new(ProjectorOptions {
            fold_updates: config.engine.fold_updates,
        });
        let registry = if config.metrics.enabled {
            let registry = Arc::new(Registry::new());
            reconciler = reconciler.with_metrics(EngineMetrics::new(registry.clone())?);
            store = store.with_metrics(StoreMetrics::new(registry.clone())?);
            Some(registry)
        } else {
            None
        };

        Ok(Self {
            journal: config.store.journal.clone(),
            store,
            reconciler,
            json: cli.json,
            registry,
        })
    }

    /// Print `value` as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn dump_metrics(&self) -> Result<()> {
        if let Some(registry) = &self.registry {
            let mut buffer = Vec::new();
            TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
            eprint!("{}", String::from_utf8_lossy(&buffer));
        }
        Ok(())
    }
}

/// Whether the command took effect or was declined by a store rule.
pub(crate) enum Completion {
    Done,
    Declined,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut session = Session::open(&cli)?;
    let completion = match &cli.command {
        Commands::Status => query::status(&session)?,
        Commands::Eligibility(args) => query::eligibility(&session, args)?,
        Commands::Messages => query::messages(&session)?,
        Commands::Journal => query::journal(&session)?,
        Commands::Conflicts(args) => write::conflicts(&session, args)?,
        Commands::Submit(args) => write::submit(&mut session, args)?,
        Commands::Send(args) => write::send(&mut session, args)?,
        Commands::Resend(args) => write::resend(&mut session, args)?,
        Commands::MarkSent(args) => write::mark_sent(&mut session, args)?,
        Commands::Delete(args) => write::delete(&mut session, args)?,
    };
    session.dump_metrics()?;
    Ok(match completion {
        Completion::Done => ExitCode::SUCCESS,
        Completion::Declined => ExitCode::from(2),
    })
}
