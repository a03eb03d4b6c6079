//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::Result;

/// Metrics published by the message store.
#[derive(Clone)]
pub struct StoreMetrics {
    records_written: IntCounterVec,
    transmissions: IntCounterVec,
    conflicts: IntCounter,
    refusals: IntCounterVec,
    deletions: IntCounter,
    #[allow(dead_code)]
    registry: Arc<Registry>,
}

impl StoreMetrics {
    /// Register all store metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let records_written = IntCounterVec::new(
            Opts::new(
                "r_emc_records_written_total",
                "Total number of message records added to the store",
            ),
            &["intent"],
        )?;
        registry.register(Box::new(records_written.clone()))?;

        let transmissions = IntCounterVec::new(
            Opts::new(
                "r_emc_transmissions_total",
                "Total number of messages handed to the transmitter",
            ),
            &["message_type"],
        )?;
        registry.register(Box::new(transmissions.clone()))?;

        let conflicts = IntCounter::with_opts(Opts::new(
            "r_emc_conflicts_reported_total",
            "Saves held back pending overwrite confirmation",
        ))?;
        registry.register(Box::new(conflicts.clone()))?;

        let refusals = IntCounterVec::new(
            Opts::new(
                "r_emc_sends_refused_total",
                "Sends refused because the message was not eligible",
            ),
            &["message_type"],
        )?;
        registry.register(Box::new(refusals.clone()))?;

        let deletions = IntCounter::with_opts(Opts::new(
            "r_emc_records_deleted_total",
            "Total number of message records removed from the store",
        ))?;
        registry.register(Box::new(deletions.clone()))?;

        Ok(Self {
            records_written,
            transmissions,
            conflicts,
            refusals,
            deletions,
            registry,
        })
    }

    /// Record a new record with its write intent label.
    pub fn record_written(&self, intent: &str) {
        self.records_written.with_label_values(&[intent]).inc();
    }

    /// Record a transmission.
    pub fn record_transmission(&self, message_type: &str) {
        self.transmissions.with_label_values(&[message_type]).inc();
    }

    /// Record a save held back by conflicts.
    pub fn record_conflict(&self) {
        self.conflicts.inc();
    }

    /// Record a refused send.
    pub fn record_refusal(&self, message_type: &str) {
        self.refusals.with_label_values(&[message_type]).inc();
    }

    /// Record removed records.
    pub fn record_deletions(&self, count: usize) {
        self.deletions.inc_by(count as u64);
    }
}

impl std::fmt::Debug for StoreMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreMetrics").finish_non_exhaustive()
    }
}
