//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::diagnostics::Diagnostic;

/// Metrics published by the reconciliation engine.
#[derive(Clone)]
pub struct EngineMetrics {
    projections: IntCounter,
    emitters: IntGauge,
    diagnostics: IntCounterVec,
    eligibility: IntCounterVec,
    #[allow(dead_code)]
    registry: Arc<Registry>,
}

impl EngineMetrics {
    /// Register all engine metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let projections = IntCounter::with_opts(Opts::new(
            "r_emc_projections_total",
            "Total number of reconciliations performed over a message snapshot",
        ))?;
        registry.register(Box::new(projections.clone()))?;

        let emitters = IntGauge::with_opts(Opts::new(
            "r_emc_projected_emitters",
            "Number of emitters in the most recent projection",
        ))?;
        registry.register(Box::new(emitters.clone()))?;

        let diagnostics = IntCounterVec::new(
            Opts::new(
                "r_emc_diagnostics_total",
                "Non-fatal findings raised while interpreting message snapshots",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(diagnostics.clone()))?;

        let eligibility = IntCounterVec::new(
            Opts::new(
                "r_emc_eligibility_evaluations_total",
                "Eligibility decisions evaluated, by outcome",
            ),
            &["eligible"],
        )?;
        registry.register(Box::new(eligibility.clone()))?;

        Ok(Self {
            projections,
            emitters,
            diagnostics,
            eligibility,
            registry,
        })
    }

    /// Record a completed projection with the resulting emitter count.
    pub fn record_projection(&self, emitters: usize) {
        self.projections.inc();
        self.emitters.set(emitters as i64);
    }

    /// Count a diagnostic by kind.
    pub fn record_diagnostic(&self, diagnostic: &Diagnostic) {
        self.diagnostics
            .with_label_values(&[diagnostic.kind()])
            .inc();
    }

    /// Count an eligibility decision.
    pub fn record_eligibility(&self, eligible: bool) {
        let label = if eligible { "true" } else { "false" };
        self.eligibility.with_label_values(&[label]).inc();
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish_non_exhaustive()
    }
}
