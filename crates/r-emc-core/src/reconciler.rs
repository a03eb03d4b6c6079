//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! One-call facade producing views, eligibility and diagnostics for a snapshot.

use std::collections::BTreeMap;

use r_emc_msg::{EmitterId, MessageId, MessageRecord};
use serde::Serialize;
use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::eligibility::{alternation_violations, eligibility_map, Eligibility};
use crate::log::MessageLog;
use crate::metrics::EngineMetrics;
use crate::projector::{project, EmitterView, ProjectorOptions};

/// Everything derived from one message snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Per-emitter views.
    pub views: BTreeMap<EmitterId, EmitterView>,
    /// Per-message send decisions.
    pub eligibility: BTreeMap<MessageId, Eligibility>,
    /// Non-fatal findings, sorted.
    pub diagnostics: Vec<Diagnostic>,
}

impl Reconciliation {
    /// View of one emitter.
    pub fn view(&self, target: &EmitterId) -> Option<&EmitterView> {
        self.views.get(target)
    }

    /// Whether a logged message may be sent now; `None` for unknown ids.
    pub fn is_eligible(&self, id: &MessageId) -> Option<bool> {
        self.eligibility.get(id).map(|decision| decision.eligible)
    }
}

/// Stateless driver over [`MessageLog`]; holds only options and metrics.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: ProjectorOptions,
    metrics: Option<EngineMetrics>,
}

impl Reconciler {
    /// Reconciler with the given projection options.
    pub fn new(options: ProjectorOptions) -> Self {
        Self {
            options,
            metrics: None,
        }
    }

    /// Attach Prometheus metrics.
    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Projection options in effect.
    pub fn options(&self) -> &ProjectorOptions {
        &self.options
    }

    /// Reconcile records in any order.
    pub fn reconcile(&self, records: impl IntoIterator<Item = MessageRecord>) -> Reconciliation {
        self.reconcile_log(&MessageLog::new(records))
    }

    /// Reconcile an already indexed log.
    pub fn reconcile_log(&self, log: &MessageLog) -> Reconciliation {
        let views = project(log, &self.options);
        let eligibility = eligibility_map(log);

        let violations = alternation_violations(log);
        for violation in &violations {
            violation.log();
        }
        let mut diagnostics: Vec<Diagnostic> = log.diagnostics().to_vec();
        diagnostics.extend(violations);
        diagnostics.sort();

        if let Some(metrics) = &self.metrics {
            metrics.record_projection(views.len());
            diagnostics
                .iter()
                .for_each(|diagnostic| metrics.record_diagnostic(diagnostic));
            eligibility
                .values()
                .for_each(|decision| metrics.record_eligibility(decision.eligible));
        }

        debug!(
            messages = log.len(),
            emitters = views.len(),
            diagnostics = diagnostics.len(),
            "reconciled message snapshot"
        );

        Reconciliation {
            views,
            eligibility,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use prometheus::Registry;
    use r_emc_msg::MessageType;
    use std::sync::Arc;

    fn msg(id: &str, ty: MessageType, raw: &str, t: i64, sent: bool) -> MessageRecord {
        MessageRecord::new(id, ty, raw)
            .with_id(id)
            .with_created_at(Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap())
            .with_saved(true)
            .with_sent(sent)
    }

    #[test]
    fn malformed_record_is_reported_without_blocking_others() {
        let records = vec![
            msg("a", MessageType::AddEmitter, r#"{"targetId":"E1"}"#, 0, true),
            msg("s", MessageType::StartEmitter, r#"{"targetId":"E1"}"#, 1, true),
            msg("bad", MessageType::StopEmitter, "{{{", 2, false),
        ];
        let result = Reconciler::default().reconcile(records);
        assert!(result.view(&"E1".into()).unwrap().active);
        assert_eq!(result.is_eligible(&"bad".into()), Some(true));
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DecodeAnomaly { message_id, .. } if message_id.as_str() == "bad")));
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        let records = vec![
            msg("a", MessageType::AddEmitter, r#"{"targetId":"E1","amplitude":4}"#, 0, true),
            msg("s", MessageType::StartEmitter, r#"{"targetId":"E1"}"#, 1, true),
            msg("s2", MessageType::StartEmitter, r#"{"targetId":"E1"}"#, 2, true),
        ];
        let log = MessageLog::new(records);
        let reconciler = Reconciler::default();
        let first = reconciler.reconcile_log(&log);
        assert_eq!(first, reconciler.reconcile_log(&log));
        assert_eq!(first.diagnostics.len(), 1);
    }

    #[test]
    fn metrics_follow_reconciliations() {
        let registry = Arc::new(Registry::new());
        let metrics = EngineMetrics::new(registry.clone()).unwrap();
        let reconciler = Reconciler::new(ProjectorOptions::default()).with_metrics(metrics);
        reconciler.reconcile(vec![msg(
            "a",
            MessageType::AddEmitter,
            r#"{"targetId":"E1"}"#,
            0,
            false,
        )]);
        let projections = registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == "r_emc_projections_total")
            .unwrap();
        assert_eq!(projections.get_metric()[0].get_counter().get_value(), 1.0);
    }
}
