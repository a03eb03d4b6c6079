//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Reconciliation engine over the message log."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Message-log state reconciliation and action-eligibility engine.
//!
//! Everything here is a pure function of a message snapshot: the same set of
//! records, in any order, yields the same emitter views, eligibility decisions
//! and diagnostics. Nothing performs I/O or keeps state between calls.
#![warn(missing_docs)]

pub mod conflict;
pub mod diagnostics;
pub mod eligibility;
pub mod log;
pub mod metrics;
pub mod projector;
pub mod reconciler;

pub use conflict::{find_conflicts, Conflict, ConflictCandidate, ConflictReason, ConflictSet, WriteIntent};
pub use diagnostics::Diagnostic;
pub use eligibility::{
    alternation_violations, eligibility_map, evaluate, evaluate_entry, pair_state, Eligibility,
    EligibilityReason, PairState,
};
pub use log::{LogEntry, MessageLog};
pub use metrics::EngineMetrics;
pub use projector::{project, project_emitter, triggering_add, EmitterView, ProjectorOptions};
pub use reconciler::{Reconciler, Reconciliation};
