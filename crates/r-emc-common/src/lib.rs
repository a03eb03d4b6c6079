//! ---
//! emc_section: "01-core-functionality"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Shared primitives and utilities for the workspace."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Shared primitives for the R-EMC workspace: configuration loading and
//! tracing initialisation consumed by the store and the CLI.

pub mod config;
pub mod logging;

pub use config::{AppConfig, EngineConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, StoreConfig};
pub use logging::{init_tracing, LogFormat};
