//! StratRun Runner: process orchestration, analytics, run results, export.
//!
//! This crate builds on `stratrun-core` to provide:
//! - TOML run configuration with content hashing
//! - Engine profiles (protocol dialect, analytics capabilities, env mapping)
//! - Temporary or caller-owned run artifacts
//! - The process orchestrator and its cancellation handle
//! - Performance analytics (returns, drawdown, risk ratios, moments, trade stats)
//! - JSON / CSV / Markdown export
//! - Parallel batch execution

pub mod artifact;
pub mod batch;
pub mod config;
pub mod export;
pub mod metrics;
pub mod orchestrator;
pub mod profile;
pub mod result;

pub use artifact::{ArtifactError, RunArtifact};
pub use batch::{run_batch, run_batch_with_progress, run_batch_with_threads, RunRequest};
pub use config::{ConfigError, RunConfig};
pub use metrics::PerformanceSnapshot;
pub use orchestrator::{Orchestrator, RunError, RunState, Terminator};
pub use profile::{Capabilities, EngineProfile, EnvMapping};
pub use result::{RunResult, SCHEMA_VERSION};
