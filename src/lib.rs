//! scorebox: scoring specification builder and isolated scoring-code validator
//!
//! # Architecture
//!
//! ## Scoring Specs ([`builder`], [`wire`])
//! - [`wire`]: Flat wire form exchanged with the scoring service
//! - [`builder::spec`]: Read-write tree over a spec, hydrate/edit/build
//! - [`builder::dimension`]: Ordered groups of sub-dimensions
//! - [`builder::subdimension`]: Service questions and code-backed functions
//! - [`builder::question`]: Stand-alone questions outside a tree
//!
//! ## Contract Validation ([`contract`])
//! - [`contract::worker`]: Probe worker lifecycle (spawn, limits, reap)
//! - [`contract::verdict`]: Transcript parsing and verdict classification
//! - [`runtime`]: Language runtimes that launch the probe harness
//!
//! ## Job Streams ([`jobs`])
//! - [`jobs::blocking`]: Thread-backed merge of message and data channels
//! - [`jobs::cooperative`]: Single-task async merge
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Validator limits and the crate error type
//! - [`config::validator`]: Limit sanity checks (errors vs. warnings)
//!
//! ## Utilities ([`utils`])
//! - [`utils::env_hygiene`]: Worker environment scrubbing
//! - [`utils::output`]: Bounded output collection
//!
//! # Design Principles
//!
//! 1. **User code never runs in-process** - One worker per validation
//! 2. **Evidence-backed verdicts** - No terminal report means failure
//! 3. **Always reap** - Every worker is waited on before returning
//! 4. **Types prevent errors** - A `CodeFunction` only holds validated code

// Wire form
pub mod wire;

// Scoring spec tree
pub mod builder;

// Scoring-function contract validation
pub mod contract;

// Probe runtimes
pub mod runtime;

// Job streaming
pub mod jobs;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the scorebox binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use builder::{CodeFunction, Dimension, ScoringSpecBuilder, ServiceQuestion, SubDimension};
pub use config::types::{Result, ScoreboxError, ValidatorConfig};
pub use contract::{
    validate_scoring_code, ContractViolation, ProcessValidator, ScoringCodeValidator,
};
pub use jobs::{DataRecord, JobState, JobStatus};
pub use wire::{Question, ScoringSpec};
