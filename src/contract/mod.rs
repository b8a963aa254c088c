//! Scoring-function contract validation.
//!
//! User scoring code never runs in this process. Each validation spawns one
//! probe worker, reads its nonce-tagged transcript, and classifies it.

pub mod verdict;
pub mod worker;

use crate::config::types::{Result, ValidatorConfig};
use crate::config::validator::validate_config;
use crate::runtime::{python::PythonRuntime, resolve_executable, ProbeRuntime};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use uuid::Uuid;

pub use verdict::{ContractViolation, ExpectedType};

/// Gate for attaching scoring code to a `CodeFunction`.
pub trait ScoringCodeValidator: Send + Sync {
    /// `Ok(())` iff `code` satisfies the scoring-function contract.
    fn validate(&self, code: &str) -> Result<()>;
}

/// Validator backed by an isolated interpreter process.
pub struct ProcessValidator {
    config: ValidatorConfig,
    executable: PathBuf,
    runtime: Box<dyn ProbeRuntime>,
}

impl std::fmt::Debug for ProcessValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessValidator")
            .field("executable", &self.executable)
            .field("runtime", &self.runtime.language())
            .field("wall_time_limit", &self.config.wall_time_limit)
            .finish()
    }
}

impl ProcessValidator {
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        Self::with_runtime(config, Box::new(PythonRuntime))
    }

    /// Validator configured from `SCOREBOX_*` environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::new(ValidatorConfig::from_env()?)
    }

    pub fn with_runtime(config: ValidatorConfig, runtime: Box<dyn ProbeRuntime>) -> Result<Self> {
        let checked = validate_config(&config)?;
        for warning in &checked.warnings {
            log::warn!("Validator config: {}", warning);
        }

        let executable = resolve_executable(&config.python_executable)?;
        log::info!(
            "Using {} runtime at {}",
            runtime.language(),
            executable.display()
        );

        Ok(Self {
            config,
            executable,
            runtime,
        })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn executable(&self) -> &std::path::Path {
        &self.executable
    }
}

impl ScoringCodeValidator for ProcessValidator {
    fn validate(&self, code: &str) -> Result<()> {
        let digest = format!("{:x}", Sha256::digest(code.as_bytes()));
        let nonce = Uuid::new_v4().simple().to_string();
        let argv = self.runtime.probe_command(&self.executable);
        let stdin = self.runtime.probe_stdin(&nonce, code);

        log::debug!("Validating scoring code sha256={}", digest);
        let outcome = worker::run_worker(&self.config, &argv, &stdin)?;
        let transcript = verdict::parse_transcript(&outcome.output.stdout, &nonce);

        match verdict::classify(&outcome, transcript, &self.config) {
            Ok(()) => {
                log::info!(
                    "Scoring code sha256={} accepted in {:?}",
                    digest,
                    outcome.wall_time
                );
                Ok(())
            }
            Err(violation) => {
                log::info!(
                    "Scoring code sha256={} rejected: {}",
                    digest,
                    violation.kind()
                );
                Err(violation.into())
            }
        }
    }
}

impl<V: ScoringCodeValidator + ?Sized> ScoringCodeValidator for &V {
    fn validate(&self, code: &str) -> Result<()> {
        (**self).validate(code)
    }
}

impl<V: ScoringCodeValidator + ?Sized> ScoringCodeValidator for std::sync::Arc<V> {
    fn validate(&self, code: &str) -> Result<()> {
        (**self).validate(code)
    }
}

/// One-shot validation with default limits.
pub fn validate_scoring_code(code: &str) -> Result<()> {
    ProcessValidator::new(ValidatorConfig::default())?.validate(code)
}
