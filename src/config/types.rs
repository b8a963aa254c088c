/// Core types and structures for the scorebox system
use crate::contract::verdict::ContractViolation;
use crate::utils::env_hygiene::EnvPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Probe worker configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Interpreter used to run the probe harness
    pub python_executable: PathBuf,
    /// Wall clock limit for one probe run
    pub wall_time_limit: Duration,
    /// CPU time limit for one probe run
    pub cpu_time_limit: Option<Duration>,
    /// Address space limit in bytes
    pub memory_limit: Option<u64>,
    /// Per-stream cap on collected worker output (bytes)
    pub output_limit: usize,
    /// How long to wait for pipe collectors after the worker is reaped
    pub collection_timeout: Duration,
    /// Extra environment variables for the worker
    #[serde(default)]
    pub environment: Vec<(String, String)>,
    /// How the worker environment is assembled
    #[serde(default)]
    pub env_policy: EnvPolicy,
}

impl ValidatorConfig {
    /// Defaults overridden by `SCOREBOX_PYTHON`, `SCOREBOX_WALL_TIME_MS`,
    /// `SCOREBOX_MEMORY_LIMIT_MB` and `SCOREBOX_INHERIT_ENV`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(python) = std::env::var("SCOREBOX_PYTHON") {
            config.python_executable = PathBuf::from(python);
        }

        if let Ok(raw) = std::env::var("SCOREBOX_WALL_TIME_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                ScoreboxError::Config(format!("SCOREBOX_WALL_TIME_MS={raw:?}: {e}"))
            })?;
            config.wall_time_limit = Duration::from_millis(ms);
        }

        if let Ok(raw) = std::env::var("SCOREBOX_MEMORY_LIMIT_MB") {
            let mb = raw.trim().parse::<u64>().map_err(|e| {
                ScoreboxError::Config(format!("SCOREBOX_MEMORY_LIMIT_MB={raw:?}: {e}"))
            })?;
            config.memory_limit = memory_limit_from_mb(mb, "SCOREBOX_MEMORY_LIMIT_MB")?;
        }

        if let Ok(raw) = std::env::var("SCOREBOX_INHERIT_ENV") {
            config.env_policy.inherit_host = matches!(raw.trim(), "1" | "true" | "yes");
        }

        Ok(config)
    }
}

/// Address space limit for a megabyte count; 0 disables the limit.
pub(crate) fn memory_limit_from_mb(mb: u64, source: &str) -> Result<Option<u64>> {
    if mb == 0 {
        return Ok(None);
    }
    mb.checked_mul(1024 * 1024)
        .map(Some)
        .ok_or_else(|| ScoreboxError::Config(format!("{source}={mb}: memory limit overflows u64")))
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            python_executable: PathBuf::from("python3"),
            wall_time_limit: Duration::from_secs(10),
            cpu_time_limit: Some(Duration::from_secs(10)),
            memory_limit: Some(512 * 1024 * 1024), // 512MB address space
            output_limit: 1024 * 1024,             // 1MB per stream
            collection_timeout: Duration::from_secs(2),
            environment: Vec::new(),
            env_policy: EnvPolicy::default(),
        }
    }
}

/// Custom error types for scorebox
#[derive(Error, Debug)]
pub enum ScoreboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scoring code rejected: {0}")]
    Contract(#[from] ContractViolation),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema validation failed at {path}: {message}")]
    SchemaValidation { path: String, message: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown scoring type: {0}")]
    UnknownScoringType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Job error: {0}")]
    Job(String),
}

impl ScoreboxError {
    /// The contract violation behind this error, if any.
    pub fn violation(&self) -> Option<&ContractViolation> {
        match self {
            ScoreboxError::Contract(violation) => Some(violation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoreboxError>;
