// Config Validation
// Probe limits are checked before any worker is spawned; errors are fatal,
// warnings are logged by the caller.

use crate::config::types::{Result, ScoreboxError, ValidatorConfig};
use crate::utils::env_hygiene::validate_environment_safety;
use std::collections::HashMap;
use std::time::Duration;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a probe configuration, failing fast on errors.
pub fn validate_config(config: &ValidatorConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_runtime(config, &mut result);
    validate_environment(config, &mut result);

    if !result.is_valid() {
        return Err(ScoreboxError::Config(format!(
            "Validator config rejected:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &ValidatorConfig, result: &mut ValidationResult) {
    if config.wall_time_limit == Duration::ZERO {
        result.add_error("wall_time_limit cannot be zero".to_string());
    }

    if let Some(cpu_time) = config.cpu_time_limit {
        if cpu_time == Duration::ZERO {
            result.add_error("cpu_time_limit cannot be zero".to_string());
        } else if cpu_time.as_secs() == 0 {
            // RLIMIT_CPU has whole-second granularity
            result.add_warning(format!(
                "cpu_time_limit {:?} rounds up to 1s",
                cpu_time
            ));
        }
    }

    if let Some(memory_limit) = config.memory_limit {
        if memory_limit == 0 {
            result.add_error("memory_limit cannot be zero".to_string());
        } else if memory_limit < 64 * 1024 * 1024 {
            result.add_warning(format!(
                "memory_limit {} is very low (< 64MB), the interpreter may fail to start",
                memory_limit
            ));
        }
    }

    if config.output_limit == 0 {
        result.add_error("output_limit cannot be zero".to_string());
    }

    if let Some(cpu_time) = config.cpu_time_limit {
        if config.wall_time_limit < cpu_time {
            result.add_warning(format!(
                "wall_time_limit ({:?}) is below cpu_time_limit ({:?}); wall clock wins",
                config.wall_time_limit, cpu_time
            ));
        }
    }
}

fn validate_runtime(config: &ValidatorConfig, result: &mut ValidationResult) {
    if config.python_executable.as_os_str().is_empty() {
        result.add_error("python_executable cannot be empty".to_string());
    }
}

fn validate_environment(config: &ValidatorConfig, result: &mut ValidationResult) {
    if config.env_policy.inherit_host {
        result.add_warning("worker inherits the caller's environment".to_string());
    }
    if !config.env_policy.sanitize_ld_vars {
        result.add_warning("LD_* sanitization is disabled for the worker".to_string());
    }

    let env_map: HashMap<String, String> = config.environment.iter().cloned().collect();
    for warning in validate_environment_safety(&env_map) {
        result.add_warning(warning);
    }
}
