/// Environment hygiene for probe workers
/// The worker never sees the caller's environment unless the policy opts in.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

const DANGEROUS_LD_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "LD_BIND_NOW",
    "LD_DEBUG",
    "LD_PROFILE",
    "LD_USE_LOAD_BIAS",
    "LD_DYNAMIC_WEAK",
];

/// Environment sanitization policy, carried on `ValidatorConfig`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvPolicy {
    /// Start from the host environment instead of an empty one
    pub inherit_host: bool,
    /// Sanitize dangerous LD_* variables
    pub sanitize_ld_vars: bool,
    /// Set deterministic PATH
    pub set_deterministic_path: bool,
    /// Set deterministic locale
    pub set_deterministic_locale: bool,
    /// Set deterministic temp vars
    pub set_deterministic_temp: bool,
}

impl Default for EnvPolicy {
    fn default() -> Self {
        EnvPolicy {
            inherit_host: false,
            sanitize_ld_vars: true,
            set_deterministic_path: true,
            set_deterministic_locale: true,
            set_deterministic_temp: true,
        }
    }
}

/// Environment hygiene manager
pub struct EnvHygiene {
    env_policy: EnvPolicy,
}

impl EnvHygiene {
    pub fn new(env_policy: EnvPolicy) -> Self {
        EnvHygiene { env_policy }
    }

    /// Build the worker environment. `extra` is applied after the
    /// deterministic values but before LD_* sanitization.
    pub fn sanitize_environment(&self, extra: &[(String, String)]) -> HashMap<String, String> {
        let mut env_map = HashMap::new();

        if self.env_policy.inherit_host {
            env_map.extend(env::vars());
        }

        if self.env_policy.set_deterministic_path {
            env_map.insert(
                "PATH".to_string(),
                "/usr/local/bin:/usr/bin:/bin".to_string(),
            );
        }

        if self.env_policy.set_deterministic_locale {
            env_map.insert("LANG".to_string(), "C.UTF-8".to_string());
            env_map.insert("LC_ALL".to_string(), "C.UTF-8".to_string());
        }

        if self.env_policy.set_deterministic_temp {
            let tmp = env::temp_dir().to_string_lossy().to_string();
            env_map.insert("TMPDIR".to_string(), tmp.clone());
            env_map.insert("HOME".to_string(), tmp);
        }

        for (key, value) in extra {
            env_map.insert(key.clone(), value.clone());
        }

        if self.env_policy.sanitize_ld_vars {
            for var in DANGEROUS_LD_VARS {
                if env_map.remove(*var).is_some() {
                    log::info!("Removed dangerous environment variable: {}", var);
                }
            }
        }

        env_map
    }
}

impl Default for EnvHygiene {
    fn default() -> Self {
        Self::new(EnvPolicy::default())
    }
}

/// Validate environment safety
pub fn validate_environment_safety(env_map: &HashMap<String, String>) -> Vec<String> {
    let mut warnings = Vec::new();

    for var in &DANGEROUS_LD_VARS[..3] {
        if env_map.contains_key(*var) {
            warnings.push(format!("Dangerous environment variable present: {}", var));
        }
    }

    if let Some(path) = env_map.get("PATH") {
        if path.contains("..") || path.contains('~') {
            warnings.push("PATH contains relative or home directory references".to_string());
        }
    }

    warnings
}
