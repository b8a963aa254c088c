//! Probe runtimes.
//!
//! The contract validator stays language-agnostic. A runtime defines how the
//! probe harness is launched for one language.

pub mod python;

use crate::config::types::{Result, ScoreboxError};
use std::path::{Path, PathBuf};

/// Runtime contract for launching a probe harness.
pub trait ProbeRuntime: Send + Sync {
    fn language(&self) -> &'static str;

    /// Full argv for one probe run. Carries nothing secret: the code under
    /// test can read its own argv.
    fn probe_command(&self, executable: &Path) -> Vec<String>;

    /// Worker stdin: the nonce on the first line, then the scoring code. The
    /// harness tags every protocol line with that nonce.
    fn probe_stdin(&self, nonce: &str, code: &str) -> Vec<u8> {
        let mut input = Vec::with_capacity(nonce.len() + 1 + code.len());
        input.extend_from_slice(nonce.as_bytes());
        input.push(b'\n');
        input.extend_from_slice(code.as_bytes());
        input
    }
}

pub fn runtime_for(language: &str) -> Result<Box<dyn ProbeRuntime>> {
    match language {
        "python" | "py" | "python3" => Ok(Box::new(python::PythonRuntime)),
        _ => Err(ScoreboxError::Config(format!(
            "unsupported probe runtime: {language}"
        ))),
    }
}

/// Resolve an interpreter against the caller's PATH. The worker runs with a
/// deterministic PATH, so lookup must happen before the environment is reset.
pub fn resolve_executable(executable: &Path) -> Result<PathBuf> {
    if executable.components().count() > 1 {
        return if executable.is_file() {
            Ok(executable.to_path_buf())
        } else {
            Err(ScoreboxError::Process(format!(
                "interpreter not found: {}",
                executable.display()
            )))
        };
    }

    let search = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&search)
        .map(|dir| dir.join(executable))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            ScoreboxError::Process(format!(
                "interpreter {} not found on PATH",
                executable.display()
            ))
        })
}
