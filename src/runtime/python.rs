use crate::runtime::ProbeRuntime;
use std::path::Path;

/// Probe harness source. Reads the nonce line and the code from stdin.
/// Protocol lines on stdout, each prefixed with the per-run nonce:
/// - `<nonce>:begin-call` / `<nonce>:end-call` bracket the `score()` call
/// - `<nonce>:report:<json>` is the single terminal report
pub const HARNESS: &str = include_str!("harness.py");

#[derive(Debug, Clone, Default)]
pub struct PythonRuntime;

impl ProbeRuntime for PythonRuntime {
    fn language(&self) -> &'static str {
        "python"
    }

    fn probe_command(&self, executable: &Path) -> Vec<String> {
        vec![
            executable.to_string_lossy().to_string(),
            // isolated mode: no user site, no PYTHON* env, no cwd on sys.path.
            // System site-packages stay importable.
            "-I".to_string(),
            "-B".to_string(),
            "-c".to_string(),
            HARNESS.to_string(),
        ]
    }
}
