//! Verdict classification for probe runs.
//!
//! The worker's stdout is the only evidence. A verdict is never guessed from
//! symptoms: no terminal report means the run failed.

use crate::config::types::ValidatorConfig;
use crate::contract::worker::WorkerOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use thiserror::Error;

const MAX_CAPTURED_CHARS: usize = 200;
const MAX_STDERR_TAIL: usize = 500;

/// Type a result key was required to have.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedType {
    Float,
    Str,
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedType::Float => write!(f, "float"),
            ExpectedType::Str => write!(f, "str"),
        }
    }
}

/// Why a scoring function was rejected. Variants up to `MissingOrWrongTypeKey`
/// follow the contract check order; the last two come from the worker itself.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("code is not valid Python: {message}")]
    SyntaxError { message: String },

    #[error("code did not define a score() function")]
    MissingScoreFunction,

    #[error("score is not a callable object (found {found})")]
    NotCallable { found: String },

    #[error("score() does not accept a {0} parameter")]
    MissingParameter(String),

    #[error("score() does not accept a **kwargs parameter")]
    MissingVariadicKeywordParameter,

    #[error("score() printed to stdout, which is not allowed (captured {captured:?})")]
    UnexpectedStdout { captured: String },

    #[error("score() did not return a mapping (found {found})")]
    NotAMapping { found: String },

    #[error("score() did not return a mapping with a '{key}' key of {expected} type")]
    MissingOrWrongTypeKey { key: String, expected: ExpectedType },

    #[error("score() returned a score outside the range [0, 1]: {value}")]
    ScoreOutOfRange { value: String },

    #[error("scoring code failed to run: {message}")]
    ExecutionFailed { message: String },

    #[error("validation exceeded the {limit_ms}ms limit")]
    TimedOut { limit_ms: u64 },
}

impl ContractViolation {
    /// Stable snake_case identifier, used by the CLI's JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            ContractViolation::SyntaxError { .. } => "syntax_error",
            ContractViolation::MissingScoreFunction => "missing_score_function",
            ContractViolation::NotCallable { .. } => "not_callable",
            ContractViolation::MissingParameter(_) => "missing_parameter",
            ContractViolation::MissingVariadicKeywordParameter => {
                "missing_variadic_keyword_parameter"
            }
            ContractViolation::UnexpectedStdout { .. } => "unexpected_stdout",
            ContractViolation::NotAMapping { .. } => "not_a_mapping",
            ContractViolation::MissingOrWrongTypeKey { .. } => "missing_or_wrong_type_key",
            ContractViolation::ScoreOutOfRange { .. } => "score_out_of_range",
            ContractViolation::ExecutionFailed { .. } => "execution_failed",
            ContractViolation::TimedOut { .. } => "timed_out",
        }
    }
}

/// Terminal report written by the harness.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ProbeReport {
    Passed,
    SyntaxError {
        message: String,
    },
    MissingScoreFunction,
    NotCallable {
        found: String,
    },
    MissingParameter {
        parameter: String,
    },
    MissingVariadicKeywordParameter,
    NotAMapping {
        found: String,
    },
    MissingOrWrongTypeKey {
        key: String,
        expected: ExpectedType,
        #[serde(default)]
        found: Option<String>,
    },
    ScoreOutOfRange {
        value: String,
    },
    ExecutionFailed {
        message: String,
    },
}

impl ProbeReport {
    /// Reports that can only follow a completed `score()` call.
    fn follows_call(&self) -> bool {
        matches!(
            self,
            ProbeReport::Passed
                | ProbeReport::NotAMapping { .. }
                | ProbeReport::MissingOrWrongTypeKey { .. }
                | ProbeReport::ScoreOutOfRange { .. }
        )
    }

    fn into_violation(self) -> Option<ContractViolation> {
        let violation = match self {
            ProbeReport::Passed => return None,
            ProbeReport::SyntaxError { message } => ContractViolation::SyntaxError { message },
            ProbeReport::MissingScoreFunction => ContractViolation::MissingScoreFunction,
            ProbeReport::NotCallable { found } => ContractViolation::NotCallable { found },
            ProbeReport::MissingParameter { parameter } => {
                ContractViolation::MissingParameter(parameter)
            }
            ProbeReport::MissingVariadicKeywordParameter => {
                ContractViolation::MissingVariadicKeywordParameter
            }
            ProbeReport::NotAMapping { found } => ContractViolation::NotAMapping { found },
            ProbeReport::MissingOrWrongTypeKey { key, expected, .. } => {
                ContractViolation::MissingOrWrongTypeKey { key, expected }
            }
            ProbeReport::ScoreOutOfRange { value } => ContractViolation::ScoreOutOfRange { value },
            ProbeReport::ExecutionFailed { message } => {
                ContractViolation::ExecutionFailed { message }
            }
        };
        Some(violation)
    }
}

/// What the parent recovered from the worker's stdout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbeTranscript {
    /// Bytes written between the call markers; `None` if the call never started.
    pub call_output: Option<Vec<u8>>,
    /// The terminal report, if one was written and parsed.
    pub report: Option<ProbeReport>,
    /// Report lines seen for this nonce. The harness writes exactly one.
    pub report_count: usize,
    /// The last report line comes after the `end-call` marker.
    pub report_after_call: bool,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Extract the call output and terminal report for one nonce.
pub fn parse_transcript(stdout: &[u8], nonce: &str) -> ProbeTranscript {
    let begin = format!("{nonce}:begin-call\n");
    let end = format!("{nonce}:end-call\n");
    let report = format!("{nonce}:report:");

    let mut call_end = None;
    let call_output = find(stdout, begin.as_bytes()).map(|pos| {
        let start = pos + begin.len();
        let rest = &stdout[start..];
        let stop = find(rest, end.as_bytes());
        call_end = stop.map(|stop| start + stop + end.len());
        rest[..stop.unwrap_or(rest.len())].to_vec()
    });

    let report_count = stdout
        .windows(report.len())
        .filter(|w| *w == report.as_bytes())
        .count();
    let report_pos = rfind(stdout, report.as_bytes());
    let report_after_call =
        matches!((report_pos, call_end), (Some(pos), Some(call_end)) if pos >= call_end);

    let report = report_pos.and_then(|pos| {
        let rest = &stdout[pos + report.len()..];
        let line = match rest.iter().position(|b| *b == b'\n') {
            Some(newline) => &rest[..newline],
            None => rest,
        };
        match serde_json::from_slice::<ProbeReport>(line) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("Unreadable probe report: {}", e);
                None
            }
        }
    });

    ProbeTranscript {
        call_output,
        report,
        report_count,
        report_after_call,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(MAX_STDERR_TAIL);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}

fn describe_exit(outcome: &WorkerOutcome) -> String {
    let status = match outcome.exit_status {
        Some(status) => match (status.code(), status.signal()) {
            (Some(code), _) => format!("exit code {code}"),
            (None, Some(sig)) => format!("signal {sig}"),
            _ => "unknown status".to_string(),
        },
        None => "no exit status".to_string(),
    };
    let tail = stderr_tail(&outcome.output.stderr);
    if tail.is_empty() {
        status
    } else {
        format!("{status}; stderr: {tail}")
    }
}

/// Classify a finished probe run. First failure wins, in contract order.
pub fn classify(
    outcome: &WorkerOutcome,
    transcript: ProbeTranscript,
    config: &ValidatorConfig,
) -> std::result::Result<(), ContractViolation> {
    if outcome.timed_out {
        return Err(ContractViolation::TimedOut {
            limit_ms: config.wall_time_limit.as_millis() as u64,
        });
    }

    let cpu_exhausted = outcome
        .exit_status
        .and_then(|status| status.signal())
        .is_some_and(|sig| sig == libc::SIGXCPU);
    if cpu_exhausted && transcript.report.is_none() {
        return Err(ContractViolation::TimedOut {
            limit_ms: config
                .cpu_time_limit
                .unwrap_or(config.wall_time_limit)
                .as_millis() as u64,
        });
    }

    if let Some(captured) = transcript.call_output.as_deref() {
        if !captured.is_empty() {
            let captured = String::from_utf8_lossy(captured);
            return Err(ContractViolation::UnexpectedStdout {
                captured: truncate_chars(&captured, MAX_CAPTURED_CHARS),
            });
        }
    }

    if transcript.report_count > 1 {
        return Err(ContractViolation::ExecutionFailed {
            message: format!(
                "worker wrote {} reports; the scoring code tampered with the probe protocol",
                transcript.report_count
            ),
        });
    }

    match transcript.report {
        Some(report) if report.follows_call() && !transcript.report_after_call => {
            Err(ContractViolation::ExecutionFailed {
                message: "worker reported a call result before score() returned".to_string(),
            })
        }
        Some(report) => match report.into_violation() {
            Some(violation) => Err(violation),
            None if outcome.exit_status.is_some_and(|s| s.success()) => Ok(()),
            None => Err(ContractViolation::ExecutionFailed {
                message: format!(
                    "worker reported success but did not exit cleanly ({})",
                    describe_exit(outcome)
                ),
            }),
        },
        None => Err(ContractViolation::ExecutionFailed {
            message: format!(
                "worker exited without reporting a result ({})",
                describe_exit(outcome)
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::output::OutputResult;
    use std::process::ExitStatus;
    use std::time::Duration;

    fn outcome(raw_status: i32, stdout: &[u8]) -> WorkerOutcome {
        WorkerOutcome {
            exit_status: Some(ExitStatus::from_raw(raw_status)),
            timed_out: false,
            wall_time: Duration::from_millis(5),
            output: OutputResult {
                stdout: stdout.to_vec(),
                ..OutputResult::default()
            },
        }
    }

    fn run(raw_status: i32, stdout: &[u8]) -> std::result::Result<(), ContractViolation> {
        let outcome = outcome(raw_status, stdout);
        let transcript = parse_transcript(&outcome.output.stdout, "n0nce");
        classify(&outcome, transcript, &ValidatorConfig::default())
    }

    #[test]
    fn test_passed_report_with_clean_exit() {
        let stdout = b"n0nce:begin-call\nn0nce:end-call\nn0nce:report:{\"check\": \"passed\"}\n";
        assert_eq!(run(0, stdout), Ok(()));
    }

    #[test]
    fn test_output_between_markers_is_unexpected_stdout() {
        let stdout = b"n0nce:begin-call\nhello\nn0nce:end-call\nn0nce:report:{\"check\": \"passed\"}\n";
        assert_eq!(
            run(0, stdout),
            Err(ContractViolation::UnexpectedStdout {
                captured: "hello\n".to_string()
            })
        );
    }

    #[test]
    fn test_unterminated_print_before_end_marker() {
        let stdout = b"n0nce:begin-call\nhin0nce:end-call\nn0nce:report:{\"check\": \"passed\"}\n";
        assert!(matches!(
            run(0, stdout),
            Err(ContractViolation::UnexpectedStdout { .. })
        ));
    }

    #[test]
    fn test_output_at_load_time_is_ignored() {
        let stdout = b"loading\nn0nce:begin-call\nn0nce:end-call\nn0nce:report:{\"check\": \"passed\"}\n";
        assert_eq!(run(0, stdout), Ok(()));
    }

    #[test]
    fn test_stdout_check_precedes_result_checks() {
        let stdout = b"n0nce:begin-call\nnoise\nn0nce:end-call\nn0nce:report:{\"check\": \"not_a_mapping\", \"found\": \"float\"}\n";
        assert!(matches!(
            run(0, stdout),
            Err(ContractViolation::UnexpectedStdout { .. })
        ));
    }

    #[test]
    fn test_foreign_nonce_is_ignored() {
        let stdout = b"other:report:{\"check\": \"passed\"}\n";
        assert!(matches!(
            run(0, stdout),
            Err(ContractViolation::ExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_report_maps_to_violation() {
        let stdout = b"n0nce:begin-call\nn0nce:end-call\nn0nce:report:{\"check\": \"missing_or_wrong_type_key\", \"key\": \"score\", \"expected\": \"float\", \"found\": \"str\"}\n";
        assert_eq!(
            run(0, stdout),
            Err(ContractViolation::MissingOrWrongTypeKey {
                key: "score".to_string(),
                expected: ExpectedType::Float,
            })
        );

        let stdout = b"n0nce:report:{\"check\": \"missing_parameter\", \"parameter\": \"input_text\"}\n";
        assert_eq!(
            run(0, stdout),
            Err(ContractViolation::MissingParameter("input_text".to_string()))
        );
    }

    #[test]
    fn test_passed_report_without_call_is_rejected() {
        let stdout = b"n0nce:report:{\"check\": \"passed\"}\n";
        let transcript = parse_transcript(stdout, "n0nce");
        assert_eq!(transcript.report, Some(ProbeReport::Passed));
        assert!(!transcript.report_after_call);
        assert!(matches!(
            run(0, stdout),
            Err(ContractViolation::ExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_result_report_inside_call_is_rejected() {
        let stdout = b"n0nce:begin-call\nn0nce:report:{\"check\": \"passed\"}\n";
        assert!(matches!(
            run(0, stdout),
            Err(ContractViolation::ExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_load_time_report_needs_no_call() {
        let stdout = b"n0nce:report:{\"check\": \"missing_score_function\"}\n";
        assert_eq!(run(0, stdout), Err(ContractViolation::MissingScoreFunction));
    }

    #[test]
    fn test_extra_report_is_rejected() {
        let stdout = b"n0nce:report:{\"check\": \"syntax_error\", \"message\": \"x\"}\nn0nce:begin-call\nn0nce:end-call\nn0nce:report:{\"check\": \"passed\"}\n";
        let transcript = parse_transcript(stdout, "n0nce");
        assert_eq!(transcript.report_count, 2);
        match run(0, stdout) {
            Err(ContractViolation::ExecutionFailed { message }) => {
                assert!(message.contains("2 reports"), "{message}");
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_missing_report_is_execution_failure() {
        // raw wait status 1 << 8 == exit code 1
        let err = run(1 << 8, b"").unwrap_err();
        match err {
            ContractViolation::ExecutionFailed { message } => {
                assert!(message.contains("exit code 1"), "{message}");
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_passed_report_with_dirty_exit_fails() {
        let stdout = b"n0nce:begin-call\nn0nce:end-call\nn0nce:report:{\"check\": \"passed\"}\n";
        assert!(matches!(
            run(libc::SIGKILL, stdout),
            Err(ContractViolation::ExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_sigxcpu_without_report_is_timeout() {
        assert!(matches!(
            run(libc::SIGXCPU, b""),
            Err(ContractViolation::TimedOut { limit_ms: 10_000 })
        ));
    }

    #[test]
    fn test_wall_timeout_wins() {
        let mut outcome = outcome(libc::SIGKILL, b"n0nce:begin-call\nspam");
        outcome.timed_out = true;
        let transcript = parse_transcript(&outcome.output.stdout, "n0nce");
        assert_eq!(
            classify(&outcome, transcript, &ValidatorConfig::default()),
            Err(ContractViolation::TimedOut { limit_ms: 10_000 })
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ContractViolation::MissingScoreFunction.kind(), "missing_score_function");
        assert_eq!(
            ContractViolation::MissingVariadicKeywordParameter.kind(),
            "missing_variadic_keyword_parameter"
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
    }
}
