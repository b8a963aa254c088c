//! Job stream adapters.
//!
//! A remote job exposes two line channels: "messages" (progress text, handed
//! to a sink and never yielded) and optionally "data" (JSON records, yielded).
//! [`blocking::stream`] drains messages on a worker thread;
//! [`cooperative::stream_async`] polls both channels within one task.

pub mod blocking;
pub mod cooperative;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub use blocking::{stream, stream_with_sink, wait_for_completion, JobResource, JobStream, LineStream};
pub use cooperative::{
    stream_async, stream_async_with_sink, wait_for_completion_async, AsyncJobResource,
    AsyncLineStream,
};

/// Default polling cadence for `wait_for_completion*`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobState {
    /// Anything other than queued or running is final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Queued | JobState::Running)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    #[serde(default)]
    pub detailed_status: Vec<String>,
}

/// Anything that names a job: a bare id or a status record.
pub trait JobIdentity {
    fn job_id(&self) -> &str;
}

impl JobIdentity for str {
    fn job_id(&self) -> &str {
        self
    }
}

impl JobIdentity for String {
    fn job_id(&self) -> &str {
        self
    }
}

impl JobIdentity for JobStatus {
    fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// One item from the data channel.
#[derive(Clone, Debug, PartialEq)]
pub enum DataRecord {
    Json(Value),
    /// Line that was not valid JSON, passed through as text.
    Raw(String),
}

impl DataRecord {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            DataRecord::Json(value) => Some(value),
            DataRecord::Raw(_) => None,
        }
    }
}

/// Receives each message-channel line.
pub type MessageSink = Arc<dyn Fn(&str) + Send + Sync>;

pub fn stdout_sink() -> MessageSink {
    Arc::new(|line| println!("{line}"))
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub(crate) fn message_text(line: &[u8]) -> String {
    String::from_utf8_lossy(strip_line_ending(line)).into_owned()
}

/// `None` for blank lines.
pub(crate) fn decode_data_line(line: &[u8]) -> Option<DataRecord> {
    let line = strip_line_ending(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(match serde_json::from_slice::<Value>(line) {
        Ok(value) => DataRecord::Json(value),
        Err(_) => DataRecord::Raw(String::from_utf8_lossy(line).into_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(JobState::Unknown.is_terminal());
    }

    #[test]
    fn test_job_status_wire_form() {
        let status: JobStatus =
            serde_json::from_value(json!({"job_id": "j1", "state": "QUEUED"})).unwrap();
        assert_eq!(status.state, JobState::Queued);
        assert!(status.detailed_status.is_empty());

        let status: JobStatus =
            serde_json::from_value(json!({"job_id": "j1", "state": "PAUSED"})).unwrap();
        assert_eq!(status.state, JobState::Unknown);
        assert!(status.state.is_terminal());
    }

    #[test]
    fn test_job_identity() {
        let status = JobStatus {
            job_id: "abc".to_string(),
            state: JobState::Done,
            detailed_status: vec![],
        };
        assert_eq!(status.job_id(), "abc");
        assert_eq!("abc".job_id(), "abc");
        assert_eq!("abc".to_string().job_id(), "abc");
    }

    #[test]
    fn test_decode_data_line() {
        assert_eq!(
            decode_data_line(b"{\"a\": 1}\n"),
            Some(DataRecord::Json(json!({"a": 1})))
        );
        assert_eq!(
            decode_data_line(b"not json\r\n"),
            Some(DataRecord::Raw("not json".to_string()))
        );
        assert_eq!(decode_data_line(b"  \n"), None);
        assert_eq!(decode_data_line(b""), None);
    }

    #[test]
    fn test_message_text_strips_newline() {
        assert_eq!(message_text(b"DONE\r\n"), "DONE");
        assert_eq!(message_text(b"step 1"), "step 1");
    }
}
