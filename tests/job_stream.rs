//! Integration tests for the job stream adapters

use async_trait::async_trait;
use futures_util::StreamExt;
use scorebox::jobs::{
    stream_async_with_sink, stream_with_sink, wait_for_completion, wait_for_completion_async,
    AsyncJobResource, AsyncLineStream, DataRecord, JobResource, JobState, JobStatus, LineStream,
    MessageSink,
};
use scorebox::{Result, ScoreboxError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct FakeJob {
    messages: Vec<&'static str>,
    fail_messages: bool,
    endless_messages: bool,
    data: Option<Vec<&'static str>>,
    data_delay: Option<Duration>,
    data_read: Arc<AtomicUsize>,
    states: Mutex<Vec<JobState>>,
    messages_read: Arc<AtomicUsize>,
}

impl FakeJob {
    fn message_lines(&self) -> Vec<Result<Vec<u8>>> {
        let mut lines: Vec<Result<Vec<u8>>> = self
            .messages
            .iter()
            .map(|m| Ok(format!("{m}\n").into_bytes()))
            .collect();
        if self.fail_messages {
            lines.push(Err(ScoreboxError::Job("message channel reset".to_string())));
        }
        lines
    }

    fn data_lines(&self) -> Option<Vec<Result<Vec<u8>>>> {
        self.data
            .as_ref()
            .map(|d| d.iter().map(|l| Ok(l.as_bytes().to_vec())).collect())
    }

    fn next_status(&self, job_id: &str) -> JobStatus {
        let mut states = self.states.lock().unwrap();
        let state = if states.len() > 1 {
            states.remove(0)
        } else {
            states.first().copied().unwrap_or(JobState::Done)
        };
        JobStatus {
            job_id: job_id.to_string(),
            state,
            detailed_status: vec![],
        }
    }
}

impl JobResource for FakeJob {
    fn retrieve(&self, job_id: &str) -> Result<JobStatus> {
        Ok(self.next_status(job_id))
    }

    fn stream_messages(&self, _job_id: &str) -> Result<LineStream> {
        if self.endless_messages {
            let counter = Arc::clone(&self.messages_read);
            return Ok(Box::new(std::iter::repeat_with(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(1));
                Ok(b"tick\n".to_vec())
            })));
        }
        Ok(Box::new(self.message_lines().into_iter()))
    }

    fn stream_data(&self, _job_id: &str) -> Option<Result<LineStream>> {
        let lines = self.data_lines()?;
        let delay = self.data_delay;
        let counter = Arc::clone(&self.data_read);
        Some(Ok(Box::new(lines.into_iter().inspect(move |_| {
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            counter.fetch_add(1, Ordering::SeqCst);
        })) as LineStream))
    }
}

#[async_trait]
impl AsyncJobResource for FakeJob {
    async fn retrieve(&self, job_id: &str) -> Result<JobStatus> {
        Ok(self.next_status(job_id))
    }

    async fn stream_messages(&self, _job_id: &str) -> Result<AsyncLineStream> {
        Ok(futures_util::stream::iter(self.message_lines()).boxed())
    }

    async fn stream_data(&self, _job_id: &str) -> Option<Result<AsyncLineStream>> {
        self.data_lines()
            .map(|lines| Ok(futures_util::stream::iter(lines).boxed()))
    }
}

fn collecting_sink() -> (MessageSink, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: MessageSink = Arc::new(move |line: &str| {
        sink_seen.lock().unwrap().push(line.to_string());
    });
    (sink, seen)
}

fn data_job() -> FakeJob {
    FakeJob {
        messages: vec!["QUEUED", "RUNNING", "DONE"],
        data: Some(vec!["{\"input\": \"a\"}\n", "not json\n", "\n", "{\"input\": \"b\"}"]),
        ..FakeJob::default()
    }
}

fn expected_data() -> Vec<DataRecord> {
    vec![
        DataRecord::Json(json!({"input": "a"})),
        DataRecord::Raw("not json".to_string()),
        DataRecord::Json(json!({"input": "b"})),
    ]
}

#[test]
fn test_blocking_yields_data_and_forwards_messages() {
    let (sink, seen) = collecting_sink();
    let records: Vec<_> = stream_with_sink(Arc::new(data_job()), "job-1", sink)
        .collect::<Result<Vec<_>>>()
        .unwrap();

    assert_eq!(records, expected_data());
    assert_eq!(*seen.lock().unwrap(), vec!["QUEUED", "RUNNING", "DONE"]);
}

#[test]
fn test_blocking_without_data_channel() {
    let job = FakeJob {
        messages: vec!["DONE"],
        ..FakeJob::default()
    };
    let status = JobStatus {
        job_id: "job-2".to_string(),
        state: JobState::Queued,
        detailed_status: vec![],
    };
    let (sink, seen) = collecting_sink();
    let items: Vec<_> = stream_with_sink(Arc::new(job), &status, sink).collect();

    assert!(items.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec!["DONE"]);
}

#[test]
fn test_blocking_messages_error_propagates() {
    let job = FakeJob {
        fail_messages: true,
        ..data_job()
    };
    let (sink, _seen) = collecting_sink();
    let items: Vec<_> = stream_with_sink(Arc::new(job), "job-3", sink).collect();

    let last = items.last().expect("at least the error");
    assert!(matches!(last, Err(ScoreboxError::Job(msg)) if msg.contains("reset")));
    assert_eq!(items.iter().filter(|i| i.is_err()).count(), 1);
}

#[test]
fn test_blocking_messages_error_keeps_read_lines() {
    let job = FakeJob {
        fail_messages: true,
        data_delay: Some(Duration::from_millis(100)),
        ..data_job()
    };
    let read = Arc::clone(&job.data_read);
    let (sink, _seen) = collecting_sink();

    let started = Instant::now();
    let items: Vec<_> = stream_with_sink(Arc::new(job), "job-3b", sink).collect();
    let yielded = items.iter().filter(|i| i.is_ok()).count();

    assert!(matches!(items.last(), Some(Err(ScoreboxError::Job(_)))));
    assert!(yielded <= 1, "{items:?}");
    assert_eq!(read.load(Ordering::SeqCst), yielded);
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[test]
fn test_blocking_drop_stops_message_worker() {
    let job = FakeJob {
        endless_messages: true,
        data: Some(vec!["{}"]),
        ..FakeJob::default()
    };
    let counter = Arc::clone(&job.messages_read);
    let (sink, _seen) = collecting_sink();

    let mut records = stream_with_sink(Arc::new(job), "job-4", sink);
    assert_eq!(records.next().unwrap().unwrap(), DataRecord::Json(json!({})));
    drop(records);

    std::thread::sleep(Duration::from_millis(50));
    let settled = counter.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(counter.load(Ordering::SeqCst), settled);
}

#[test]
fn test_wait_for_completion() {
    let job = FakeJob {
        states: Mutex::new(vec![JobState::Queued, JobState::Running, JobState::Done]),
        ..FakeJob::default()
    };
    let status = wait_for_completion(&job, "job-5", Duration::from_millis(1), Duration::from_secs(5))
        .unwrap();
    assert_eq!(status.state, JobState::Done);
    assert_eq!(status.job_id, "job-5");
}

#[test]
fn test_wait_for_completion_timeout() {
    let job = FakeJob {
        states: Mutex::new(vec![JobState::Running]),
        ..FakeJob::default()
    };
    let err = wait_for_completion(&job, "job-6", Duration::from_millis(1), Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, ScoreboxError::Job(_)));
}

#[tokio::test]
async fn test_async_yields_data_and_forwards_messages() {
    let (sink, seen) = collecting_sink();
    let records: Vec<_> = stream_async_with_sink(Arc::new(data_job()), "job-7", sink)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()
        .unwrap();

    assert_eq!(records, expected_data());
    assert_eq!(*seen.lock().unwrap(), vec!["QUEUED", "RUNNING", "DONE"]);
}

#[tokio::test]
async fn test_async_without_data_channel() {
    let job = FakeJob {
        messages: vec!["DONE"],
        ..FakeJob::default()
    };
    let (sink, seen) = collecting_sink();
    let items: Vec<_> = stream_async_with_sink(Arc::new(job), "job-8", sink)
        .collect()
        .await;

    assert!(items.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec!["DONE"]);
}

#[tokio::test]
async fn test_async_messages_error_propagates() {
    let job = FakeJob {
        fail_messages: true,
        ..data_job()
    };
    let (sink, _seen) = collecting_sink();
    let items: Vec<_> = stream_async_with_sink(Arc::new(job), "job-9", sink)
        .collect()
        .await;

    let last = items.last().expect("at least the error");
    assert!(matches!(last, Err(ScoreboxError::Job(msg)) if msg.contains("reset")));
    assert_eq!(items.iter().filter(|i| i.is_err()).count(), 1);
}

#[tokio::test]
async fn test_async_early_drop() {
    let (sink, _seen) = collecting_sink();
    let records = stream_async_with_sink(Arc::new(data_job()), "job-10", sink);
    tokio::pin!(records);
    let first = records.next().await.unwrap().unwrap();
    assert!(matches!(first, DataRecord::Json(_)));
}

#[tokio::test]
async fn test_wait_for_completion_async() {
    let job = FakeJob {
        states: Mutex::new(vec![JobState::Running, JobState::Error]),
        ..FakeJob::default()
    };
    let status =
        wait_for_completion_async(&job, "job-11", Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();
    assert_eq!(status.state, JobState::Error);
}
