use crate::config::types::{Result, ScoreboxError};
use crate::jobs::{
    decode_data_line, message_text, stdout_sink, DataRecord, JobIdentity, JobStatus, MessageSink,
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub type AsyncLineStream = BoxStream<'static, Result<Vec<u8>>>;

/// Async view of a remote job resource.
#[async_trait]
pub trait AsyncJobResource: Send + Sync + 'static {
    async fn retrieve(&self, job_id: &str) -> Result<JobStatus>;

    async fn stream_messages(&self, job_id: &str) -> Result<AsyncLineStream>;

    /// `None` for job kinds without a data channel.
    async fn stream_data(&self, _job_id: &str) -> Option<Result<AsyncLineStream>> {
        None
    }
}

enum Step {
    Message(Option<Result<Vec<u8>>>),
    Data(Option<Result<Vec<u8>>>),
}

pub fn stream_async<R, J>(
    resource: Arc<R>,
    job: &J,
) -> impl Stream<Item = Result<DataRecord>> + Send + 'static
where
    R: AsyncJobResource + ?Sized,
    J: JobIdentity + ?Sized,
{
    stream_async_with_sink(resource, job, stdout_sink())
}

/// Both channels are polled from the consuming task; dropping the stream
/// drops both.
pub fn stream_async_with_sink<R, J>(
    resource: Arc<R>,
    job: &J,
    sink: MessageSink,
) -> impl Stream<Item = Result<DataRecord>> + Send + 'static
where
    R: AsyncJobResource + ?Sized,
    J: JobIdentity + ?Sized,
{
    let job_id = job.job_id().to_string();
    try_stream! {
        let mut messages = resource.stream_messages(&job_id).await?;
        let mut data = match resource.stream_data(&job_id).await {
            Some(opened) => Some(opened?),
            None => {
                log::debug!("Job {} has no data channel", job_id);
                None
            }
        };
        let mut messages_done = false;

        loop {
            let step = match data.as_mut() {
                Some(lines) if !messages_done => tokio::select! {
                    line = messages.next() => Step::Message(line),
                    line = lines.next() => Step::Data(line),
                },
                Some(lines) => Step::Data(lines.next().await),
                None if !messages_done => Step::Message(messages.next().await),
                None => break,
            };

            match step {
                Step::Message(Some(line)) => sink(&message_text(&line?)),
                Step::Message(None) => messages_done = true,
                Step::Data(Some(line)) => {
                    if let Some(record) = decode_data_line(&line?) {
                        yield record;
                    }
                }
                Step::Data(None) => data = None,
            }
        }
    }
}

/// Poll `retrieve` until the job reaches a terminal state.
pub async fn wait_for_completion_async<R, J>(
    resource: &R,
    job: &J,
    interval: Duration,
    timeout: Duration,
) -> Result<JobStatus>
where
    R: AsyncJobResource + ?Sized,
    J: JobIdentity + ?Sized,
{
    let started = Instant::now();
    loop {
        let status = resource.retrieve(job.job_id()).await?;
        if status.state.is_terminal() {
            log::info!("Job {} finished: {:?}", status.job_id, status.state);
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            return Err(ScoreboxError::Job(format!(
                "job {} still {:?} after {:?}",
                status.job_id, status.state, timeout
            )));
        }
        tokio::time::sleep(interval).await;
    }
}
