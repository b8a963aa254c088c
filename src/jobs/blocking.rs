use crate::config::types::{Result, ScoreboxError};
use crate::jobs::{
    decode_data_line, message_text, stdout_sink, DataRecord, JobIdentity, JobStatus, MessageSink,
};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Lines of one channel, newline optional.
pub type LineStream = Box<dyn Iterator<Item = Result<Vec<u8>>> + Send>;

/// Blocking view of a remote job resource.
pub trait JobResource: Send + Sync + 'static {
    fn retrieve(&self, job_id: &str) -> Result<JobStatus>;

    fn stream_messages(&self, job_id: &str) -> Result<LineStream>;

    /// `None` for job kinds without a data channel.
    fn stream_data(&self, _job_id: &str) -> Option<Result<LineStream>> {
        None
    }
}

/// Data records of one job, with messages drained in the background.
///
/// Ends only once both channels are exhausted. A messages failure is yielded
/// as the next item and ends the sequence; lines already read from the data
/// channel are yielded first. The failure is noticed between data lines, so
/// its latency is bounded by the data channel's line cadence. Dropping the
/// stream stops the messages worker at its next line.
pub struct JobStream {
    data: Option<LineStream>,
    pending_error: Option<ScoreboxError>,
    messages: Option<Receiver<Result<()>>>,
    cancel: Arc<AtomicBool>,
    finished: bool,
}

pub fn stream<R, J>(resource: Arc<R>, job: &J) -> JobStream
where
    R: JobResource + ?Sized,
    J: JobIdentity + ?Sized,
{
    stream_with_sink(resource, job, stdout_sink())
}

pub fn stream_with_sink<R, J>(resource: Arc<R>, job: &J, sink: MessageSink) -> JobStream
where
    R: JobResource + ?Sized,
    J: JobIdentity + ?Sized,
{
    let job_id = job.job_id().to_string();
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded(1);

    {
        let resource = Arc::clone(&resource);
        let job_id = job_id.clone();
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            let result = drain_messages(&*resource, &job_id, &sink, &cancel);
            if let Err(e) = &result {
                log::debug!("Message channel for job {} failed: {}", job_id, e);
            }
            let _ = tx.send(result);
        });
    }

    let (data, pending_error) = match resource.stream_data(&job_id) {
        Some(Ok(lines)) => (Some(lines), None),
        Some(Err(e)) => (None, Some(e)),
        None => {
            log::debug!("Job {} has no data channel", job_id);
            (None, None)
        }
    };

    JobStream {
        data,
        pending_error,
        messages: Some(rx),
        cancel,
        finished: false,
    }
}

fn drain_messages<R: JobResource + ?Sized>(
    resource: &R,
    job_id: &str,
    sink: &MessageSink,
    cancel: &AtomicBool,
) -> Result<()> {
    for line in resource.stream_messages(job_id)? {
        if cancel.load(Ordering::Relaxed) {
            log::debug!("Message channel for job {} cancelled", job_id);
            return Ok(());
        }
        sink(&message_text(&line?));
    }
    Ok(())
}

fn worker_lost() -> ScoreboxError {
    ScoreboxError::Job("message worker exited without reporting".to_string())
}

impl JobStream {
    /// Non-blocking check for a finished messages worker.
    fn poll_messages(&mut self) -> Result<()> {
        let Some(rx) = &self.messages else {
            return Ok(());
        };
        match rx.try_recv() {
            Err(TryRecvError::Empty) => Ok(()),
            Ok(result) => {
                self.messages = None;
                result
            }
            Err(TryRecvError::Disconnected) => {
                self.messages = None;
                Err(worker_lost())
            }
        }
    }

    fn wait_messages(&mut self) -> Result<()> {
        match self.messages.take() {
            Some(rx) => rx.recv().unwrap_or_else(|_| Err(worker_lost())),
            None => Ok(()),
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.cancel.store(true, Ordering::Relaxed);
        self.data = None;
        self.messages = None;
    }
}

impl Iterator for JobStream {
    type Item = Result<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(e) = self.pending_error.take() {
            self.finish();
            return Some(Err(e));
        }

        while self.data.is_some() {
            if let Err(e) = self.poll_messages() {
                self.finish();
                return Some(Err(e));
            }
            let line = self.data.as_mut().and_then(|data| data.next());
            match line {
                Some(Ok(line)) => {
                    if let Some(record) = decode_data_line(&line) {
                        return Some(Ok(record));
                    }
                }
                Some(Err(e)) => {
                    self.finish();
                    return Some(Err(e));
                }
                None => self.data = None,
            }
        }

        let result = self.wait_messages();
        self.finish();
        result.err().map(Err)
    }
}

impl Drop for JobStream {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Poll `retrieve` until the job reaches a terminal state.
pub fn wait_for_completion<R, J>(
    resource: &R,
    job: &J,
    interval: Duration,
    timeout: Duration,
) -> Result<JobStatus>
where
    R: JobResource + ?Sized,
    J: JobIdentity + ?Sized,
{
    let started = Instant::now();
    loop {
        let status = resource.retrieve(job.job_id())?;
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
        thread::sleep(interval);
    }
}
