/// Bounded output collection for probe workers
///
/// Each stream is drained on its own thread so the worker can never block on a
/// full pipe. Bytes past the per-stream limit are read and discarded.
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

/// Output integrity classification
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputIntegrity {
    #[default]
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "truncated_by_limit")]
    TruncatedByLimit,
    #[serde(rename = "read_error")]
    ReadError,
    #[serde(rename = "collection_timed_out")]
    CollectionTimedOut,
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByLimit => write!(f, "truncated_by_limit"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
            OutputIntegrity::CollectionTimedOut => write!(f, "collection_timed_out"),
        }
    }
}

/// Output limits configuration
#[derive(Debug, Clone)]
pub struct OutputLimits {
    /// Per-stream stdout limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr limit (bytes)
    pub stderr_limit: usize,
    /// How long `finish` waits for the collectors
    pub collection_timeout: Duration,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 1024 * 1024,
            stderr_limit: 256 * 1024,
            collection_timeout: Duration::from_secs(2),
        }
    }
}

/// Output collection result
#[derive(Debug, Clone, Default)]
pub struct OutputResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
}

type Collected = (Vec<u8>, OutputIntegrity);

/// Output collector with bounded collection
pub struct OutputCollector {
    limits: OutputLimits,
}

/// Collectors started by [`OutputCollector::start`], not yet joined.
pub struct PendingOutput {
    stdout_rx: Option<Receiver<Collected>>,
    stderr_rx: Option<Receiver<Collected>>,
    timeout: Duration,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        OutputCollector { limits }
    }

    /// Start draining both streams in the background.
    pub fn start<O, E>(&self, stdout: Option<O>, stderr: Option<E>) -> PendingOutput
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        PendingOutput {
            stdout_rx: stdout.map(|s| spawn_collector(s, self.limits.stdout_limit)),
            stderr_rx: stderr.map(|s| spawn_collector(s, self.limits.stderr_limit)),
            timeout: self.limits.collection_timeout,
        }
    }
}

impl PendingOutput {
    /// Wait for both collectors, sharing one deadline. A collector still
    /// blocked at the deadline (a descendant kept the pipe open) is abandoned.
    pub fn finish(self) -> OutputResult {
        let deadline = Instant::now() + self.timeout;
        let (stdout, stdout_integrity) = receive(self.stdout_rx, deadline);
        let (stderr, stderr_integrity) = receive(self.stderr_rx, deadline);

        OutputResult {
            stdout,
            stderr,
            stdout_integrity,
            stderr_integrity,
        }
    }
}

fn receive(rx: Option<Receiver<Collected>>, deadline: Instant) -> Collected {
    let Some(rx) = rx else {
        return (Vec::new(), OutputIntegrity::Complete);
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(collected) => collected,
        Err(RecvTimeoutError::Timeout) => (Vec::new(), OutputIntegrity::CollectionTimedOut),
        Err(RecvTimeoutError::Disconnected) => (Vec::new(), OutputIntegrity::ReadError),
    }
}

fn spawn_collector<R: Read + Send + 'static>(stream: R, limit: usize) -> Receiver<Collected> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || collect_stream(stream, limit, tx));
    rx
}

/// Collect from a single stream with limit
fn collect_stream<R: Read>(mut stream: R, limit: usize, tx: Sender<Collected>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(buffer.len());
                if n > room {
                    buffer.extend_from_slice(&chunk[..room]);
                    integrity = OutputIntegrity::TruncatedByLimit;
                } else {
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => {
                integrity = OutputIntegrity::ReadError;
                break;
            }
        }
    }

    let _ = tx.send((buffer, integrity));
}
