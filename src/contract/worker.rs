/// Probe worker lifecycle
///
/// One worker per validation: spawn in its own process group with a scrubbed
/// environment and rlimits, feed the code on stdin, poll against the wall
/// limit, and always reap before returning.
use crate::config::types::{Result, ScoreboxError, ValidatorConfig};
use crate::utils::env_hygiene::EnvHygiene;
use crate::utils::output::{OutputCollector, OutputLimits, OutputResult};
use nix::errno::Errno;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything observed about one finished worker.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub exit_status: Option<ExitStatus>,
    pub timed_out: bool,
    pub output: OutputResult,
    pub wall_time: Duration,
}

#[derive(Clone, Copy)]
struct Limits {
    cpu_secs: Option<u64>,
    memory_bytes: Option<u64>,
}

/// Lower soft and hard limits, never above the current hard limit.
fn clamp_rlimit(resource: Resource, soft: u64, hard: u64) -> nix::Result<()> {
    let (_, current_hard) = getrlimit(resource)?;
    setrlimit(resource, soft.min(current_hard), hard.min(current_hard))
}

fn apply_limits(limits: Limits) -> std::io::Result<()> {
    let to_io = |e: Errno| std::io::Error::from_raw_os_error(e as i32);

    clamp_rlimit(Resource::RLIMIT_CORE, 0, 0).map_err(to_io)?;
    if let Some(secs) = limits.cpu_secs {
        clamp_rlimit(Resource::RLIMIT_CPU, secs, secs + 1).map_err(to_io)?;
    }
    if let Some(bytes) = limits.memory_bytes {
        clamp_rlimit(Resource::RLIMIT_AS, bytes, bytes).map_err(to_io)?;
    }
    Ok(())
}

fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("killpg({}) failed: {}", pgid, e),
    }
}

/// Join the stdin feeder. A feeder still blocked after `timeout` (a process
/// that left the group kept the pipe open) is abandoned.
fn join_feeder(feeder: Option<JoinHandle<()>>, pgid: Pid, timeout: Duration) {
    let Some(handle) = feeder else {
        return;
    };
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::warn!("Worker {} stdin feeder still blocked, abandoning", pgid);
            return;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    if handle.join().is_err() {
        log::warn!("Worker {} stdin feeder panicked", pgid);
    }
}

/// Run one probe worker to completion.
pub fn run_worker(
    config: &ValidatorConfig,
    argv: &[String],
    stdin_data: &[u8],
) -> Result<WorkerOutcome> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ScoreboxError::Process("empty worker command".to_string()))?;

    let limits = Limits {
        cpu_secs: config.cpu_time_limit.map(|d| d.as_secs().max(1)),
        memory_bytes: config.memory_limit,
    };

    let env = EnvHygiene::new(config.env_policy.clone()).sanitize_environment(&config.environment);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(std::env::temp_dir())
        .env_clear()
        .envs(env)
        .process_group(0);

    // Only async-signal-safe calls between fork and exec.
    unsafe {
        cmd.pre_exec(move || apply_limits(limits));
    }

    let started = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| ScoreboxError::Process(format!("failed to start worker: {}", e)))?;
    let pgid = Pid::from_raw(child.id() as i32);
    log::debug!("Worker {} started", pgid);

    let pending = OutputCollector::new(OutputLimits {
        stdout_limit: config.output_limit,
        stderr_limit: config.output_limit,
        collection_timeout: config.collection_timeout,
    })
    .start(child.stdout.take(), child.stderr.take());

    // Fed from a thread so a worker that never reads cannot stall the wall clock.
    let feeder = child.stdin.take().map(|mut stdin| {
        let data = stdin_data.to_vec();
        std::thread::spawn(move || {
            if let Err(e) = stdin.write_all(&data) {
                log::debug!("Worker {} stdin closed early: {}", pgid, e);
            }
        })
    });

    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if started.elapsed() > config.wall_time_limit {
                    timed_out = true;
                    kill_group(pgid);
                    break child.wait().ok();
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                kill_group(pgid);
                let _ = child.wait();
                let _ = pending.finish();
                join_feeder(feeder, pgid, config.collection_timeout);
                return Err(ScoreboxError::Process(format!("wait(worker): {}", e)));
            }
        }
    };

    // Descendants that outlived the worker still hold the pipes.
    kill_group(pgid);
    let output = pending.finish();
    join_feeder(feeder, pgid, config.collection_timeout);
    let wall_time = started.elapsed();

    log::debug!(
        "Worker {} finished: status={:?} timed_out={} wall={:?} stdout={} stderr={}",
        pgid,
        exit_status,
        timed_out,
        wall_time,
        output.stdout_integrity,
        output.stderr_integrity
    );

    Ok(WorkerOutcome {
        exit_status,
        timed_out,
        output,
        wall_time,
    })
}
