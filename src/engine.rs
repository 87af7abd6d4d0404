//! Single worker command executor.
//!
//! Commands run one at a time, in submission order, on a dedicated thread fed through a
//! crossbeam channel. Each submission gets a [`Completion`] to wait on and a fresh
//! [`CancelToken`] that [`Interrupter::interrupt`] trips. Failures are reported on the
//! command's output unless the command was interrupted, and never stop the worker.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, after, bounded, never, select, unbounded};
use owo_colors::OwoColorize;
use tracing::{debug, error, trace};

use crate::command::Command;
use crate::cursor::ParsedCommandLine;
use crate::env::Environment;
use crate::error::{EngineError, Interrupted};

/// Observes whether the running command was asked to stop.
///
/// The token is cooperative: commands poll [`CancelToken::is_cancelled`] or block through
/// [`CancelToken::sleep`] and [`CancelToken::receiver`], which wake up on interruption.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    signal: Receiver<()>,
}

/// Trips a [`CancelToken`]. Cancelling drops the sender, which wakes every receiver.
#[derive(Debug)]
struct CancelTrigger {
    cancelled: Arc<AtomicBool>,
    sender: Mutex<Option<Sender<()>>>,
}

impl CancelToken {
    fn pair() -> (CancelToken, CancelTrigger) {
        let (sender, signal) = bounded(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let token = CancelToken {
            cancelled: Arc::clone(&cancelled),
            signal,
        };
        let trigger = CancelTrigger {
            cancelled,
            sender: Mutex::new(Some(sender)),
        };
        (token, trigger)
    }

    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            signal: never(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Interrupted)` once cancelled, for use with `?`.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted);
        }
        Ok(())
    }

    /// Sleep for `duration`, returning early with `Err(Interrupted)` when cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        select! {
            recv(self.signal) -> _ => Err(Interrupted),
            recv(after(duration)) -> _ => Ok(()),
        }
    }

    /// Block until cancelled.
    pub fn wait(&self) {
        // only ever disconnected, never sent to
        let _ = self.signal.recv();
    }

    /// Receiver that disconnects on cancellation, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl CancelTrigger {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        lock(&self.sender).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a submitted command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The command failed; the failure was reported on its output.
    Failed,
    /// The command failed after being interrupted; nothing was reported.
    Cancelled,
    /// The executor shut down before the command started.
    Skipped,
}

/// Handle on a submitted command.
#[derive(Debug)]
pub struct Completion {
    done: Receiver<Outcome>,
}

impl Completion {
    /// Block until the command has finished.
    pub fn wait(self) -> Outcome {
        self.done.recv().unwrap_or(Outcome::Skipped)
    }

    /// Block at most `timeout`; `None` if the command is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        match self.done.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => None,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Some(Outcome::Skipped),
        }
    }
}

struct Job {
    command: Arc<Command>,
    line: ParsedCommandLine,
    env: Environment,
    done: Sender<Outcome>,
}

#[derive(Debug, Default)]
struct Shared {
    current: Mutex<Option<CancelTrigger>>,
    shut_down: AtomicBool,
}

impl Shared {
    fn interrupt(&self) {
        if let Some(trigger) = lock(&self.current).as_ref() {
            debug!("interrupting running command");
            trigger.cancel();
        }
    }
}

/// Cloneable handle that interrupts the command currently running, if any.
///
/// Safe to call from a signal handler thread.
#[derive(Debug, Clone)]
pub struct Interrupter {
    shared: Arc<Shared>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.shared.interrupt();
    }
}

/// Runs commands sequentially on one worker thread.
#[derive(Debug)]
pub struct Executor {
    jobs: Option<Sender<Job>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Executor {
    pub fn new() -> Result<Self, EngineError> {
        let (jobs, queue) = unbounded::<Job>();
        let shared = Arc::new(Shared::default());
        let worker = thread::Builder::new()
            .name("command-executor".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || work(queue, shared)
            })?;
        Ok(Self {
            jobs: Some(jobs),
            shared,
            worker: Some(worker),
        })
    }

    /// Queue `command` to run against `line`.
    pub fn submit(
        &self,
        command: Arc<Command>,
        line: ParsedCommandLine,
        env: Environment,
    ) -> Result<Completion, EngineError> {
        let jobs = self.jobs.as_ref().ok_or(EngineError::ShutDown)?;
        let (done, completion) = bounded(1);
        trace!(command = %command.qualified_name(), "submitting command");
        jobs.send(Job {
            command,
            line,
            env,
            done,
        })
        .map_err(|_| EngineError::ShutDown)?;
        Ok(Completion { done: completion })
    }

    /// Interrupt the command currently running, if any.
    pub fn interrupt(&self) {
        self.shared.interrupt();
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop accepting work, interrupt the running command and skip queued ones.
    pub fn shutdown(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        debug!("shutting down executor");
        self.shared.shut_down.store(true, Ordering::SeqCst);
        self.shared.interrupt();
        if let Some(worker) = self.worker.take() {
            // a command ignoring its cancel token would block here
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.jobs.is_none()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(queue: Receiver<Job>, shared: Arc<Shared>) {
    for job in queue.iter() {
        if shared.shut_down.load(Ordering::SeqCst) {
            trace!(command = %job.command.qualified_name(), "skipping queued command");
            let _ = job.done.send(Outcome::Skipped);
            continue;
        }
        let (token, trigger) = CancelToken::pair();
        *lock(&shared.current) = Some(trigger);
        let outcome = run(job.command, job.line, job.env.with_cancel(token));
        lock(&shared.current).take();
        let _ = job.done.send(outcome);
    }
    debug!("executor stopped");
}

fn run(command: Arc<Command>, mut line: ParsedCommandLine, env: Environment) -> Outcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| command.run(&mut line, &env)))
        .unwrap_or_else(|payload| Err(anyhow!("command panicked: {}", panic_message(&*payload))));

    match result {
        Ok(()) => Outcome::Completed,
        Err(err) if env.is_interrupted() => {
            debug!(command = %command.qualified_name(), "command interrupted: {err:#}");
            Outcome::Cancelled
        }
        Err(err) => {
            error!(command = %command.qualified_name(), line = %line, "command failed: {err:#}");
            if let Err(io) = report(&env, &command, &line, &err) {
                error!("failed to report command error: {io}");
            }
            Outcome::Failed
        }
    }
}

fn report(
    env: &Environment,
    command: &Command,
    line: &ParsedCommandLine,
    err: &anyhow::Error,
) -> std::io::Result<()> {
    let mut output = env.output();
    let headline = format!("Error executing '{}({})': {}", command.qualified_name(), line, err);
    if output.color() {
        writeln!(output, "{}", headline.red())?;
    } else {
        writeln!(output, "{headline}")?;
    }
    for cause in err.chain().skip(1) {
        writeln!(output, "    caused by: {cause}")?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
