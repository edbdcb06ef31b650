use crate::error::AppError;
use crate::model::{ResetTime, Task, TaskKind};
use crate::store::TaskStore;
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        OffsetDateTime::now_utc().to_offset(offset)
    }
}

#[derive(Debug)]
pub struct ResetOutcome {
    pub reset: Vec<Task>,
    pub failures: Vec<ResetFailure>,
}

#[derive(Debug)]
pub struct ResetFailure {
    pub task_id: String,
    pub error: AppError,
}

/// Clears the completion flag of the identity's daily tasks when `now` lands
/// on the configured minute. Returns `None` outside the trigger minute.
/// Per-task update failures are collected, never retried.
pub fn run_reset_pass(
    tasks: &TaskStore,
    user_id: &str,
    reset_time: ResetTime,
    now: OffsetDateTime,
) -> Result<Option<ResetOutcome>, AppError> {
    if !reset_time.matches(now.hour(), now.minute()) {
        return Ok(None);
    }

    let daily = tasks.fetch(user_id, Some(TaskKind::Daily))?;
    let mut reset = Vec::new();
    let mut failures = Vec::new();

    for task in daily {
        if !task.completed {
            continue;
        }

        match tasks.set_completed(&task.id, false) {
            Ok(()) => reset.push(task),
            Err(error) => {
                warn!("daily reset failed for task {}: {}", task.id, error);
                failures.push(ResetFailure {
                    task_id: task.id,
                    error,
                });
            }
        }
    }

    Ok(Some(ResetOutcome { reset, failures }))
}

pub struct ResetScheduler {
    tasks: TaskStore,
    user_id: String,
    reset_time: Arc<Mutex<ResetTime>>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ResetScheduler {
    pub fn new(
        tasks: TaskStore,
        user_id: impl Into<String>,
        reset_time: Arc<Mutex<ResetTime>>,
    ) -> Self {
        Self {
            tasks,
            user_id: user_id.into(),
            reset_time,
            clock: Arc::new(SystemClock),
            interval: TICK_INTERVAL,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn start(self) -> SchedulerHandle {
        self.start_with_outcomes(None)
    }

    /// Like `start`, forwarding each non-empty reset outcome over `outcomes`.
    pub fn start_with_outcomes(self, outcomes: Option<Sender<ResetOutcome>>) -> SchedulerHandle {
        let (stop_sender, stop_receiver) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            loop {
                match stop_receiver.recv_timeout(self.interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                self.tick(outcomes.as_ref());
            }
        });

        SchedulerHandle {
            stop: Some(stop_sender),
            thread: Some(thread),
        }
    }

    fn tick(&self, outcomes: Option<&Sender<ResetOutcome>>) {
        let reset_time = match self.reset_time.lock() {
            Ok(guard) => *guard,
            Err(_) => return,
        };

        match run_reset_pass(&self.tasks, &self.user_id, reset_time, self.clock.now()) {
            Ok(None) => {}
            Ok(Some(outcome)) => {
                debug!(
                    "daily reset pass: {} reset, {} failed",
                    outcome.reset.len(),
                    outcome.failures.len()
                );
                if !outcome.reset.is_empty()
                    && let Some(sender) = outcomes
                {
                    sender.send(outcome).ok();
                }
            }
            Err(error) => warn!("daily reset pass failed: {error}"),
        }
    }
}

pub struct SchedulerHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
