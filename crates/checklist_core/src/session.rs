use crate::auth::Identity;
use crate::error::AppError;
use crate::model::{ResetTime, TaskKind};
use crate::scheduler::{ResetOutcome, ResetScheduler, SchedulerHandle};
use crate::store::{TaskStore, TaskSubscription};
use log::info;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

/// The live half of one authenticated session: both task subscriptions plus
/// the running reset scheduler. Closing the session cancels all three.
pub struct Session {
    identity: Identity,
    pub daily: TaskSubscription,
    pub monthly: TaskSubscription,
    reset_time: Arc<Mutex<ResetTime>>,
    scheduler: SchedulerHandle,
    pub reset_outcomes: Receiver<ResetOutcome>,
}

impl Session {
    pub fn open(
        identity: Identity,
        tasks: TaskStore,
        reset_time: ResetTime,
    ) -> Result<Session, AppError> {
        let daily = tasks.subscribe(&identity.user_id, TaskKind::Daily)?;
        let monthly = tasks.subscribe(&identity.user_id, TaskKind::Monthly)?;

        let shared_reset = Arc::new(Mutex::new(reset_time));
        let (outcome_sender, reset_outcomes) = mpsc::channel();
        let scheduler = ResetScheduler::new(
            tasks,
            identity.user_id.clone(),
            Arc::clone(&shared_reset),
        )
        .start_with_outcomes(Some(outcome_sender));

        info!("session opened for {}", identity.email);

        Ok(Session {
            identity,
            daily,
            monthly,
            reset_time: shared_reset,
            scheduler,
            reset_outcomes,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Takes effect at the scheduler's next tick; no restart needed.
    pub fn set_reset_time(&self, reset_time: ResetTime) -> Result<(), AppError> {
        let mut guard = self
            .reset_time
            .lock()
            .map_err(|_| AppError::invalid_data("session state poisoned"))?;
        *guard = reset_time;
        Ok(())
    }

    pub fn close(mut self) {
        info!("session closed for {}", self.identity.email);
        self.daily.cancel();
        self.monthly.cancel();
        self.scheduler.stop();
    }
}
