use crate::error::AppError;
use crate::notify::{Notifier, reset_summary};
use crate::scheduler::ResetOutcome;
use notify_rust::Notification;

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn notify_reset(&self, outcome: &ResetOutcome) -> Result<(), AppError> {
        Notification::new()
            .summary("checklist")
            .body(&reset_summary(outcome))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
