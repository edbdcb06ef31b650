use crate::error::AppError;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

mod local;
pub use local::LocalIdentityProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AppError>;

    fn end_session(&self) -> Result<(), AppError>;
}

struct GateState {
    identity: Option<Identity>,
    listeners: Vec<Sender<Option<Identity>>>,
}

pub struct CredentialGate {
    provider: Box<dyn IdentityProvider>,
    state: Mutex<GateState>,
}

impl CredentialGate {
    pub fn new(provider: Box<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(GateState {
                identity: None,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let identity = self.provider.authenticate(email, password)?;

        let mut state = self.lock_state()?;
        state.identity = Some(identity.clone());
        Self::notify(&mut state);

        Ok(identity)
    }

    pub fn logout(&self) -> Result<(), AppError> {
        self.provider.end_session()?;

        let mut state = self.lock_state()?;
        state.identity = None;
        Self::notify(&mut state);

        Ok(())
    }

    /// Adopts a previously established identity, e.g. one persisted by the
    /// client across process runs, and notifies watchers as a transition.
    pub fn restore(&self, identity: Identity) -> Result<(), AppError> {
        let mut state = self.lock_state()?;
        state.identity = Some(identity);
        Self::notify(&mut state);
        Ok(())
    }

    pub fn current(&self) -> Option<Identity> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.identity.clone())
    }

    /// The returned channel receives the current identity immediately and
    /// again on every transition.
    pub fn watch_identity(&self) -> Result<Receiver<Option<Identity>>, AppError> {
        let (sender, receiver) = mpsc::channel();

        let mut state = self.lock_state()?;
        sender
            .send(state.identity.clone())
            .map_err(|_| AppError::invalid_data("identity channel closed"))?;
        state.listeners.push(sender);

        Ok(receiver)
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, GateState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::invalid_data("credential gate state poisoned"))
    }

    fn notify(state: &mut GateState) {
        let current = state.identity.clone();
        state
            .listeners
            .retain(|listener| listener.send(current.clone()).is_ok());
    }
}
