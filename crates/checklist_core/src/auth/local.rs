use super::{Identity, IdentityProvider};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ACCOUNTS_FILE_NAME: &str = "accounts.json";
const ACCOUNTS_PATH_ENV_VAR: &str = "CHECKLIST_ACCOUNTS_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    user_id: String,
    email: String,
    password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAccounts {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// Development identity provider backed by a local accounts file.
pub struct LocalIdentityProvider {
    path: PathBuf,
}

impl LocalIdentityProvider {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn default_path() -> Result<PathBuf, AppError> {
        if let Ok(path) = std::env::var(ACCOUNTS_PATH_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        if cfg!(windows) {
            let appdata = std::env::var("APPDATA")
                .map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
            Ok(PathBuf::from(appdata)
                .join("checklist")
                .join(ACCOUNTS_FILE_NAME))
        } else {
            let home =
                std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
            Ok(PathBuf::from(home)
                .join(".config")
                .join("checklist")
                .join(ACCOUNTS_FILE_NAME))
        }
    }

    pub fn register(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let trimmed_email = email.trim();
        if trimmed_email.is_empty() {
            return Err(AppError::invalid_input("email is required"));
        }
        if password.is_empty() {
            return Err(AppError::invalid_input("password is required"));
        }

        let mut stored = self.load()?;
        if stored
            .accounts
            .iter()
            .any(|account| account.email.eq_ignore_ascii_case(trimmed_email))
        {
            return Err(AppError::invalid_input("account already exists"));
        }

        let account = Account {
            user_id: Uuid::new_v4().to_string(),
            email: trimmed_email.to_string(),
            password: password.to_string(),
        };
        let identity = Identity {
            user_id: account.user_id.clone(),
            email: account.email.clone(),
        };

        stored.accounts.push(account);
        self.save(&stored)?;

        Ok(identity)
    }

    fn load(&self) -> Result<StoredAccounts, AppError> {
        if !self.path.exists() {
            return Ok(StoredAccounts::default());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|err| AppError::io(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))
    }

    fn save(&self, stored: &StoredAccounts) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
        }

        let content = serde_json::to_string_pretty(stored)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        std::fs::write(&self.path, content).map_err(|err| AppError::io(err.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions)
                .map_err(|err| AppError::io(err.to_string()))?;
        }

        Ok(())
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let stored = self
            .load()
            .map_err(|err| AppError::authentication(err.message().to_string()))?;
        let trimmed_email = email.trim();

        stored
            .accounts
            .iter()
            .find(|account| {
                account.email.eq_ignore_ascii_case(trimmed_email) && account.password == password
            })
            .map(|account| Identity {
                user_id: account.user_id.clone(),
                email: account.email.clone(),
            })
            .ok_or_else(|| AppError::authentication("invalid email or password"))
    }

    fn end_session(&self) -> Result<(), AppError> {
        Ok(())
    }
}
