use checklist_core::auth::Identity;
use checklist_core::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SESSION_FILE_NAME: &str = "session.json";
const SESSION_PATH_ENV_VAR: &str = "CHECKLIST_SESSION_PATH";

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user_id: String,
    email: String,
}

pub fn session_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(SESSION_PATH_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("checklist")
            .join(SESSION_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("checklist")
            .join(SESSION_FILE_NAME))
    }
}

pub fn load(path: &Path) -> Result<Option<Identity>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredSession =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    Ok(Some(Identity {
        user_id: stored.user_id,
        email: stored.email,
    }))
}

pub fn save(path: &Path, identity: &Identity) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredSession {
        user_id: identity.user_id.clone(),
        email: identity.email.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}

pub fn clear(path: &Path) -> Result<(), AppError> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|err| AppError::io(err.to_string()))?;
    }
    Ok(())
}
