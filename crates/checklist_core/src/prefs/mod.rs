use crate::error::AppError;
use crate::model::ResetTime;
use log::warn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DARK_MODE_KEY: &str = "dark_mode";
pub const RESET_TIME_KEY: &str = "reset_time";
const PREFS_FILE_NAME: &str = "prefs.json";
const PREFS_PATH_ENV_VAR: &str = "CHECKLIST_PREFS_PATH";

pub trait KeyValue {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preferences {
    pub dark_mode: bool,
    pub reset_time: ResetTime,
}

impl Preferences {
    /// Unreadable or malformed values degrade to the defaults.
    pub fn load(kv: &dyn KeyValue) -> Preferences {
        let mut prefs = Preferences::default();

        match kv.get(DARK_MODE_KEY) {
            Ok(Some(value)) => match value.as_str() {
                "true" => prefs.dark_mode = true,
                "false" => prefs.dark_mode = false,
                other => warn!("ignoring invalid {DARK_MODE_KEY} value: {other}"),
            },
            Ok(None) => {}
            Err(error) => warn!("failed to read {DARK_MODE_KEY}: {error}"),
        }

        match kv.get(RESET_TIME_KEY) {
            Ok(Some(value)) => match value.parse() {
                Ok(parsed) => prefs.reset_time = parsed,
                Err(error) => warn!("ignoring invalid {RESET_TIME_KEY} value: {error}"),
            },
            Ok(None) => {}
            Err(error) => warn!("failed to read {RESET_TIME_KEY}: {error}"),
        }

        prefs
    }

    pub fn save(&self, kv: &dyn KeyValue) -> Result<(), AppError> {
        kv.set(DARK_MODE_KEY, if self.dark_mode { "true" } else { "false" })?;
        kv.set(RESET_TIME_KEY, &self.reset_time.to_string())
    }
}

pub struct JsonKeyValue {
    path: PathBuf,
}

impl JsonKeyValue {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn default_path() -> Result<PathBuf, AppError> {
        if let Ok(path) = std::env::var(PREFS_PATH_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        if cfg!(windows) {
            let appdata = std::env::var("APPDATA")
                .map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
            Ok(PathBuf::from(appdata)
                .join("checklist")
                .join(PREFS_FILE_NAME))
        } else {
            let home =
                std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
            Ok(PathBuf::from(home)
                .join(".config")
                .join("checklist")
                .join(PREFS_FILE_NAME))
        }
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>, AppError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|err| AppError::io(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))
    }
}

impl KeyValue for JsonKeyValue {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.load_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
        }

        let content = serde_json::to_string_pretty(&map)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;
        std::fs::write(&self.path, content).map_err(|err| AppError::io(err.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn accentize(&self, text: &str) -> String {
        if self.accent.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.accent, text, self.reset)
        }
    }

    pub fn mutedize(&self, text: &str) -> String {
        if self.muted.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.muted, text, self.reset)
        }
    }
}

pub fn palette_for(dark_mode: bool) -> Palette {
    if dark_mode {
        Palette {
            accent: "\x1b[38;5;208m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        }
    } else {
        Palette {
            accent: "",
            muted: "",
            reset: "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonKeyValue, KeyValue, Preferences, palette_for};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("checklist-{nanos}-{file_name}"))
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = temp_path("missing-prefs.json");
        let kv = JsonKeyValue::new(&path);

        let prefs = Preferences::load(&kv);

        assert!(!prefs.dark_mode);
        assert_eq!(prefs.reset_time.to_string(), "08:00");
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path("prefs.json");
        let kv = JsonKeyValue::new(&path);
        let prefs = Preferences {
            dark_mode: true,
            reset_time: "12:00".parse().unwrap(),
        };

        prefs.save(&kv).unwrap();
        let loaded = Preferences::load(&kv);
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn invalid_values_degrade_to_defaults() {
        let path = temp_path("bad-prefs.json");
        let kv = JsonKeyValue::new(&path);
        kv.set("dark_mode", "maybe").unwrap();
        kv.set("reset_time", "25:99").unwrap();

        let loaded = Preferences::load(&kv);
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, Preferences::default());
    }

    #[test]
    fn set_preserves_other_keys() {
        let path = temp_path("prefs-keys.json");
        let kv = JsonKeyValue::new(&path);
        kv.set("dark_mode", "true").unwrap();
        kv.set("reset_time", "16:00").unwrap();

        let dark_mode = kv.get("dark_mode").unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(dark_mode.as_deref(), Some("true"));
    }

    #[test]
    fn palette_follows_dark_mode() {
        let dark = palette_for(true);
        assert_eq!(dark.accentize("x"), "\x1b[38;5;208mx\x1b[0m");

        let light = palette_for(false);
        assert_eq!(light.accentize("x"), "x");
        assert_eq!(light.mutedize("x"), "x");
    }
}
