use crate::error::AppError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTime {
    pub hour: u8,
    pub minute: u8,
}

impl ResetTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, AppError> {
        if hour > 23 || minute > 59 {
            return Err(AppError::invalid_input(
                "reset time must be HH:MM in 24-hour form",
            ));
        }
        Ok(Self { hour, minute })
    }

    pub fn matches(self, hour: u8, minute: u8) -> bool {
        self.hour == hour && self.minute == minute
    }
}

impl Default for ResetTime {
    fn default() -> Self {
        Self { hour: 8, minute: 0 }
    }
}

impl FromStr for ResetTime {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::invalid_input("reset time must be HH:MM in 24-hour form");
        let trimmed = raw.trim();
        let (hour_raw, minute_raw) = trimmed.split_once(':').ok_or_else(invalid)?;

        if hour_raw.len() != 2 || minute_raw.len() != 2 {
            return Err(invalid());
        }
        if !hour_raw.chars().all(|ch| ch.is_ascii_digit())
            || !minute_raw.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(invalid());
        }

        let hour = hour_raw.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute_raw.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for ResetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
