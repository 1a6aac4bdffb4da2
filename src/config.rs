use crate::key::Key;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Datelike;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use time::macros::format_description;
use time::{Date, Duration, Month};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub garmin: GarminConfig,
    pub notion: NotionConfig,
    pub sync: SyncConfig,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct GarminConfig {
    pub email: Key,
    pub password: Key,
    pub sso_url: Option<String>,
    pub api_url: Option<String>,
}

impl Default for GarminConfig {
    fn default() -> Self {
        Self {
            email: Key::env("GARMIN_EMAIL"),
            password: Key::env("GARMIN_PASSWORD"),
            sso_url: None,
            api_url: None,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct NotionConfig {
    pub token: Key,
    pub database_id: Key,
    pub icon: String,
    pub api_url: Option<String>,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: Key::env("NOTION_TOKEN"),
            database_id: Key::env("NOTION_DATABASE_ID"),
            icon: "😴".to_owned(),
            api_url: None,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct SyncConfig {
    /// IANA zone used for the clock times shown in the table and for
    /// deciding what "yesterday" is.
    pub timezone: String,
    pub days: u32,
    /// First day of the window, `YYYY-MM-DD`. Without it the window ends
    /// yesterday.
    pub start_date: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_owned(),
            days: 1,
            start_date: None,
            request_timeout_seconds: 30,
        }
    }
}

/// The four secrets a run needs, resolved before anything touches the
/// network.
pub struct Secrets {
    pub garmin_email: String,
    pub garmin_password: String,
    pub notion_token: String,
    pub notion_database_id: String,
}

/// Consecutive calendar days to sync, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: Date,
    pub days: u32,
}

impl SyncWindow {
    /// The `days` days ending the day before `today`.
    pub fn ending_yesterday(today: Date, days: u32) -> Result<Self> {
        let start = today
            .checked_sub(Duration::days(i64::from(days)))
            .ok_or_else(|| anyhow!("sync.days = {days} reaches before the earliest date"))?;
        Ok(Self { start, days })
    }

    pub fn dates(&self) -> Vec<Date> {
        (0..self.days)
            .filter_map(|offset| self.start.checked_add(Duration::days(i64::from(offset))))
            .collect()
    }
}

impl Config {
    /// Loads the config from `path`, or from `config.toml` if present, or
    /// falls back to defaults reading every secret from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Path::new(DEFAULT_CONFIG_PATH),
            None => return Ok(Self::default()),
        };
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&config_str)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    /// Resolves all secrets, reporting every missing one at once.
    pub fn resolve_secrets(&self) -> Result<Secrets> {
        let mut missing = Vec::new();
        let mut resolve = |name: &str, key: &Key| match key.get_value() {
            Ok(value) => value,
            Err(e) => {
                missing.push(format!("{name}: {e}"));
                String::new()
            }
        };

        let secrets = Secrets {
            garmin_email: resolve("garmin.email", &self.garmin.email),
            garmin_password: resolve("garmin.password", &self.garmin.password),
            notion_token: resolve("notion.token", &self.notion.token),
            notion_database_id: resolve("notion.database_id", &self.notion.database_id),
        };

        if !missing.is_empty() {
            bail!("Missing required secrets:\n  - {}", missing.join("\n  - "));
        }
        Ok(secrets)
    }
}

impl SyncConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone '{}': {e}", self.timezone))
    }

    pub fn request_timeout(&self) -> Result<std::time::Duration> {
        if self.request_timeout_seconds == 0 {
            bail!("sync.request_timeout_seconds must be greater than zero");
        }
        Ok(std::time::Duration::from_secs(self.request_timeout_seconds))
    }

    pub fn window(&self, today: Date) -> Result<SyncWindow> {
        if self.days == 0 {
            bail!("sync.days must be at least 1");
        }
        match &self.start_date {
            Some(start) => {
                let start = Date::parse(start, format_description!("[year]-[month]-[day]"))
                    .with_context(|| format!("Invalid sync.start_date '{start}'"))?;
                Ok(SyncWindow {
                    start,
                    days: self.days,
                })
            }
            None => SyncWindow::ending_yesterday(today, self.days),
        }
    }
}

/// The current calendar date in `tz`.
pub fn today_in(tz: Tz) -> Result<Date> {
    let now = chrono::Utc::now().with_timezone(&tz).date_naive();
    let month = u8::try_from(now.month())?;
    let day = u8::try_from(now.day())?;
    Ok(Date::from_calendar_date(now.year(), Month::try_from(month)?, day)?)
}
