use crate::fields;
use chrono::TimeZone;
use chrono_tz::Tz;
use log::debug;
use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

pub const NO_HRV_STATUS: &str = "No Status";

/// Raw payloads fetched for one requested date. `None` means the category
/// failed or came back empty.
#[derive(Debug, Clone, Default)]
pub struct RawDay {
    pub sleep: Option<Value>,
    /// Stress for the day *before* the requested date.
    pub stress: Option<Value>,
    pub summary: Option<Value>,
    pub hydration: Option<Value>,
    pub heart_rate: Option<Value>,
    pub body_composition: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleepRecord {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
    pub deep_seconds: u64,
    pub light_seconds: u64,
    pub rem_seconds: u64,
    pub awake_seconds: u64,
    pub score: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub overnight_hrv: Option<f64>,
    pub hrv_status: String,
    pub avg_sleep_stress: Option<f64>,
}

impl SleepRecord {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            start: timestamp(fields::sleep::START_GMT.number(payload)),
            end: timestamp(fields::sleep::END_GMT.number(payload)),
            deep_seconds: seconds(fields::sleep::DEEP_SECONDS.number(payload)),
            light_seconds: seconds(fields::sleep::LIGHT_SECONDS.number(payload)),
            rem_seconds: seconds(fields::sleep::REM_SECONDS.number(payload)),
            awake_seconds: seconds(fields::sleep::AWAKE_SECONDS.number(payload)),
            score: fields::sleep::SCORE.number(payload),
            resting_heart_rate: fields::sleep::RESTING_HEART_RATE.number(payload),
            overnight_hrv: fields::sleep::OVERNIGHT_HRV.number(payload),
            hrv_status: fields::sleep::HRV_STATUS
                .text(payload)
                .unwrap_or(NO_HRV_STATUS)
                .to_owned(),
            avg_sleep_stress: fields::sleep::AVG_SLEEP_STRESS.number(payload),
        }
    }

    /// Time actually asleep; awake time is excluded.
    pub fn total_seconds(&self) -> u64 {
        self.deep_seconds + self.light_seconds + self.rem_seconds
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalorieSummary {
    pub total_kcal: Option<f64>,
    pub consumed_kcal: Option<f64>,
    pub active_kcal: Option<f64>,
    pub moderate_minutes: Option<f64>,
    pub vigorous_minutes: Option<f64>,
}

impl CalorieSummary {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            total_kcal: fields::summary::TOTAL_KCAL.number(payload),
            consumed_kcal: fields::summary::CONSUMED_KCAL.number(payload),
            active_kcal: fields::summary::ACTIVE_KCAL.number(payload),
            moderate_minutes: fields::summary::MODERATE_MINUTES.number(payload),
            vigorous_minutes: fields::summary::VIGOROUS_MINUTES.number(payload),
        }
    }

    /// Intake minus expenditure. Only defined when both sides were reported;
    /// a zero balance is a real value, never a placeholder.
    pub fn balance(&self) -> Option<CalorieBalance> {
        let total = self.total_kcal?;
        let consumed = self.consumed_kcal?;
        if total == 0.0 {
            return None;
        }
        let difference = consumed - total;
        Some(CalorieBalance {
            // Whole kilocalories; adding zero folds -0.0 into 0.0.
            kcal: difference.round() + 0.0,
            deficit_percent: (difference.abs() / total * 100.0).round(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalorieBalance {
    /// Positive for a surplus, negative for a deficit.
    pub kcal: f64,
    pub deficit_percent: f64,
}

/// Everything synced for one night, keyed by the date Garmin files the
/// sleep under.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyMetrics {
    pub date: Date,
    pub sleep: Option<SleepRecord>,
    pub prior_day_stress: Option<f64>,
    pub calorie_summary: Option<CalorieSummary>,
    pub hydration_ml: Option<f64>,
    pub body_weight_kg: Option<f64>,
    pub resting_heart_rate_7d_avg: Option<f64>,
}

impl DailyMetrics {
    /// A day is only worth a row if some sleep was actually recorded.
    pub fn is_ingestable(&self) -> bool {
        self.sleep.as_ref().is_some_and(|s| s.total_seconds() > 0)
    }

    pub fn calorie_balance(&self) -> Option<CalorieBalance> {
        self.calorie_summary.as_ref().and_then(CalorieSummary::balance)
    }
}

/// Builds the metrics for `requested` out of whatever categories arrived.
///
/// Never fails: missing categories and missing fields fall back to their
/// neutral values. The date comes from the sleep payload when it carries
/// one, since Garmin files a night under its own calendar date.
pub fn normalize(requested: Date, raw: &RawDay) -> DailyMetrics {
    let date = raw
        .sleep
        .as_ref()
        .and_then(|payload| fields::sleep::CALENDAR_DATE.text(payload))
        .and_then(|s| match parse_date(s) {
            Some(date) => Some(date),
            None => {
                debug!("ignoring unparseable sleep calendarDate '{s}'");
                None
            }
        })
        .unwrap_or(requested);

    DailyMetrics {
        date,
        sleep: raw.sleep.as_ref().map(SleepRecord::from_payload),
        prior_day_stress: raw
            .stress
            .as_ref()
            .and_then(|p| fields::stress::AVG_LEVEL.number(p))
            // Garmin reports "not enough data" as -1 / -2.
            .filter(|level| *level >= 0.0),
        calorie_summary: raw.summary.as_ref().map(CalorieSummary::from_payload),
        hydration_ml: raw
            .hydration
            .as_ref()
            .and_then(|p| fields::hydration::VALUE_ML.number(p)),
        body_weight_kg: raw
            .body_composition
            .as_ref()
            .and_then(|p| fields::body_composition::WEIGHT_GRAMS.number(p))
            .map(|grams| grams / 1000.0),
        resting_heart_rate_7d_avg: raw
            .heart_rate
            .as_ref()
            .and_then(|p| fields::heart_rate::RESTING_7D_AVG.number(p)),
    }
}

fn seconds(value: Option<f64>) -> u64 {
    value
        .filter(|s| s.is_finite() && *s > 0.0)
        .map_or(0, |s| s.round() as u64)
}

fn timestamp(millis: Option<f64>) -> Option<OffsetDateTime> {
    let millis = millis.filter(|ms| ms.is_finite() && *ms > 0.0)? as i64;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

pub fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// `YYYY-MM-DD`, the key the dedup column is matched on.
pub fn iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// `DD.MM.YYYY`, used for the row title.
pub fn display_date(date: Date) -> String {
    format!(
        "{:02}.{:02}.{:04}",
        date.day(),
        date.month() as u8,
        date.year()
    )
}

/// Compact `<H>h <M>m`, minutes truncated.
pub fn format_duration(seconds: u64) -> String {
    let minutes = seconds / 60;
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Hours rounded to one decimal place.
pub fn hours(seconds: u64) -> f64 {
    (seconds as f64 / 3600.0 * 10.0).round() / 10.0
}

/// Absolute UTC instant with millisecond precision, e.g.
/// `2024-03-04T22:15:00.000Z`.
pub fn iso_instant(instant: OffsetDateTime) -> Option<String> {
    instant
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .ok()
}

/// Local wall-clock `HH:MM` in `tz`.
pub fn clock_time(instant: OffsetDateTime, tz: Tz) -> Option<String> {
    tz.timestamp_opt(instant.unix_timestamp(), 0)
        .single()
        .map(|local| local.format("%H:%M").to_string())
}
