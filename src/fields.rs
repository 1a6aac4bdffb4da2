//! Where each metric lives in Garmin's payloads.
//!
//! Garmin's wellness JSON is undocumented and field names have moved
//! between releases (`totalHydration` became `valueInML`, the sleep score
//! moved under `sleepScores`). Every lookup the normalizer does goes
//! through this table, so schema drift is fixed here and nowhere else.

use serde_json::Value;

/// JSON pointers tried in order; the first non-null hit wins.
#[derive(Debug, Clone, Copy)]
pub struct Field(&'static [&'static str]);

impl Field {
    pub fn lookup<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .find_map(|pointer| payload.pointer(pointer).filter(|v| !v.is_null()))
    }

    /// Numeric value, accepting numbers and numeric strings.
    pub fn number(&self, payload: &Value) -> Option<f64> {
        self.lookup(payload).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn text<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        self.lookup(payload)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

pub mod sleep {
    use super::Field;

    pub const CALENDAR_DATE: Field = Field(&["/dailySleepDTO/calendarDate"]);
    pub const START_GMT: Field = Field(&["/dailySleepDTO/sleepStartTimestampGMT"]);
    pub const END_GMT: Field = Field(&["/dailySleepDTO/sleepEndTimestampGMT"]);
    pub const DEEP_SECONDS: Field = Field(&["/dailySleepDTO/deepSleepSeconds"]);
    pub const LIGHT_SECONDS: Field = Field(&["/dailySleepDTO/lightSleepSeconds"]);
    pub const REM_SECONDS: Field = Field(&["/dailySleepDTO/remSleepSeconds"]);
    pub const AWAKE_SECONDS: Field = Field(&["/dailySleepDTO/awakeSleepSeconds"]);
    pub const SCORE: Field = Field(&[
        "/dailySleepDTO/sleepScores/overall/value",
        "/dailySleepDTO/sleepScore",
    ]);
    pub const RESTING_HEART_RATE: Field = Field(&["/restingHeartRate"]);
    pub const OVERNIGHT_HRV: Field = Field(&["/avgOvernightHrv"]);
    pub const HRV_STATUS: Field = Field(&["/hrvStatus"]);
    pub const AVG_SLEEP_STRESS: Field = Field(&["/dailySleepDTO/avgSleepStress"]);
}

pub mod stress {
    use super::Field;

    pub const AVG_LEVEL: Field = Field(&["/avgStressLevel"]);
}

pub mod summary {
    use super::Field;

    pub const TOTAL_KCAL: Field = Field(&["/totalKilocalories"]);
    pub const CONSUMED_KCAL: Field = Field(&["/consumedKilocalories"]);
    pub const ACTIVE_KCAL: Field = Field(&["/activeKilocalories"]);
    pub const MODERATE_MINUTES: Field = Field(&["/moderateIntensityMinutes"]);
    pub const VIGOROUS_MINUTES: Field = Field(&["/vigorousIntensityMinutes"]);
}

pub mod hydration {
    use super::Field;

    pub const VALUE_ML: Field = Field(&["/valueInML", "/totalHydration"]);
}

pub mod heart_rate {
    use super::Field;

    pub const RESTING_7D_AVG: Field = Field(&["/lastSevenDaysAvgRestingHeartRate"]);
}

pub mod body_composition {
    use super::Field;

    pub const WEIGHT_GRAMS: Field = Field(&["/totalAverage/weight", "/dateWeightList/0/weight"]);
}
