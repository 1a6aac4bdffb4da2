use crate::metrics::{
    clock_time, display_date, format_duration, hours, iso_date, iso_instant, DailyMetrics,
    NO_HRV_STATUS,
};
use chrono_tz::Tz;
use notion_light::{Properties, PropertyValue};
use time::OffsetDateTime;

/// The date column rows are deduplicated on.
pub const DATE_KEY_COLUMN: &str = "Long Date";

/// Maps one night onto the table's columns. Numeric columns without a value
/// are left out entirely; Notion would reject or blank a null number.
pub fn project(metrics: &DailyMetrics, tz: Tz) -> Properties {
    let mut row = Properties::new();

    row.insert(
        "Date".to_owned(),
        PropertyValue::Title(display_date(metrics.date)),
    );
    row.insert(
        DATE_KEY_COLUMN.to_owned(),
        PropertyValue::Date(iso_date(metrics.date)),
    );

    let hrv_status = metrics
        .sleep
        .as_ref()
        .map_or(NO_HRV_STATUS, |sleep| sleep.hrv_status.as_str());
    row.insert(
        "HRV Status".to_owned(),
        PropertyValue::Select(hrv_status.to_owned()),
    );

    if let Some(sleep) = &metrics.sleep {
        let clock = |instant: Option<OffsetDateTime>| {
            instant
                .and_then(|i| clock_time(i, tz))
                .unwrap_or_else(|| "Unknown".to_owned())
        };
        row.insert(
            "Times".to_owned(),
            PropertyValue::RichText(format!("{} → {}", clock(sleep.start), clock(sleep.end))),
        );

        if let Some(start) = sleep.start.and_then(iso_instant) {
            row.insert(
                "Full Date/Time".to_owned(),
                PropertyValue::DateRange {
                    start,
                    end: sleep.end.and_then(iso_instant),
                },
            );
        }

        for (label, seconds) in [
            ("Total Sleep", sleep.total_seconds()),
            ("Deep Sleep", sleep.deep_seconds),
            ("Light Sleep", sleep.light_seconds),
            ("REM Sleep", sleep.rem_seconds),
            ("Awake Time", sleep.awake_seconds),
        ] {
            row.insert(
                format!("{label} (h)"),
                PropertyValue::Number(hours(seconds)),
            );
            row.insert(
                label.to_owned(),
                PropertyValue::RichText(format_duration(seconds)),
            );
        }

        insert_number(&mut row, "Sleep Score", sleep.score);
        insert_number(&mut row, "Resting HR", sleep.resting_heart_rate);
        insert_number(&mut row, "HRV (ms)", sleep.overnight_hrv);
        insert_number(&mut row, "Avg Sleep Stress", sleep.avg_sleep_stress);
    }

    insert_number(&mut row, "Prior Day Stress", metrics.prior_day_stress);

    if let Some(summary) = &metrics.calorie_summary {
        insert_number(&mut row, "Calories Burned", summary.total_kcal);
        insert_number(&mut row, "Calories Consumed", summary.consumed_kcal);
        insert_number(&mut row, "Active Calories", summary.active_kcal);
        insert_number(&mut row, "Moderate Intensity (min)", summary.moderate_minutes);
        insert_number(&mut row, "Vigorous Intensity (min)", summary.vigorous_minutes);
    }

    if let Some(balance) = metrics.calorie_balance() {
        insert_number(&mut row, "Calorie Balance", Some(balance.kcal));
        row.insert(
            "Calorie Surplus".to_owned(),
            PropertyValue::RichText(format!(
                "{:.0} ({:.0}%)",
                balance.kcal, balance.deficit_percent
            )),
        );
    }

    insert_number(&mut row, "Hydration (ml)", metrics.hydration_ml);
    insert_number(&mut row, "Weight (kg)", metrics.body_weight_kg);
    insert_number(&mut row, "7d Avg Resting HR", metrics.resting_heart_rate_7d_avg);

    row
}

fn insert_number(row: &mut Properties, name: &str, value: Option<f64>) {
    if let Some(value) = value.filter(|v| v.is_finite()) {
        row.insert(name.to_owned(), PropertyValue::Number(value));
    }
}
