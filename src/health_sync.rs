use crate::collaborators::{Category, MetricsSource, RowStore};
use crate::dedup::DedupGate;
use crate::metrics::{iso_date, normalize, RawDay};
use crate::projection::project;
use anyhow::{Context, Result};
use chrono_tz::Tz;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::fmt;
use time::Date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    /// A new row keyed on `date`, the night's own calendar date.
    Written { date: Date },
    /// The row that would have been written was printed instead.
    DryRun { date: Date },
    AlreadyExists { date: Date },
    NoSleep,
    Failed(String),
}

impl fmt::Display for DayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written { date } => write!(f, "written ({})", iso_date(*date)),
            Self::DryRun { date } => {
                write!(f, "dry run — row not written ({})", iso_date(*date))
            }
            Self::AlreadyExists { date } => {
                write!(f, "skipped — already exists ({})", iso_date(*date))
            }
            Self::NoSleep => f.write_str("skipped — no sleep recorded"),
            Self::Failed(reason) => write!(f, "failed — {reason}"),
        }
    }
}

/// What to do with a projected row once the date is known to be new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// Print the row as JSON and leave the table untouched.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    pub requested: Date,
    pub outcome: DayOutcome,
}

/// Fetches one category, turning any failure into "absent" so that the
/// remaining categories of the day are still fetched.
async fn fetch_category<S: MetricsSource>(
    source: &S,
    category: Category,
    date: Date,
) -> Option<Value> {
    match source.fetch(category, date).await {
        Ok(Value::Null) => None,
        Ok(payload) => {
            debug!("{category} payload for {}: {payload}", iso_date(date));
            Some(payload)
        }
        Err(e) => {
            warn!("{category} fetch for {} failed: {e:#}", iso_date(date));
            None
        }
    }
}

pub async fn fetch_day<S: MetricsSource>(source: &S, date: Date) -> RawDay {
    // Stress carried into the night belongs to the day before it.
    let stress = match date.previous_day() {
        Some(prior) => fetch_category(source, Category::Stress, prior).await,
        None => None,
    };

    RawDay {
        sleep: fetch_category(source, Category::Sleep, date).await,
        stress,
        summary: fetch_category(source, Category::Summary, date).await,
        hydration: fetch_category(source, Category::Hydration, date).await,
        heart_rate: fetch_category(source, Category::HeartRate, date).await,
        body_composition: fetch_category(source, Category::BodyComposition, date).await,
    }
}

async fn sync_day<S: MetricsSource, R: RowStore>(
    date: Date,
    tz: Tz,
    mode: WriteMode,
    source: &S,
    store: &R,
) -> Result<DayOutcome> {
    let raw = fetch_day(source, date).await;
    let metrics = normalize(date, &raw);
    if !metrics.is_ingestable() {
        return Ok(DayOutcome::NoSleep);
    }

    if DedupGate::new(store).exists(metrics.date).await? {
        return Ok(DayOutcome::AlreadyExists { date: metrics.date });
    }

    let row = project(&metrics, tz);
    if mode == WriteMode::DryRun {
        let columns: Map<String, Value> = row
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&columns)?);
        return Ok(DayOutcome::DryRun { date: metrics.date });
    }

    store
        .create_row(&row)
        .await
        .context("row creation failed")?;
    Ok(DayOutcome::Written { date: metrics.date })
}

/// Syncs every date in `dates`, one at a time. A failing date is reported
/// and the run moves on to the next one.
pub async fn health_sync<S: MetricsSource, R: RowStore>(
    dates: &[Date],
    tz: Tz,
    mode: WriteMode,
    source: &S,
    store: &R,
) -> Vec<DayReport> {
    let mut reports = Vec::with_capacity(dates.len());
    for &date in dates {
        let outcome = match sync_day(date, tz, mode, source, store).await {
            Ok(outcome) => outcome,
            Err(e) => DayOutcome::Failed(format!("{e:#}")),
        };
        info!("{}: {outcome}", iso_date(date));
        reports.push(DayReport {
            requested: date,
            outcome,
        });
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::DATE_KEY_COLUMN;
    use crate::test_support::{FakeSource, FakeStore};
    use notion_light::PropertyValue;
    use serde_json::json;
    use time::macros::date;

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    fn sleep_on(calendar_date: &str, deep: u64, light: u64, rem: u64) -> Value {
        json!({
            "dailySleepDTO": {
                "calendarDate": calendar_date,
                "deepSleepSeconds": deep,
                "lightSleepSeconds": light,
                "remSleepSeconds": rem,
                "awakeSleepSeconds": 900
            }
        })
    }

    fn three_nights() -> FakeSource {
        FakeSource::new()
            .with(Category::Sleep, date!(2024 - 03 - 04), sleep_on("2024-03-04", 3600, 7200, 1800))
            .with(Category::Sleep, date!(2024 - 03 - 05), sleep_on("2024-03-05", 3600, 10800, 1800))
            .with(Category::Sleep, date!(2024 - 03 - 06), sleep_on("2024-03-06", 1800, 9000, 3600))
    }

    fn window() -> Vec<Date> {
        vec![date!(2024 - 03 - 04), date!(2024 - 03 - 05), date!(2024 - 03 - 06)]
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let day = date!(2024 - 03 - 05);
        let source = FakeSource::new()
            .with(Category::Sleep, day, sleep_on("2024-03-05", 3600, 10800, 1800))
            .with(Category::Hydration, day, json!({"valueInML": 2000.0}))
            .with(
                Category::Summary,
                day,
                json!({"totalKilocalories": 2200, "consumedKilocalories": 2500}),
            );
        let store = FakeStore::new();

        let reports = health_sync(&[day], BERLIN, WriteMode::Create, &source, &store).await;
        assert_eq!(
            reports,
            vec![DayReport {
                requested: day,
                outcome: DayOutcome::Written { date: day }
            }]
        );

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["Total Sleep (h)"], PropertyValue::Number(4.5));
        assert_eq!(row["Hydration (ml)"], PropertyValue::Number(2000.0));
        assert_eq!(
            row["Calorie Surplus"],
            PropertyValue::RichText("300 (14%)".to_owned())
        );
        assert_eq!(
            row[DATE_KEY_COLUMN],
            PropertyValue::Date("2024-03-05".to_owned())
        );
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let source = three_nights();
        let store = FakeStore::new();

        health_sync(&window(), BERLIN, WriteMode::Create, &source, &store).await;
        assert_eq!(store.rows().len(), 3);

        let second = health_sync(&window(), BERLIN, WriteMode::Create, &source, &store).await;
        assert_eq!(store.rows().len(), 3);
        assert!(second
            .iter()
            .all(|r| matches!(r.outcome, DayOutcome::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_zero_and_missing_sleep_are_skipped() {
        let source = FakeSource::new()
            .with(Category::Sleep, date!(2024 - 03 - 04), sleep_on("2024-03-04", 0, 0, 0))
            .with(Category::Hydration, date!(2024 - 03 - 05), json!({"valueInML": 500}));
        let store = FakeStore::new();

        let reports = health_sync(
            &[date!(2024 - 03 - 04), date!(2024 - 03 - 05)],
            BERLIN,
            WriteMode::Create,
            &source,
            &store,
        )
        .await;

        assert!(store.rows().is_empty());
        assert!(reports.iter().all(|r| r.outcome == DayOutcome::NoSleep));
        // Nothing to write means nothing to look up either.
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_category_failure_is_isolated() {
        let day = date!(2024 - 03 - 05);
        let source = three_nights()
            .with(Category::Hydration, day, json!({"valueInML": 1800}))
            .failing(Category::Summary, day)
            .failing(Category::Stress, date!(2024 - 03 - 04))
            .failing(Category::HeartRate, date!(2024 - 03 - 06));
        let store = FakeStore::new();

        let reports = health_sync(&window(), BERLIN, WriteMode::Create, &source, &store).await;
        assert!(reports
            .iter()
            .all(|r| matches!(r.outcome, DayOutcome::Written { .. })));

        let rows = store.rows();
        assert_eq!(rows.len(), 3);
        let written = rows
            .iter()
            .find(|row| row[DATE_KEY_COLUMN] == PropertyValue::Date("2024-03-05".to_owned()))
            .unwrap();
        assert_eq!(written["Hydration (ml)"], PropertyValue::Number(1800.0));
        assert!(!written.contains_key("Calories Burned"));
        assert!(!written.contains_key("Prior Day Stress"));

        // Every category was still attempted for the day whose summary failed.
        let calls = source.calls();
        for category in [
            Category::Sleep,
            Category::Summary,
            Category::Hydration,
            Category::HeartRate,
            Category::BodyComposition,
        ] {
            assert!(calls.contains(&(category, day)), "{category} not fetched");
        }
        assert!(calls.contains(&(Category::Stress, date!(2024 - 03 - 04))));
    }

    #[tokio::test]
    async fn test_failing_sleep_fetch_skips_day() {
        let source = three_nights().failing(Category::Sleep, date!(2024 - 03 - 05));
        let store = FakeStore::new();

        let reports = health_sync(&window(), BERLIN, WriteMode::Create, &source, &store).await;
        assert_eq!(reports[1].outcome, DayOutcome::NoSleep);
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_authoritative_date_comes_from_sleep_payload() {
        // Requested the 6th, Garmin files the night under the 5th.
        let source = FakeSource::new().with(
            Category::Sleep,
            date!(2024 - 03 - 06),
            sleep_on("2024-03-05", 3600, 3600, 3600),
        );
        let store = FakeStore::new().with_existing("2024-03-05");

        let reports = health_sync(
            &[date!(2024 - 03 - 06)],
            BERLIN,
            WriteMode::Create,
            &source,
            &store,
        )
        .await;
        assert_eq!(
            reports[0].outcome,
            DayOutcome::AlreadyExists {
                date: date!(2024 - 03 - 05)
            }
        );
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_does_not_write() {
        let source = three_nights();
        let store = FakeStore::new().failing_queries();

        let reports = health_sync(&window(), BERLIN, WriteMode::Create, &source, &store).await;
        assert!(store.rows().is_empty());
        for report in &reports {
            match &report.outcome {
                DayOutcome::Failed(reason) => {
                    assert!(reason.contains("existing-row lookup failed"), "{reason}");
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_write_failure_continues_with_next_day() {
        let source = three_nights();
        let store = FakeStore::new().failing_create_on("2024-03-05");

        let reports = health_sync(&window(), BERLIN, WriteMode::Create, &source, &store).await;
        assert!(matches!(reports[0].outcome, DayOutcome::Written { .. }));
        assert!(matches!(
            &reports[1].outcome,
            DayOutcome::Failed(reason) if reason.contains("row creation failed")
        ));
        assert!(matches!(reports[2].outcome, DayOutcome::Written { .. }));
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let source = three_nights();
        let store = FakeStore::new().with_existing("2024-03-05");

        let reports = health_sync(&window(), BERLIN, WriteMode::DryRun, &source, &store).await;
        assert_eq!(
            reports.iter().map(|r| r.outcome.clone()).collect::<Vec<_>>(),
            vec![
                DayOutcome::DryRun {
                    date: date!(2024 - 03 - 04)
                },
                DayOutcome::AlreadyExists {
                    date: date!(2024 - 03 - 05)
                },
                DayOutcome::DryRun {
                    date: date!(2024 - 03 - 06)
                },
            ]
        );
        // Only the pre-existing row; the dedup lookup still ran for every night.
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.queries(), 3);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            DayOutcome::Written {
                date: date!(2024 - 03 - 05)
            }
            .to_string(),
            "written (2024-03-05)"
        );
        assert_eq!(DayOutcome::NoSleep.to_string(), "skipped — no sleep recorded");
        assert_eq!(
            DayOutcome::DryRun {
                date: date!(2024 - 03 - 05)
            }
            .to_string(),
            "dry run — row not written (2024-03-05)"
        );
        assert_eq!(
            DayOutcome::Failed("timeout".to_owned()).to_string(),
            "failed — timeout"
        );
    }
}
