use anyhow::{bail, Context, Result};
use clap::Parser;
use collaborators::NotionTable;
use config::{today_in, Config};
use garmin_connect_light::{GarminClient, GarminCredentials};
use health_sync::{health_sync, DayOutcome, DayReport, WriteMode};
use log::warn;
use metrics::iso_date;
use notion_light::NotionClient;
use std::path::PathBuf;
mod collaborators;
mod config;
mod dedup;
mod fields;
mod health_sync;
mod key;
mod metrics;
mod projection;
#[cfg(test)]
mod test_support;

/// Mirror nightly Garmin sleep and wellness metrics into a Notion database.
#[derive(Parser)]
struct Cli {
    /// Config file; defaults to ./config.toml when present.
    config: Option<PathBuf>,

    /// First day to sync (YYYY-MM-DD), overrides sync.start_date.
    #[arg(long)]
    start_date: Option<String>,

    /// Number of days to sync, overrides sync.days.
    #[arg(long)]
    days: Option<u32>,

    /// Print the rows that would be created instead of writing them.
    #[arg(long)]
    dry_run: bool,
}

fn print_report(reports: &[DayReport]) -> usize {
    let mut failed = 0;
    for report in reports {
        let icon = match report.outcome {
            DayOutcome::Written { .. } => "🆕",
            DayOutcome::DryRun { .. } => "👀",
            DayOutcome::AlreadyExists { .. } => "✅",
            DayOutcome::NoSleep => "⏭️",
            DayOutcome::Failed(_) => {
                failed += 1;
                "❌"
            }
        };
        println!("  {icon} {}: {}", iso_date(report.requested), report.outcome);
    }

    let written = reports
        .iter()
        .filter(|r| matches!(r.outcome, DayOutcome::Written { .. }))
        .count();
    println!(
        "  {written} written, {} skipped, {failed} failed",
        reports.len() - written - failed
    );
    failed
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {e}");
        }
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.start_date.is_some() {
        config.sync.start_date = cli.start_date;
    }
    if let Some(days) = cli.days {
        config.sync.days = days;
    }

    let tz = config.sync.timezone()?;
    let timeout = config.sync.request_timeout()?;
    let window = config.sync.window(today_in(tz)?)?;
    let secrets = config.resolve_secrets()?;

    let notion = NotionClient::new(secrets.notion_token, timeout)?
        .with_url(config.notion.api_url.clone());
    let table = NotionTable::new(notion, secrets.notion_database_id, config.notion.icon);
    table.verify().await.context("Notion authentication failed")?;

    let credentials = GarminCredentials {
        email: secrets.garmin_email,
        password: secrets.garmin_password,
    };
    let mut garmin = GarminClient::new(credentials, timeout)?
        .with_urls(config.garmin.sso_url.clone(), config.garmin.api_url.clone());
    garmin.login().await.context("Garmin login failed")?;

    println!("🛌 health-sync");
    let mode = if cli.dry_run {
        WriteMode::DryRun
    } else {
        WriteMode::Create
    };
    let reports = health_sync(&window.dates(), tz, mode, &garmin, &table).await;
    let failed = print_report(&reports);

    if failed > 0 {
        bail!("{failed} of {} dates failed", reports.len());
    }
    Ok(())
}
