use crate::metrics::iso_date;
use crate::projection::DATE_KEY_COLUMN;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use garmin_connect_light::GarminClient;
use notion_light::{NotionClient, Properties};
use serde_json::Value;
use std::fmt;
use time::Date;

/// One independently fetched (and independently failing) class of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sleep,
    Stress,
    Summary,
    Hydration,
    HeartRate,
    BodyComposition,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sleep => "sleep",
            Self::Stress => "stress",
            Self::Summary => "summary",
            Self::Hydration => "hydration",
            Self::HeartRate => "heart rate",
            Self::BodyComposition => "body composition",
        };
        f.write_str(name)
    }
}

/// Read side: raw per-category payloads for a calendar date.
#[async_trait]
pub trait MetricsSource: Sync {
    async fn fetch(&self, category: Category, date: Date) -> Result<Value>;
}

/// Write side: a table with one row per synced night.
#[async_trait]
pub trait RowStore: Sync {
    /// Number of rows whose date key equals `date` exactly.
    async fn count_rows_on(&self, date: Date) -> Result<usize>;

    async fn create_row(&self, properties: &Properties) -> Result<()>;
}

#[async_trait]
impl MetricsSource for GarminClient {
    async fn fetch(&self, category: Category, date: Date) -> Result<Value> {
        let payload = match category {
            Category::Sleep => self.get_sleep_data(date).await?,
            Category::Stress => self.get_stress_data(date).await?,
            Category::Summary => self.get_user_summary(date).await?,
            Category::Hydration => self.get_hydration_data(date).await?,
            Category::HeartRate => self.get_heart_rates(date).await?,
            Category::BodyComposition => self.get_body_composition(date, date).await?,
        };
        Ok(payload)
    }
}

/// A Notion database used as the destination table.
pub struct NotionTable {
    client: NotionClient,
    database_id: String,
    icon: String,
}

impl NotionTable {
    pub fn new(client: NotionClient, database_id: String, icon: String) -> Self {
        Self {
            client,
            database_id,
            icon,
        }
    }

    /// Confirms the token can read the database and that it has the date
    /// column rows are keyed on. Run once before any sync work.
    pub async fn verify(&self) -> Result<()> {
        let database = self
            .client
            .retrieve_database(&self.database_id)
            .await
            .context("Notion rejected the token or database ID")?;
        if !database.properties.contains_key(DATE_KEY_COLUMN) {
            bail!("Notion database has no '{DATE_KEY_COLUMN}' column");
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for NotionTable {
    async fn count_rows_on(&self, date: Date) -> Result<usize> {
        let pages = self
            .client
            .query_by_date(&self.database_id, DATE_KEY_COLUMN, &iso_date(date))
            .await?;
        Ok(pages.len())
    }

    async fn create_row(&self, properties: &Properties) -> Result<()> {
        let icon = Some(self.icon.as_str()).filter(|icon| !icon.is_empty());
        self.client
            .create_page(&self.database_id, icon, properties)
            .await?;
        Ok(())
    }
}
