//! In-memory collaborators for exercising the sync without a network.

use crate::collaborators::{Category, MetricsSource, RowStore};
use crate::metrics::iso_date;
use crate::projection::DATE_KEY_COLUMN;
use anyhow::{bail, Result};
use async_trait::async_trait;
use notion_light::{Properties, PropertyValue};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use time::Date;

#[derive(Default)]
pub struct FakeSource {
    payloads: HashMap<(Category, Date), Value>,
    failures: HashSet<(Category, Date)>,
    calls: Mutex<Vec<(Category, Date)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: Category, date: Date, payload: Value) -> Self {
        self.payloads.insert((category, date), payload);
        self
    }

    pub fn failing(mut self, category: Category, date: Date) -> Self {
        self.failures.insert((category, date));
        self
    }

    pub fn calls(&self) -> Vec<(Category, Date)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn fetch(&self, category: Category, date: Date) -> Result<Value> {
        self.calls.lock().unwrap().push((category, date));
        if self.failures.contains(&(category, date)) {
            bail!("simulated {category} outage");
        }
        Ok(self
            .payloads
            .get(&(category, date))
            .cloned()
            .unwrap_or(Value::Null))
    }
}

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<Properties>>,
    queries: Mutex<usize>,
    fail_queries: bool,
    fail_create_on: Option<String>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(self, date: &str) -> Self {
        let mut row = Properties::new();
        row.insert(
            DATE_KEY_COLUMN.to_owned(),
            PropertyValue::Date(date.to_owned()),
        );
        self.rows.lock().unwrap().push(row);
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_create_on(mut self, date: &str) -> Self {
        self.fail_create_on = Some(date.to_owned());
        self
    }

    pub fn rows(&self) -> Vec<Properties> {
        self.rows.lock().unwrap().clone()
    }

    pub fn queries(&self) -> usize {
        *self.queries.lock().unwrap()
    }
}

fn row_date(row: &Properties) -> Option<&str> {
    match row.get(DATE_KEY_COLUMN) {
        Some(PropertyValue::Date(date)) => Some(date.as_str()),
        _ => None,
    }
}

#[async_trait]
impl RowStore for FakeStore {
    async fn count_rows_on(&self, date: Date) -> Result<usize> {
        *self.queries.lock().unwrap() += 1;
        if self.fail_queries {
            bail!("simulated query timeout");
        }
        let key = iso_date(date);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row_date(row) == Some(key.as_str()))
            .count())
    }

    async fn create_row(&self, properties: &Properties) -> Result<()> {
        if let Some(failing) = &self.fail_create_on {
            if row_date(properties) == Some(failing.as_str()) {
                bail!("simulated validation error");
            }
        }
        self.rows.lock().unwrap().push(properties.clone());
        Ok(())
    }
}
