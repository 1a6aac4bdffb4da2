use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Notion API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// A typed database property value, serialized in the shape Notion expects
/// when creating a page.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Number(f64),
    Select(String),
    /// A single calendar date or instant, ISO-8601.
    Date(String),
    /// A start/end pair of ISO-8601 instants.
    DateRange { start: String, end: Option<String> },
}

impl PropertyValue {
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Title(text) => json!({ "title": [{ "text": { "content": text } }] }),
            Self::RichText(text) => json!({ "rich_text": [{ "text": { "content": text } }] }),
            Self::Number(number) => json!({ "number": number }),
            Self::Select(name) => json!({ "select": { "name": name } }),
            Self::Date(start) => json!({ "date": { "start": start } }),
            Self::DateRange { start, end } => json!({ "date": { "start": start, "end": end } }),
        }
    }
}

/// Column name to value, one entry per property written.
pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub id: String,
    /// Column name to raw property schema.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// A lightweight Notion client covering database queries and page creation.
pub struct NotionClient {
    client: Client,
    token: String,
    url: String,
}

impl NotionClient {
    /// Creates a client whose requests all carry `timeout`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(token: String, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            url: DEFAULT_API_URL.to_owned(),
        })
    }

    #[must_use]
    pub fn with_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.url = url.trim_end_matches('/').to_owned();
        }
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Retrieves a database's metadata. Doubles as a credentials check: a bad
    /// token or an unshared database fails here.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or Notion answers with a
    /// non-success status (401 for a bad token, 404 for an unknown or
    /// unshared database).
    pub async fn retrieve_database(&self, database_id: &str) -> Result<Database, Error> {
        let response = self
            .client
            .get(format!("{}/databases/{database_id}", self.url))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Queries a database with a raw Notion filter object, following
    /// pagination until all matching pages are collected.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or Notion answers with a
    /// non-success status.
    pub async fn query_database(
        &self,
        database_id: &str,
        filter: &Value,
    ) -> Result<Vec<Page>, Error> {
        let path = format!("/databases/{database_id}/query");
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = Map::new();
            body.insert("filter".to_owned(), filter.clone());
            if let Some(cursor) = &cursor {
                body.insert("start_cursor".to_owned(), Value::String(cursor.clone()));
            }

            let response = self.post(&path).json(&body).send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let query: QueryResponse = response.json().await?;
            pages.extend(query.results);

            match query.next_cursor {
                Some(next) if query.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }

    /// Returns all pages whose date property `property` equals `date`
    /// (`YYYY-MM-DD`) exactly.
    ///
    /// # Errors
    /// See [`NotionClient::query_database`].
    pub async fn query_by_date(
        &self,
        database_id: &str,
        property: &str,
        date: &str,
    ) -> Result<Vec<Page>, Error> {
        let filter = json!({ "property": property, "date": { "equals": date } });
        self.query_database(database_id, &filter).await
    }

    /// Creates a page (row) in a database.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or Notion rejects the
    /// properties, e.g. because a column type does not match.
    pub async fn create_page(
        &self,
        database_id: &str,
        icon: Option<&str>,
        properties: &Properties,
    ) -> Result<Page, Error> {
        let properties: Map<String, Value> = properties
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();

        let mut body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        if let Some(emoji) = icon {
            body["icon"] = json!({ "type": "emoji", "emoji": emoji });
        }

        let response = self.post("/pages").json(&body).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }
}

async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_owned());
    Error::Api { status, message }
}
