use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use time::macros::format_description;
use time::Date;

pub const DEFAULT_SSO_URL: &str = "https://sso.garmin.com";
pub const DEFAULT_API_URL: &str = "https://connectapi.garmin.com";

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Date formatting failed: {0}")]
    DateFormat(#[from] time::error::Format),

    #[error("Garmin API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Garmin authentication failed: {0}")]
    Auth(String),

    #[error("Not logged in, call login() first")]
    NotLoggedIn,
}

#[derive(Clone, Debug)]
pub struct GarminCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SocialProfile {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug)]
struct Session {
    access_token: String,
    display_name: String,
}

/// A lightweight Garmin Connect client for daily wellness data.
///
/// Every read returns the raw JSON payload. Garmin's wellness schema is
/// undocumented and drifts, so interpreting fields is left to the caller.
pub struct GarminClient {
    client: Client,
    credentials: GarminCredentials,
    sso_url: String,
    api_url: String,
    session: Option<Session>,
}

impl GarminClient {
    /// Creates a client whose requests all carry `timeout`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(credentials: GarminCredentials, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .user_agent("garmin-connect-light/0.1.0")
            .build()?;

        Ok(Self {
            client,
            credentials,
            sso_url: DEFAULT_SSO_URL.to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
            session: None,
        })
    }

    #[must_use]
    pub fn with_urls(mut self, sso_url: Option<String>, api_url: Option<String>) -> Self {
        if let Some(sso_url) = sso_url {
            self.sso_url = sso_url.trim_end_matches('/').to_owned();
        }
        if let Some(api_url) = api_url {
            self.api_url = api_url.trim_end_matches('/').to_owned();
        }
        self
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// Signs in with the configured credentials and opens an API session.
    ///
    /// The SSO sign-in yields a service ticket, which is exchanged for a
    /// bearer token. The display name needed by several wellness endpoints
    /// is fetched once here.
    ///
    /// # Errors
    /// Returns `Error::Auth` if the credentials are rejected or no ticket or
    /// token is issued, and `Error::Request` on transport failures.
    pub async fn login(&mut self) -> Result<(), Error> {
        let ticket = self.signin_ticket().await?;
        let access_token = self.exchange_ticket(&ticket).await?;
        let display_name = self.fetch_display_name(&access_token).await?;
        self.session = Some(Session {
            access_token,
            display_name,
        });
        Ok(())
    }

    async fn signin_ticket(&self) -> Result<String, Error> {
        let url = format!("{}/sso/signin", self.sso_url);
        let service = format!("{}/modern", self.api_url);
        let response = self
            .client
            .post(&url)
            .query(&[("service", service.as_str()), ("embed", "true")])
            .form(&[
                ("username", self.credentials.email.as_str()),
                ("password", self.credentials.password.as_str()),
                ("embed", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!("sign-in rejected with status {status}")));
        }

        let body = response.text().await?;
        extract_ticket(&body)
            .map(str::to_owned)
            .ok_or_else(|| Error::Auth("sign-in response did not contain a ticket".to_owned()))
    }

    async fn exchange_ticket(&self, ticket: &str) -> Result<String, Error> {
        let url = format!("{}/oauth-service/oauth/exchange/user/2.0", self.api_url);
        let response = self
            .client
            .post(&url)
            .form(&[("ticket", ticket)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "ticket exchange rejected with status {status}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn fetch_display_name(&self, access_token: &str) -> Result<String, Error> {
        let url = format!("{}/userprofile-service/socialProfile", self.api_url);
        let response = self.client.get(&url).bearer_auth(access_token).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Auth(format!("profile lookup rejected with status {status}")));
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let profile: SocialProfile = response.json().await?;
        Ok(profile.display_name)
    }

    fn session(&self) -> Result<&Session, Error> {
        self.session.as_ref().ok_or(Error::NotLoggedIn)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, Error> {
        let session = self.session()?;
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        // Garmin answers "no data for this day" with an empty 204.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| Error::Api {
            status: 200,
            message: format!("invalid JSON body: {e}"),
        })
    }

    /// Fetches the daily summary (calories, intensity minutes, steps, ...).
    ///
    /// # Errors
    /// Returns an error if not logged in, the request fails, or the API
    /// answers with a non-success status.
    pub async fn get_user_summary(&self, date: Date) -> Result<Value, Error> {
        let display_name = &self.session()?.display_name;
        let path = format!("/usersummary-service/usersummary/daily/{display_name}");
        self.get_json(&path, &[("calendarDate", format_date(date)?)])
            .await
    }

    /// Fetches the sleep session that Garmin files under `date`.
    ///
    /// # Errors
    /// See [`GarminClient::get_user_summary`].
    pub async fn get_sleep_data(&self, date: Date) -> Result<Value, Error> {
        let display_name = &self.session()?.display_name;
        let path = format!("/wellness-service/wellness/dailySleepData/{display_name}");
        self.get_json(
            &path,
            &[
                ("date", format_date(date)?),
                ("nonSleepBufferMinutes", "60".to_owned()),
            ],
        )
        .await
    }

    /// Fetches the all-day stress detail for `date`.
    ///
    /// # Errors
    /// See [`GarminClient::get_user_summary`].
    pub async fn get_stress_data(&self, date: Date) -> Result<Value, Error> {
        let path = format!("/wellness-service/wellness/dailyStress/{}", format_date(date)?);
        self.get_json(&path, &[]).await
    }

    /// Fetches logged hydration for `date`.
    ///
    /// # Errors
    /// See [`GarminClient::get_user_summary`].
    pub async fn get_hydration_data(&self, date: Date) -> Result<Value, Error> {
        let path = format!(
            "/usersummary-service/usersummary/hydration/daily/{}",
            format_date(date)?
        );
        self.get_json(&path, &[]).await
    }

    /// Fetches heart rate detail for `date`, including the trailing
    /// seven-day resting average.
    ///
    /// # Errors
    /// See [`GarminClient::get_user_summary`].
    pub async fn get_heart_rates(&self, date: Date) -> Result<Value, Error> {
        let display_name = &self.session()?.display_name;
        let path = format!("/wellness-service/wellness/dailyHeartRate/{display_name}");
        self.get_json(&path, &[("date", format_date(date)?)]).await
    }

    /// Fetches weigh-ins and body composition between `start` and `end`
    /// inclusive. Weights are reported in grams.
    ///
    /// # Errors
    /// See [`GarminClient::get_user_summary`].
    pub async fn get_body_composition(&self, start: Date, end: Date) -> Result<Value, Error> {
        self.get_json(
            "/weight-service/weight/dateRange",
            &[
                ("startDate", format_date(start)?),
                ("endDate", format_date(end)?),
            ],
        )
        .await
    }
}

fn format_date(date: Date) -> Result<String, Error> {
    Ok(date.format(format_description!("[year]-[month]-[day]"))?)
}

fn extract_ticket(body: &str) -> Option<&str> {
    let start = body.find("ticket=")? + "ticket=".len();
    let rest = &body[start..];
    let end = rest
        .find(|c: char| c == '"' || c == '&' || c == '\'' || c.is_whitespace())
        .unwrap_or(rest.len());
    let ticket = &rest[..end];
    (!ticket.is_empty()).then_some(ticket)
}

async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_owned());
    Error::Api { status, message }
}
