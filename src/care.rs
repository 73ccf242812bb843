use crate::model::{CareCategory, CareEvent, CareRecord, DogCareStatus, Notification};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, instrument, warn};

const STATUS_PATH: &str = "rest/v1/daily_care_status?select=*";
const CARE_LOGS_PATH: &str = "rest/v1/care_logs";
const EVENTS_PATH: &str = "rest/v1/events?select=title,description,status";

/// The hosted database operations the care board depends on.
#[async_trait]
pub trait CareService: Send + Sync {
    async fn fetch_daily_status(&self) -> Result<Vec<DogCareStatus>>;

    async fn record_care(&self, record: &CareRecord) -> Result<()>;

    async fn fetch_events(&self) -> Result<Vec<CareEvent>>;
}

/// PostgREST-style JSON client for the hosted database.
#[derive(Clone)]
pub struct HttpCareClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for HttpCareClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCareClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpCareClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).context("invalid api.base_url")?;
        let http = Client::builder()
            .user_agent("kennel-care/0.1")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path {path}"))?;
        let mut req = self
            .http
            .request(method, endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json");
        if let Some(body) = body {
            req = req.header("Prefer", "return=minimal").json(body);
        }
        req.build().context("failed to build request")
    }

    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        debug!(method=%request.method(), url=%request.url(), "sending request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach care database")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from care database: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("care database error {}: {}", status, body));
        }
        Ok(res)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.build_request(Method::GET, path, None)?;
        let res = self.send(request).await?;
        res.json().await.context("invalid care database response")
    }
}

#[async_trait]
impl CareService for HttpCareClient {
    async fn fetch_daily_status(&self) -> Result<Vec<DogCareStatus>> {
        self.get_json(STATUS_PATH).await
    }

    async fn record_care(&self, record: &CareRecord) -> Result<()> {
        let body = serde_json::to_value(record).context("failed to encode care record")?;
        let request = self.build_request(Method::POST, CARE_LOGS_PATH, Some(&body))?;
        self.send(request).await?;
        Ok(())
    }

    async fn fetch_events(&self) -> Result<Vec<CareEvent>> {
        self.get_json(EVENTS_PATH).await
    }
}

/// Record one care entry and turn the outcome into a notification.
#[instrument(skip_all, fields(dog_id = %dog_id, category = %category))]
pub async fn log_care(
    service: &dyn CareService,
    dog_id: &str,
    category: CareCategory,
    at: DateTime<Utc>,
    notes: Option<&str>,
) -> Notification {
    let record = CareRecord::new(dog_id, category, at, notes);
    match service.record_care(&record).await {
        Ok(()) => {
            info!("care recorded");
            Notification::success("Care logged", format!("{category} recorded"))
        }
        Err(err) => {
            warn!(?err, "failed to record care");
            Notification::error("Error", format!("Failed to record {category}"))
        }
    }
}

/// Log a potty break for every dog in `dog_ids`.
///
/// One call per dog, issued together and all awaited. Any failure yields a
/// single error notification; successes are not reported individually.
#[instrument(skip_all, fields(dogs = dog_ids.len()))]
pub async fn log_group_potty_break(
    service: &dyn CareService,
    dog_ids: &[String],
    at: DateTime<Utc>,
    notes: Option<&str>,
) -> Notification {
    if dog_ids.is_empty() {
        return Notification::error("Error", "Select at least one dog");
    }

    let records: Vec<CareRecord> = dog_ids
        .iter()
        .map(|id| CareRecord::new(id.as_str(), CareCategory::Potty, at, notes))
        .collect();
    let outcomes = join_all(records.iter().map(|r| service.record_care(r))).await;

    let failed: Vec<&str> = records
        .iter()
        .zip(&outcomes)
        .filter_map(|(rec, outcome)| match outcome {
            Ok(()) => None,
            Err(err) => {
                warn!(?err, dog_id = %rec.dog_id, "potty break not recorded");
                Some(rec.dog_id.as_str())
            }
        })
        .collect();

    if failed.is_empty() {
        info!("group potty break recorded");
        Notification::success(
            "Potty break logged",
            format!("Recorded for {} dogs", dog_ids.len()),
        )
    } else {
        warn!(failed = failed.len(), "group potty break failed");
        Notification::error("Error", "Failed to log group potty break")
    }
}
