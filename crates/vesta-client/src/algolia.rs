use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;
use vesta_core::error::AppError;
use vesta_core::{HttpConfig, SearchIndexApi, SearchRecord};

use crate::http::{endpoint, parse_base_url, send_error, status_error};

/// HTTP client for the Algolia REST API.
///
/// Only the write-side calls the sync pipeline needs are implemented: reading and writing
/// index settings, and putting or deleting single records by object id.
///
/// # Examples
///
/// ```no_run
/// use vesta_client::AlgoliaClient;
/// use vesta_core::{HttpConfig, SearchIndexApi};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AlgoliaClient::new("APPID", "write-key", &HttpConfig::default())?;
/// let exists = client.get_settings("products").await?.is_some();
/// println!("index exists: {}", exists);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AlgoliaClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl AlgoliaClient {
    /// Creates a client for the application's default host, `https://{app_id}.algolia.net`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the credentials are not valid header values.
    pub fn new(app_id: &str, api_key: &str, http: &HttpConfig) -> Result<Self, AppError> {
        let base_url = format!("https://{}.algolia.net", app_id);
        Self::with_base_url(&base_url, app_id, api_key, http)
    }

    /// Creates a client talking to an explicit host.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if `base_url` is malformed.
    /// Returns `AppError::ConfigError` if the credentials are not valid header values.
    pub fn with_base_url(
        base_url: &str,
        app_id: &str,
        api_key: &str,
        http: &HttpConfig,
    ) -> Result<Self, AppError> {
        let base_url = parse_base_url(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert("X-Algolia-Application-Id", header_value(app_id, "application id")?);
        let mut key = header_value(api_key, "API key")?;
        key.set_sensitive(true);
        headers.insert("X-Algolia-API-Key", key);

        let client = Client::builder()
            .user_agent("Vesta/0.1 (catalog-sync)")
            .default_headers(headers)
            .timeout(http.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: http.timeout.as_secs(),
        })
    }

    fn index_url(&self, index: &str, rest: &[&str]) -> Result<Url, AppError> {
        let mut segments = vec!["1", "indexes", index];
        segments.extend_from_slice(rest);
        endpoint(&self.base_url, &segments)
    }

    async fn check(
        &self,
        resp: Result<Response, reqwest::Error>,
        what: &str,
    ) -> Result<Response, AppError> {
        let resp = resp.map_err(|e| send_error(e, self.timeout_secs))?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(status_error(resp, what).await)
        }
    }
}

fn header_value(raw: &str, what: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(raw)
        .map_err(|_| AppError::ConfigError(format!("Algolia {} contains invalid characters", what)))
}

#[async_trait]
impl SearchIndexApi for AlgoliaClient {
    async fn get_settings(&self, index: &str) -> Result<Option<Value>, AppError> {
        let url = self.index_url(index, &["settings"])?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(index, "Index does not exist");
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(status_error(resp, &format!("index {}", index)).await);
        }

        let settings = resp.json().await.map_err(|e| {
            AppError::InvalidResponse(format!("settings of index {}: {}", index, e))
        })?;
        Ok(Some(settings))
    }

    async fn set_settings(
        &self,
        index: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let url = self.index_url(index, &["settings"])?;
        let resp = self.client.put(url).json(settings).send().await;
        self.check(resp, &format!("index {}", index)).await?;
        Ok(())
    }

    async fn put_record(&self, index: &str, record: &SearchRecord) -> Result<(), AppError> {
        let url = self.index_url(index, &[record.object_id.as_str()])?;
        let resp = self.client.put(url).json(record).send().await;
        self.check(resp, &format!("record {}", record.object_id)).await?;
        Ok(())
    }

    async fn delete_record(&self, index: &str, object_id: &str) -> Result<(), AppError> {
        let url = self.index_url(index, &[object_id])?;
        let resp = self.client.delete(url).send().await;
        self.check(resp, &format!("record {}", object_id)).await?;
        Ok(())
    }
}
