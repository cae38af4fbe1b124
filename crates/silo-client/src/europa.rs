use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use silo_core::config::{HttpConfig, SearchQuery};
use silo_core::error::AppError;
use silo_core::models::RawRecord;
use silo_core::SearchSource;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Envelope of a data.europa.eu hub search response.
///
/// The hub wraps results like this:
/// ```json
/// {
///     "success": true,
///     "result": { "count": 42, "results": [ ... ] }
/// }
/// ```
#[derive(Deserialize, Debug)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    pub result: SearchResult,
}

/// The `result` member of a [`SearchEnvelope`].
#[derive(Deserialize, Debug)]
pub struct SearchResult {
    /// Total number of matches, not just the returned page.
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub results: Vec<RawRecord>,
}

/// HTTP client for the data.europa.eu search API.
///
/// Issues a single GET per call: no retries and no pagination beyond the
/// requested page.
///
/// # Examples
///
/// ```no_run
/// use silo_client::SearchClient;
/// use silo_core::SearchQuery;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SearchClient::new("https://data.europa.eu/api/hub/search/search")?;
/// let records = client.fetch_records(&SearchQuery::default()).await?;
/// println!("Found {} datasets", records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl SearchClient {
    /// Creates a client with the default [`HttpConfig`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the endpoint is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(endpoint: &str) -> Result<Self, AppError> {
        Self::with_config(endpoint, &HttpConfig::default())
    }

    pub fn with_config(endpoint: &str, config: &HttpConfig) -> Result<Self, AppError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| AppError::InvalidUrl(format!("Invalid search endpoint: {}", endpoint)))?;

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout: config.timeout,
        })
    }

    /// Full request URL for `query`.
    pub fn search_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(query.query_pairs());
        url
    }

    /// Fetches the response body as untyped JSON.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnexpectedStatus` with the status code and body text
    /// for any response other than `200 OK`.
    pub async fn fetch_raw(&self, query: &SearchQuery) -> Result<Value, AppError> {
        let url = self.search_url(query);
        debug!("GET {}", url);

        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.map_or(0, |t| t.as_secs()))
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AppError::ClientError(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        parse_body(status, &body)
    }

    /// Fetches one page and returns the records under `result.results`.
    pub async fn fetch_records(&self, query: &SearchQuery) -> Result<Vec<RawRecord>, AppError> {
        let body = self.fetch_raw(query).await?;
        extract_records(body)
    }
}

/// Parses a response body. Only `200 OK` counts as success; any other
/// status, including other 2xx codes, is returned as `UnexpectedStatus`.
pub fn parse_body(status: StatusCode, body: &str) -> Result<Value, AppError> {
    if status != StatusCode::OK {
        return Err(AppError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    Ok(serde_json::from_str(body)?)
}

/// Pulls the record list out of a response body.
pub fn extract_records(body: Value) -> Result<Vec<RawRecord>, AppError> {
    let envelope: SearchEnvelope = serde_json::from_value(body)?;
    if envelope.success == Some(false) {
        return Err(AppError::ClientError(
            "Search API returned success: false".to_string(),
        ));
    }
    debug!(
        "Search matched {} datasets, {} returned",
        envelope.result.count.unwrap_or_default(),
        envelope.result.results.len()
    );
    Ok(envelope.result.results)
}

#[async_trait]
impl SearchSource for SearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawRecord>, AppError> {
        self.fetch_records(query).await
    }
}
