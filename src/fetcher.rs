//! Retrieval of single pages from a paginated collection endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use url::Url;

/// A schema-less record, fields keep the order of the response body.
pub type Record = Map<String, Value>;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// One page of a collection together with the size of the whole collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub total_count: usize,
}

/// Errors that can occur while fetching a page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The configured endpoint is not a valid URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Connection or transfer failure.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The body is not a JSON array of objects.
    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Page, FetchError>;
}

/// Fetches pages over HTTP using `_page` / `_limit` query parameters.
#[derive(Debug, Clone)]
pub struct HttpSource {
    endpoint: String,
    client: Client,
    timeout: Option<Duration>,
}

impl HttpSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
            timeout: None,
        }
    }

    /// Upper bound for one page request, from connect to the end of the body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn page_url(&self, page: usize, page_size: usize) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut()
            .append_pair("_page", &page.to_string())
            .append_pair("_limit", &page_size.to_string());
        Ok(url)
    }
}

#[async_trait]
impl PageSource for HttpSource {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Page, FetchError> {
        let url = self.page_url(page, page_size)?;
        debug!("GET {url}");

        let mut request = self.client.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let total_count = parse_total_count(response.headers());
        let body = response.text().await?;
        let records = decode_records(&body)?;
        debug!("Received {} records, total count {total_count}", records.len());

        Ok(Page {
            records,
            total_count,
        })
    }
}

/// Missing or unparseable headers count as an empty collection.
pub fn parse_total_count(headers: &HeaderMap) -> usize {
    let Some(value) = headers.get(TOTAL_COUNT_HEADER) else {
        warn!("Response has no {TOTAL_COUNT_HEADER} header");
        return 0;
    };
    match value.to_str().ok().and_then(|s| s.trim().parse().ok()) {
        Some(count) => count,
        None => {
            warn!("Unparseable {TOTAL_COUNT_HEADER} header: {value:?}");
            0
        }
    }
}

pub fn decode_records(body: &str) -> Result<Vec<Record>, FetchError> {
    Ok(serde_json::from_str(body)?)
}
