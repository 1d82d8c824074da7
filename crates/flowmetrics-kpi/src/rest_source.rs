//! PostgREST-compatible HTTP row source with connection pooling and rate
//! limiting.
//!
//! Speaks the Supabase flavour of PostgREST: `rest/v1/{table}` endpoints,
//! `apikey` plus bearer authentication, exact counts via `Content-Range`.

use crate::query::Query;
use crate::traits::RowSource;
use async_trait::async_trait;
use flowmetrics_common::{FlowMetricsError, Result};
use flowmetrics_config::BackendConfig;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Rows requested per page when selecting.
pub const PAGE_SIZE: usize = 1000;

/// HTTP row source.
#[derive(Debug, Clone)]
pub struct RestSource {
    client: Client,
    base_url: Url,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl RestSource {
    /// Creates a client for the backend described by `config`.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            FlowMetricsError::config_with_source(format!("Invalid backend URL '{}'", config.url), e)
        })?;

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| FlowMetricsError::config_with_source("Invalid API key", e))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| FlowMetricsError::config_with_source("Invalid API key", e))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .default_headers(headers)
            .build()
            .map_err(|e| FlowMetricsError::network_with_source("Failed to create HTTP client", e))?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.rate_limit_per_sec)
                .ok_or_else(|| FlowMetricsError::config("Rate limit must be greater than 0"))?,
        );

        Ok(Self {
            client,
            base_url,
            rate_limiter: Arc::new(DefaultDirectRateLimiter::direct(quota)),
        })
    }

    /// `{base}/rest/v1/{table}`
    pub fn endpoint(&self, query: &Query) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FlowMetricsError::config("Backend URL cannot be a base"))?
            .pop_if_empty()
            .extend(["rest", "v1", query.table.name()]);
        Ok(url)
    }

    fn request(&self, method: Method, query: &Query) -> Result<RequestBuilder> {
        let url = self.endpoint(query)?;
        let mut params = vec![("select".to_string(), query.select_param())];
        params.extend(query.filters.iter().map(|f| f.to_query_pair()));
        Ok(self.client.request(method, url).query(&params))
    }

    /// One ordered page of a select, asking for the exact total.
    fn page_request(&self, query: &Query, offset: usize) -> Result<RequestBuilder> {
        Ok(self
            .request(Method::GET, query)?
            .query(&[
                ("order", query.table.order_key().to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ])
            .header("Prefer", "count=exact"))
    }

    async fn send(&self, query: &Query, request: RequestBuilder) -> Result<Response> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(table = %query.table, "Request timed out");
            }
            FlowMetricsError::network_with_source(format!("Request to {} failed", query.table), e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(table = %query.table, %status, "Backend request succeeded");
            Ok(response)
        } else {
            error!(table = %query.table, %status, "Backend returned an error");
            Err(FlowMetricsError::backend_with_status(
                format!("{} returned {status}", query.table),
                status.as_u16(),
            ))
        }
    }
}

fn content_range_total(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_range)
}

/// Whether another page must be requested after `fetched` rows, the last
/// page holding `page_len` of them.
///
/// Servers may cap pages below [`PAGE_SIZE`], so a short page only ends the
/// read when the counted total is reached or is unknown.
pub fn has_more_pages(fetched: usize, page_len: usize, total: Option<u64>) -> bool {
    if page_len == 0 {
        return false;
    }
    match total {
        Some(total) => (fetched as u64) < total,
        None => page_len >= PAGE_SIZE,
    }
}

/// Reads the total from a `Content-Range` value such as `0-24/3573` or
/// `*/0`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

#[async_trait]
impl RowSource for RestSource {
    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn count(&self, query: &Query) -> Result<u64> {
        let request = self
            .request(Method::HEAD, query)?
            .header("Prefer", "count=exact");
        let response = self.send(query, request).await?;

        content_range_total(&response).ok_or_else(|| {
            FlowMetricsError::query(query.table.name(), "response carried no Content-Range total")
        })
    }

    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let mut rows = Vec::new();
        let mut total = None;

        loop {
            let request = self.page_request(query, rows.len())?;
            let response = self.send(query, request).await?;
            if total.is_none() {
                total = content_range_total(&response);
            }
            let page: Vec<Value> = response.json().await.map_err(|e| {
                FlowMetricsError::network_with_source(
                    format!("Cannot decode rows of {}", query.table),
                    e,
                )
            })?;

            let page_len = page.len();
            rows.extend(page);
            if !has_more_pages(rows.len(), page_len, total) {
                break;
            }
        }

        if let Some(expected) = total {
            if (rows.len() as u64) < expected {
                warn!(rows = rows.len(), expected, "Backend returned fewer rows than counted");
            }
        }
        debug!(rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
