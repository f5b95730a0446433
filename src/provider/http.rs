//! Provider that reads pool counts from an HTTP endpoint.
//!
//! Recognised configuration keys:
//!
//! | Key          | Type   | Required | Meaning                                   |
//! |--------------|--------|----------|-------------------------------------------|
//! | `url`        | string | yes      | GET endpoint returning the counts as JSON |
//! | `health_url` | string | no       | probe endpoint, defaults to `url`         |
//! | `timeout_ms` | number | no       | per-request timeout, default 5000         |
//!
//! The endpoint must answer with
//! `{"validCount": .., "invalidCount": .., "coolingCount": .., "totalCount": ..}`;
//! snake_case field names are accepted too.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ProviderDescriptor, StatusProvider};
use crate::domain::{Counts, PoolId, ProviderConfig, SnapshotCandidate};
use crate::error::ProviderError;

/// Registration identifier of the HTTP provider.
pub const ID: &str = "http";

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountsBody {
    #[serde(alias = "valid_count")]
    valid_count: i64,
    #[serde(alias = "invalid_count")]
    invalid_count: i64,
    #[serde(alias = "cooling_count")]
    cooling_count: i64,
    #[serde(alias = "total_count")]
    total_count: i64,
    #[serde(default, alias = "recorded_at", alias = "recordTime")]
    recorded_at: Option<i64>,
    #[serde(default)]
    remarks: Option<String>,
}

/// Fetches counts with a GET request per poll.
#[derive(Debug, Clone, Default)]
pub struct HttpProvider {
    client: reqwest::Client,
}

impl HttpProvider {
    /// Creates the provider with a fresh connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the provider around an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn required_str<'a>(config: &'a ProviderConfig, key: &str) -> Result<&'a str, ProviderError> {
    config
        .get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ProviderError::InvalidConfig(format!("missing string key `{key}`")))
}

fn request_timeout(config: &ProviderConfig) -> Duration {
    Duration::from_millis(
        config
            .get("timeout_ms")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS),
    )
}

fn classify(err: &reqwest::Error, url: &str) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(format!("{url}: {err}"))
    } else if err.is_decode() {
        ProviderError::MalformedResult(format!("{url}: {err}"))
    } else {
        ProviderError::Connection(format!("{url}: {err}"))
    }
}

#[async_trait]
impl StatusProvider for HttpProvider {
    async fn fetch_status(
        &self,
        pool_id: PoolId,
        pool_name: &str,
        config: &ProviderConfig,
    ) -> Result<SnapshotCandidate, ProviderError> {
        let url = required_str(config, "url")?;
        tracing::debug!(%pool_id, pool_name, url, "fetching pool counts");

        let response = self
            .client
            .get(url)
            .timeout(request_timeout(config))
            .send()
            .await
            .map_err(|e| classify(&e, url))?
            .error_for_status()
            .map_err(|e| classify(&e, url))?;

        let body: CountsBody = response.json().await.map_err(|e| classify(&e, url))?;
        Ok(SnapshotCandidate {
            counts: Counts::new(
                body.valid_count,
                body.invalid_count,
                body.cooling_count,
                body.total_count,
            ),
            recorded_at: body.recorded_at,
            remarks: body.remarks,
        })
    }

    async fn check_connection(&self, config: &ProviderConfig) -> Result<bool, ProviderError> {
        let url = match required_str(config, "health_url") {
            Ok(url) => url,
            Err(_) => required_str(config, "url")?,
        };
        let response = self
            .client
            .get(url)
            .timeout(request_timeout(config))
            .send()
            .await
            .map_err(|e| classify(&e, url))?;
        Ok(response.status().is_success())
    }

    fn describe(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: ID.to_string(),
            description: "Reads pool counts as JSON from the HTTP endpoint in `url`".to_string(),
        }
    }
}
