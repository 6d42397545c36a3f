//! HTTP client for the notification-source API.
//!
//! - `GET {base}/notifications?timestamp=T` -> notification list
//! - `GET {base}/notifications/poll?timestamp=T` -> `{"hasNewNotifications": bool}`

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::NotificationSource;
use crate::error::SourceError;
use crate::notification::{collect_lenient, NotificationSet};
use crate::storage::ApiConfig;

/// reqwest-backed [`NotificationSource`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    snapshot_url: Url,
    poll_url: Url,
    long_poll_timeout: Duration,
}

impl HttpSource {
    /// Build from the `[api]` config table.
    pub fn new(api: &ApiConfig) -> Result<Self, SourceError> {
        let base = base_url(&api.base_url)?;
        let snapshot_url = base.join("notifications")?;
        let poll_url = base.join("notifications/poll")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| SourceError::NetworkUnavailable {
                endpoint: base.to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            snapshot_url,
            poll_url,
            long_poll_timeout: Duration::from_secs(api.long_poll_timeout_secs.max(1)),
        })
    }

    pub fn snapshot_url(&self) -> &Url {
        &self.snapshot_url
    }

    pub fn poll_url(&self) -> &Url {
        &self.poll_url
    }

    async fn get_json(&self, url: &Url, timeout: Option<Duration>) -> Result<Value, SourceError> {
        let endpoint = url.path().to_string();
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::NetworkUnavailable {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| SourceError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}

impl NotificationSource for HttpSource {
    async fn fetch_snapshot(&self, since: DateTime<Utc>) -> Result<NotificationSet, SourceError> {
        let url = tagged(&self.snapshot_url, since);
        let body = self.get_json(&url, None).await?;
        let items = notification_items(body).ok_or_else(|| SourceError::Decode {
            endpoint: url.path().to_string(),
            message: "expected a notification array".into(),
        })?;
        let set = collect_lenient(items);
        tracing::debug!(count = set.len(), "snapshot fetched");
        Ok(set)
    }

    async fn poll_for_change(&self, since: DateTime<Utc>) -> Result<bool, SourceError> {
        let url = tagged(&self.poll_url, since);
        let body = self.get_json(&url, Some(self.long_poll_timeout)).await?;
        match body {
            Value::Object(map) => Ok(map
                .get("hasNewNotifications")
                .and_then(Value::as_bool)
                .unwrap_or(false)),
            _ => Err(SourceError::Decode {
                endpoint: url.path().to_string(),
                message: "expected an object".into(),
            }),
        }
    }
}

/// Parse the base URL and make sure relative joins append to its path.
fn base_url(raw: &str) -> Result<Url, SourceError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn tagged(url: &Url, since: DateTime<Utc>) -> Url {
    let mut url = url.clone();
    url.query_pairs_mut()
        .append_pair("timestamp", &since.timestamp_millis().to_string());
    url
}

/// Accept a bare array or an object wrapping it.
fn notification_items(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("notifications").or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}
