//! REST implementation of the remote client.
//!
//! The actual HTTP library is abstracted via a trait so different
//! implementations (reqwest, ureq, a platform webview bridge) can be
//! plugged in without the engine caring.

use crate::remote::{CreatedRecord, RemoteClient, RemoteError, RemoteResult};
use chrono::{DateTime, SecondsFormat, Utc};
use medisync_model::{EntityType, RemoteRecord};
use serde_json::Value;
use std::time::Duration;

/// HTTP method for [`HttpClient::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual transport. The
/// implementation owns connection management and authentication
/// headers; a timeout or connection failure is reported through the
/// error string and classified as transient.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    ///
    /// `body`, when present, is a JSON document. The call must not
    /// take longer than `timeout`.
    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<HttpResponse, String>;
}

/// REST-style remote client.
///
/// Maps each entity type to its fixed path under a base URL, encodes
/// payloads as JSON, and classifies response statuses into the
/// transient/permanent error taxonomy.
pub struct RestClient<C: HttpClient> {
    base_url: String,
    client: C,
    timeout: Duration,
}

impl<C: HttpClient> RestClient<C> {
    /// Creates a new REST client.
    ///
    /// `base_url` must not end with a slash; entity paths provide one.
    /// `timeout` bounds each individual request.
    pub fn new(base_url: impl Into<String>, client: C, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client,
            timeout,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, entity: EntityType) -> String {
        format!("{}{}", self.base_url, entity.remote_path())
    }

    fn record_url(&self, entity: EntityType, remote_id: &str) -> String {
        format!("{}{}{}/", self.base_url, entity.remote_path(), remote_id)
    }

    fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
    ) -> RemoteResult<HttpResponse> {
        let encoded = match body {
            Some(value) => Some(
                serde_json::to_vec(value)
                    .map_err(|e| RemoteError::network(format!("failed to encode request: {e}")))?,
            ),
            None => None,
        };

        let response = self
            .client
            .request(method, url, encoded.as_deref(), self.timeout)
            .map_err(RemoteError::network)?;

        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            let detail = String::from_utf8_lossy(&response.body);
            Err(RemoteError::from_status(
                response.status,
                format!("{method:?} {url}: {detail}"),
            ))
        }
    }

    fn parse_body(body: &[u8]) -> RemoteResult<Value> {
        serde_json::from_slice(body)
            .map_err(|e| RemoteError::network(format!("failed to decode response: {e}")))
    }
}

impl<C: HttpClient> RemoteClient for RestClient<C> {
    fn create(&self, entity: EntityType, payload: &Value) -> RemoteResult<CreatedRecord> {
        let url = self.collection_url(entity);
        let response = self.send(HttpMethod::Post, &url, Some(payload))?;

        let body = Self::parse_body(&response.body)?;
        let record = RemoteRecord::from_json(body)
            .map_err(|e| RemoteError::network(format!("malformed create response: {e}")))?;

        Ok(CreatedRecord {
            remote_id: record.remote_id,
            payload: record.payload,
        })
    }

    fn update(&self, entity: EntityType, remote_id: &str, payload: &Value) -> RemoteResult<()> {
        let url = self.record_url(entity, remote_id);
        self.send(HttpMethod::Put, &url, Some(payload))?;
        Ok(())
    }

    fn delete(&self, entity: EntityType, remote_id: &str) -> RemoteResult<()> {
        let url = self.record_url(entity, remote_id);
        self.send(HttpMethod::Delete, &url, None)?;
        Ok(())
    }

    fn list_since(
        &self,
        entity: EntityType,
        since: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let url = match since {
            Some(since) => format!(
                "{}?updated_at__gte={}",
                self.collection_url(entity),
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            None => self.collection_url(entity),
        };

        let response = self.send(HttpMethod::Get, &url, None)?;
        let body = Self::parse_body(&response.body)?;

        // The server returns either a bare array or a paginated
        // envelope with a `results` array.
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(RemoteError::network(
                        "list response is neither an array nor a results envelope",
                    ))
                }
            },
            _ => {
                return Err(RemoteError::network(
                    "list response is neither an array nor a results envelope",
                ))
            }
        };

        items
            .into_iter()
            .map(|item| {
                RemoteRecord::from_json(item)
                    .map_err(|e| RemoteError::network(format!("malformed list item: {e}")))
            })
            .collect()
    }
}
