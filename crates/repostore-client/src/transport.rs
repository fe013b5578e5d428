//! HTTP transport seam.
//!
//! The client never talks to `reqwest` directly; it hands a [`StoreRequest`] to
//! an [`HttpTransport`]. Production code uses [`ReqwestTransport`], tests swap
//! in a scripted fake.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// One HTTP exchange to perform against the remote store.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl StoreRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response as seen by the client: status, lower-cased headers and raw body.
#[derive(Debug, Clone, Default)]
pub struct StoreResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl StoreResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserialize the body.
    pub fn json<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_str(&self.body).map_err(StoreError::from)
    }
}

/// Performs a single HTTP exchange. No retries, no classification.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &StoreRequest) -> StoreResult<StoreResponse>;
}

/// Transport backed by a pooled `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Build a tuned HTTP client from the store configuration.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .user_agent(concat!("repostore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http })
    }

    pub fn from_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &StoreRequest) -> StoreResult<StoreResponse> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(StoreResponse {
            status,
            headers,
            body,
        })
    }
}
