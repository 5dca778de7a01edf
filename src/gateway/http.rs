//! Shared HTTP plumbing: a `reqwest::Client` wrapper with the retry/backoff
//! policy from the Mempool & Chain Gateway spec applied uniformly to every
//! concrete gateway.
//!
//! Retry policy: exponential backoff on 5xx and transport errors, up to 3
//! attempts; a 429 retries after the server's `Retry-After` header; any
//! other 4xx fails immediately.

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::gateway::errors::GatewayError;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const BASE_BACKOFF_MS: u64 = 250;

#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build().expect("reqwest client builds");
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), api_key }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a GET request, decoding the JSON body, with the gateway's
    /// retry/backoff policy applied.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let resp = self.send_with_retry(Method::GET, path, None::<&()>).await?;
        resp.json::<T>().await.map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Issue a GET request, returning the raw text body.
    pub async fn get_text(&self, path: &str) -> Result<String, GatewayError> {
        let resp = self.send_with_retry(Method::GET, path, None::<&()>).await?;
        resp.text().await.map_err(GatewayError::Transport)
    }

    /// Issue a POST with a JSON body, decoding the JSON response.
    pub async fn post_json<B: serde::Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, GatewayError> {
        let resp = self.send_with_retry(Method::POST, path, Some(body)).await?;
        resp.json::<T>().await.map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Issue a POST with a raw text body (e.g. a hex-encoded transaction),
    /// returning the raw text response.
    pub async fn post_text(&self, path: &str, body: String) -> Result<String, GatewayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut req = self.client.post(self.url(path)).body(body.clone());
            if let Some(key) = &self.api_key {
                req = req.header("x-api-key", key.clone());
            }
            let result = req.send().await;
            match self.evaluate(result, attempt).await? {
                Some(resp) => return resp.text().await.map_err(GatewayError::Transport),
                None => continue,
            }
        }
    }

    /// Issue a POST with a raw binary body (e.g. a serialized transaction)
    /// and an `application/octet-stream` content type, returning the raw
    /// text response.
    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> Result<String, GatewayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut req = self
                .client
                .post(self.url(path))
                .header("content-type", "application/octet-stream")
                .body(body.clone());
            if let Some(key) = &self.api_key {
                req = req.header("x-api-key", key.clone());
            }
            let result = req.send().await;
            match self.evaluate(result, attempt).await? {
                Some(resp) => return resp.text().await.map_err(GatewayError::Transport),
                None => continue,
            }
        }
    }

    async fn send_with_retry<B: serde::Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response, GatewayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut req = self.client.request(method.clone(), self.url(path));
            if let Some(key) = &self.api_key {
                req = req.header("x-api-key", key.clone());
            }
            if let Some(b) = body {
                req = req.json(b);
            }
            let result = req.send().await;
            if let Some(resp) = self.evaluate(result, attempt).await? {
                return Ok(resp);
            }
        }
    }

    /// Returns `Ok(Some(resp))` on success, `Ok(None)` if the caller should
    /// retry, or `Err` if the failure is terminal.
    async fn evaluate(&self, result: reqwest::Result<Response>, attempt: u32) -> Result<Option<Response>, GatewayError> {
        match result {
            Ok(resp) if resp.status().is_success() => Ok(Some(resp)),
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                    return Ok(None);
                }
                if status.is_server_error() && attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(backoff(attempt)).await;
                    return Ok(None);
                }
                let details = resp.text().await.unwrap_or_default();
                Err(GatewayError::Api { status_code: status.as_u16(), details })
            }
            Err(e) if attempt < MAX_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                tokio::time::sleep(backoff(attempt)).await;
                Ok(None)
            }
            Err(e) => Err(GatewayError::Transport(e)),
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1)))
}
