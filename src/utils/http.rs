// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
///
/// Default headers and the optional proxy come from the configuration;
/// nothing is read from process-wide state here.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::config(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::config(format!("invalid header value {value:?}: {e}")))?;
        headers.insert(name, value);
    }

    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs));

    if let Some(proxy) = &config.proxy {
        log::debug!("Routing requests through proxy {}", proxy);
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }

    Ok(builder.build()?)
}

/// Network operations the synchronizer and fetcher depend on.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET a resource and return its body.
    async fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;

    /// POST a JSON body and return the response body.
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Vec<u8>>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .post(url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        (**self).get(url, timeout).await
    }

    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<Vec<u8>> {
        (**self).post_json(url, body, timeout).await
    }
}
