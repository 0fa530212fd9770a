//! HTTP client implementation
//!
//! Every successful response is decoded and then validated; a body that does
//! not match the expected shape is reported as [`DeckError::SchemaMismatch`]
//! and never retried by the client.

use std::time::Duration;

use openapi_models::{ErrorBody, Validate};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::DeckError;

/// HTTP client for the platform API
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client for an API rooted at `base_url`, e.g. `http://127.0.0.1:8080/v1`
    pub async fn new(base_url: &str) -> Result<Self, DeckError> {
        Self::with_timeout(base_url, Duration::from_secs(30)).await
    }

    pub async fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, DeckError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| DeckError::ConfigError(format!("Invalid base url '{}': {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DeckError::ConfigError(format!(
                "Unsupported scheme in base url '{}'",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.client.request(method, &url);
        (url, builder)
    }

    /// Make a GET request
    pub async fn get<T>(&self, path: &str) -> Result<T, DeckError>
    where
        T: DeserializeOwned + Validate,
    {
        let (url, request) = self.request(Method::GET, path);
        let response = request.send().await?;
        decode(response, "GET", &url).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, DeckError>
    where
        T: DeserializeOwned + Validate,
        Q: Serialize + ?Sized,
    {
        let (url, request) = self.request(Method::GET, path);
        let response = request.query(query).send().await?;
        decode(response, "GET", &url).await
    }

    /// Make a POST request, with or without a JSON body
    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<T, DeckError>
    where
        T: DeserializeOwned + Validate,
        B: Serialize + ?Sized,
    {
        let (url, mut request) = self.request(Method::POST, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        decode(response, "POST", &url).await
    }

    /// Make a PATCH request
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, DeckError>
    where
        T: DeserializeOwned + Validate,
        B: Serialize + ?Sized,
    {
        let (url, request) = self.request(Method::PATCH, path);
        let response = request.json(body).send().await?;
        decode(response, "PATCH", &url).await
    }

    /// Make a DELETE request that returns no body
    pub async fn delete(&self, path: &str) -> Result<(), DeckError> {
        let (url, request) = self.request(Method::DELETE, path);
        let response = request.send().await?;
        check_status(response, "DELETE", &url).await?;
        Ok(())
    }
}

async fn check_status(response: Response, method: &str, url: &str) -> Result<Response, DeckError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} {} failed: {} - {}", method, url, status, body);
    Err(match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => DeckError::ApiError {
            status: status.as_u16(),
            code: err.code,
            message: err.message,
            suggestion: err.suggestion,
        },
        Err(_) => DeckError::ApiError {
            status: status.as_u16(),
            code: "unknown".to_string(),
            message: body,
            suggestion: None,
        },
    })
}

async fn decode<T>(response: Response, method: &str, url: &str) -> Result<T, DeckError>
where
    T: DeserializeOwned + Validate,
{
    let response = check_status(response, method, url).await?;
    let bytes = response.bytes().await?;

    let value: T = serde_json::from_slice(&bytes)
        .map_err(|e| DeckError::SchemaMismatch(format!("{} {}: {}", method, url, e)))?;
    value
        .validate()
        .map_err(|e| DeckError::SchemaMismatch(format!("{} {}: {}", method, url, e)))?;
    Ok(value)
}
