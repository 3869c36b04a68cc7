//! Remote access layer for the CivicLink HTTP API.
//!
//! Every endpoint goes through [`ApiClient::call`]: one request, one
//! response, no retries and no caching. Non-success statuses are turned into
//! [`ClientError::Remote`] with the server's message when it sent one.

pub mod auth;
pub mod issues;
pub mod shape;
pub mod users;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP client for all API requests to enable connection pooling
pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .expect("Failed to create HTTP client")
});

const NO_CONTENT: u16 = 204;

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Fail locally when a protected operation has no credential.
pub(crate) fn require_credential<'a>(
    credential: Option<&'a Credential>,
    action: &'static str,
) -> ClientResult<&'a Credential> {
    credential.ok_or_else(|| ClientError::unauthenticated(action))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

/// A fully resolved request handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: Option<Credential>,
    pub body: Option<Value>,
}

/// Raw response: status code and body text.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single request over the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse>;
}

/// Production transport backed by the shared reqwest client.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestTransport;

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let client = &*HTTP_CLIENT;

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = client
            .request(method, &request.url)
            .header("Content-Type", "application/json");

        if let Some(token) = &request.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token.expose()));
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": "..."}` and `{"message": ["...", "..."]}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("message")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .map(|p| p.as_str().map(str::to_string).unwrap_or_else(|| p.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        _ => None,
    }
}

/// Append `key=value` pairs to a path, URL-encoding the values.
pub(crate) fn with_query(path: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", path, query)
}

/// Encode an entity id for use as a path segment.
pub(crate) fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Client bound to one API base address.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api.base_url.clone(), Arc::new(ReqwestTransport))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute one request and return the parsed body, or `None` for 204.
    pub async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&Credential>,
        body: Option<Value>,
    ) -> ClientResult<Option<Value>> {
        let response = self.execute(method, path, credential, body).await?;

        if response.status == NO_CONTENT {
            return Ok(None);
        }

        serde_json::from_str(&response.body)
            .map(Some)
            .map_err(|e| ClientError::MalformedResponse(format!("{} {}: {}", method.as_str(), path, e)))
    }

    /// Like [`Self::call`], but an unparsable body reads as absent.
    ///
    /// Listing endpoints degrade to an empty result instead of failing.
    pub async fn call_listing(&self, path: &str, credential: Option<&Credential>) -> ClientResult<Option<Value>> {
        match self.call(HttpMethod::Get, path, credential, None).await {
            Err(ClientError::MalformedResponse(detail)) => {
                tracing::warn!("Treating unparsable listing as empty: {}", detail);
                Ok(None)
            }
            other => other,
        }
    }

    /// Execute and decode a body of type `T`. A missing body is an error.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&Credential>,
        body: Option<Value>,
    ) -> ClientResult<T> {
        let value = self
            .call(method, path, credential, body)
            .await?
            .ok_or_else(|| {
                ClientError::MalformedResponse(format!(
                    "{} {}: expected a response body",
                    method.as_str(),
                    path
                ))
            })?;

        serde_json::from_value(value)
            .map_err(|e| ClientError::MalformedResponse(format!("{} {}: {}", method.as_str(), path, e)))
    }

    /// Execute a request whose response body is ignored.
    pub async fn call_no_content(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&Credential>,
        body: Option<Value>,
    ) -> ClientResult<()> {
        self.execute(method, path, credential, body).await.map(|_| ())
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        credential: Option<&Credential>,
        body: Option<Value>,
    ) -> ClientResult<ApiResponse> {
        let request = ApiRequest {
            method,
            url: self.url_for(path),
            bearer: credential.cloned(),
            body,
        };

        tracing::debug!("{} {}", method.as_str(), request.url);

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let message = extract_error_message(&response.body);
            tracing::debug!(
                "{} {} failed with {}: {:?}",
                method.as_str(),
                path,
                response.status,
                message
            );
            return Err(ClientError::Remote {
                status: response.status,
                message,
            });
        }

        Ok(response)
    }
}

/// Serialize a request body, mapping the (unlikely) failure to a local error.
pub(crate) fn json_body<T: Serialize>(body: &T) -> ClientResult<Value> {
    serde_json::to_value(body).map_err(|e| ClientError::validation(format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_string_message() {
        let body = r#"{"statusCode":404,"message":"Issue not found"}"#;
        assert_eq!(extract_error_message(body), Some("Issue not found".to_string()));
    }

    #[test]
    fn test_extract_array_message() {
        let body = r#"{"message":["title should not be empty","latitude must be a number"]}"#;
        assert_eq!(
            extract_error_message(body),
            Some("title should not be empty, latitude must be a number".to_string())
        );
    }

    #[test]
    fn test_extract_message_rejects_garbage() {
        assert_eq!(extract_error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(extract_error_message(r#"{"error":"nope"}"#), None);
        assert_eq!(extract_error_message(r#"{"message":42}"#), None);
    }

    #[test]
    fn test_with_query_encodes_values() {
        let path = with_query(
            "/issues",
            &[("page", "1".to_string()), ("q", "a b&c".to_string())],
        );
        assert_eq!(path, "/issues?page=1&q=a%20b%26c");
        assert_eq!(with_query("/issues/mine", &[]), "/issues/mine");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.expose(), "secret-token");
    }
}
