//! REST client for the catalog backend.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

use super::{decode_entity, decode_list, encode_payload, RemoteCatalog, RemoteError, RemoteProduct};
use crate::config::EngineConfig;
use crate::models::{ProductDraft, ProductId};
use crate::util::compact_text;
use crate::Error;

/// HTTP client speaking the backend's `/{collection}` REST routes.
#[derive(Debug, Clone)]
pub struct HttpRemoteCatalog {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpRemoteCatalog {
    /// Builds a client for an explicit API base URL.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                Error::InvalidInput(format!("Failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    pub fn from_config(config: &EngineConfig) -> crate::Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(collection))
    }

    fn item_url(&self, collection: &str, id: &ProductId) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id.as_str())
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match self.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| classify_transport_error(what, &error))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(what, status, &body))
    }
}

impl RemoteCatalog for HttpRemoteCatalog {
    async fn create(
        &self,
        collection: &str,
        payload: &ProductDraft,
    ) -> Result<RemoteProduct, RemoteError> {
        let request = self
            .client
            .post(self.collection_url(collection))
            .json(&encode_payload(payload));
        let response = self.send(request, "Create request").await?;
        let created = read_json(response)
            .await
            .and_then(|body| decode_entity(&body));
        created.map_err(unconfirmed_create)
    }

    async fn update(
        &self,
        collection: &str,
        id: &ProductId,
        payload: &ProductDraft,
    ) -> Result<RemoteProduct, RemoteError> {
        let request = self
            .client
            .put(self.item_url(collection, id))
            .json(&encode_payload(payload));
        let response = self.send(request, "Update request").await?;
        // Some deployments answer 204 or echo only a message.
        let body = read_json(response).await.unwrap_or(Value::Null);
        Ok(decode_entity(&body)
            .unwrap_or_else(|_| RemoteProduct::new(id.clone(), payload.clone())))
    }

    async fn delete(&self, collection: &str, id: &ProductId) -> Result<(), RemoteError> {
        let request = self.client.delete(self.item_url(collection, id));
        match self.send(request, "Delete request").await {
            Ok(_) => Ok(()),
            Err(RemoteError::Permanent {
                status: Some(404), ..
            }) => {
                tracing::debug!("Product {id} already absent remotely");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<RemoteProduct>, RemoteError> {
        let request = self.client.get(self.collection_url(collection));
        let response = self.send(request, "List request").await?;
        decode_list(&read_json(response).await?)
    }
}

async fn read_json(response: Response) -> Result<Value, RemoteError> {
    let body = response
        .text()
        .await
        .map_err(|error| RemoteError::transient(format!("Failed to read response: {error}")))?;
    serde_json::from_str(&body).map_err(|error| {
        RemoteError::permanent(
            None,
            format!("Failed to parse response ({error}): {}", compact_text(&body)),
        )
    })
}

/// A 2xx create whose body can't be decoded may already exist remotely;
/// keep it queued instead of recording a rejection.
pub(crate) fn unconfirmed_create(error: RemoteError) -> RemoteError {
    match error {
        RemoteError::Permanent { message, .. } => {
            tracing::warn!("Create accepted without a usable response; keeping it queued: {message}");
            RemoteError::transient(format!("Create response could not be decoded: {message}"))
        }
        other => other,
    }
}

fn classify_transport_error(what: &str, error: &reqwest::Error) -> RemoteError {
    if error.is_builder() {
        return RemoteError::permanent(None, format!("{what} could not be built: {error}"));
    }
    if error.is_timeout() {
        return RemoteError::transient(format!("{what} timed out"));
    }
    RemoteError::transient(format!("{what} failed: {error}"))
}

/// Map a non-success HTTP status onto the retry classification.
pub(crate) fn classify_status(what: &str, status: StatusCode, body: &str) -> RemoteError {
    let code = status.as_u16();
    let message = format!("{what} failed with HTTP {code}: {}", compact_text(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Transient(message)
        }
        status if status.is_server_error() => RemoteError::Transient(message),
        _ => RemoteError::Permanent {
            status: Some(code),
            message,
        },
    }
}

fn normalize_base_url(raw: &str) -> crate::Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(Error::InvalidInput(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !crate::util::is_http_url(&base) {
        return Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://api.example.com/").unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn classify_status_separates_failure_kinds() {
        assert!(matches!(
            classify_status("Create", StatusCode::UNAUTHORIZED, ""),
            RemoteError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status("Create", StatusCode::FORBIDDEN, ""),
            RemoteError::Unauthorized(_)
        ));
        assert!(classify_status("Create", StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(classify_status("Create", StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status("Create", StatusCode::REQUEST_TIMEOUT, "").is_retryable());
        assert_eq!(
            classify_status("Update", StatusCode::UNPROCESSABLE_ENTITY, "precio invalid"),
            RemoteError::Permanent {
                status: Some(422),
                message: "Update failed with HTTP 422: precio invalid".to_string(),
            }
        );
    }

    #[test]
    fn undecodable_create_response_stays_retryable() {
        let created = decode_entity(&serde_json::json!({ "ok": true })).map_err(unconfirmed_create);
        assert!(matches!(created, Err(RemoteError::Transient(_))));

        assert_eq!(
            unconfirmed_create(RemoteError::Unauthorized("expired".to_string())),
            RemoteError::Unauthorized("expired".to_string())
        );
        assert!(unconfirmed_create(RemoteError::transient("reset")).is_retryable());
    }

    #[test]
    fn item_urls_encode_identifiers() {
        let client = HttpRemoteCatalog::new(
            "http://localhost:3000/api/",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(
            client.item_url("productos", &ProductId::new("a b")),
            "http://localhost:3000/api/productos/a%20b"
        );
    }
}
