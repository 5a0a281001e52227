//! Typed client for the starter API.
//!
//! # Design
//! `StarterClient` holds only a `base_url` and a shared transport; it carries
//! no mutable state between calls. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and an async method that dispatches
//! it through the `NetworkClient` and decodes the envelope. The build step is
//! pure, so request shape (URL, headers, body) is testable without I/O.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::http::{
    build_url, HttpMethod, HttpRequest, HttpResponse, ACCEPT, APPLICATION_JSON, AUTHORIZATION,
    CONTENT_TYPE,
};
use crate::network::{dispatch, NetworkClient};
use crate::types::{History, HistoriesTotal, HistoryCreateRequest, HistoryUpdateRequest, User};

const API_PREFIX: &str = "/api/v1";

/// Async client for the user and history endpoints.
#[derive(Clone)]
pub struct StarterClient {
    base_url: String,
    network: Arc<dyn NetworkClient>,
}

impl fmt::Debug for StarterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarterClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StarterClient {
    pub fn new(base_url: &str, network: Arc<dyn NetworkClient>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            network,
        }
    }

    /// Build a client backed by the reqwest transport.
    #[cfg(feature = "reqwest")]
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self, ApiError> {
        let network = crate::network::ReqwestNetworkClient::new(config.timeout)?;
        Ok(Self::new(&config.base_url, Arc::new(network)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_get_user(&self, user_id: &str, token: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &user_path(user_id), Some(token), None)
    }

    pub fn build_get_histories(&self, user_id: &str, token: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &histories_path(user_id), Some(token), None)
    }

    pub fn build_create_history(
        &self,
        user_id: &str,
        body: &HistoryCreateRequest,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = to_json(body)?;
        Ok(self.request(HttpMethod::Post, &histories_path(user_id), Some(token), Some(body)))
    }

    pub fn build_update_history(
        &self,
        user_id: &str,
        history_id: Uuid,
        body: &HistoryUpdateRequest,
        token: &str,
    ) -> Result<HttpRequest, ApiError> {
        let body = to_json(body)?;
        Ok(self.request(
            HttpMethod::Put,
            &history_path(user_id, history_id),
            Some(token),
            Some(body),
        ))
    }

    pub fn build_delete_history(&self, user_id: &str, history_id: Uuid, token: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, &history_path(user_id, history_id), Some(token), None)
    }

    /// The total endpoint is public: no `authorization` header is attached.
    pub fn build_get_histories_total(&self) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("{API_PREFIX}/histories/total"), None, None)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub async fn get_user(&self, user_id: &str, token: &str) -> Result<Envelope<User>, ApiError> {
        self.send(self.build_get_user(user_id, token)).await
    }

    pub async fn get_histories(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Envelope<Vec<History>>, ApiError> {
        self.send(self.build_get_histories(user_id, token)).await
    }

    pub async fn create_history(
        &self,
        user_id: &str,
        body: &HistoryCreateRequest,
        token: &str,
    ) -> Result<Envelope<History>, ApiError> {
        self.send(self.build_create_history(user_id, body, token)?).await
    }

    pub async fn update_history(
        &self,
        user_id: &str,
        history_id: Uuid,
        body: &HistoryUpdateRequest,
        token: &str,
    ) -> Result<Envelope<History>, ApiError> {
        self.send(self.build_update_history(user_id, history_id, body, token)?)
            .await
    }

    pub async fn delete_history(
        &self,
        user_id: &str,
        history_id: Uuid,
        token: &str,
    ) -> Result<Envelope<()>, ApiError> {
        let envelope: Envelope<serde_json::Value> = self
            .send(self.build_delete_history(user_id, history_id, token))
            .await?;
        Ok(envelope.discard_data())
    }

    pub async fn get_histories_total(&self) -> Result<Envelope<HistoriesTotal>, ApiError> {
        self.send(self.build_get_histories_total()).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = vec![
            (CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string()),
            (ACCEPT.to_string(), APPLICATION_JSON.to_string()),
        ];
        if let Some(token) = token {
            headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
        }
        HttpRequest {
            method,
            url: build_url(&self.base_url, path),
            headers,
            body,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<Envelope<T>, ApiError> {
        let method = request.method.as_str();
        let url = request.url.clone();
        debug!(method, url = %url, "sending request");

        let response = dispatch(self.network.as_ref(), request).await?;
        debug!(method, url = %url, status = response.status, "received response");
        parse_envelope(response)
    }
}

/// Decode a transport response into an envelope.
///
/// 2xx bodies must be envelopes. `data` is only decoded as `T` when
/// `success` is true; a failed envelope keeps just its message. Non-2xx
/// bodies that are envelopes become `ApiError::Api` with the server message;
/// anything else becomes `ApiError::Http` with the raw status and body.
pub fn parse_envelope<T: DeserializeOwned>(response: HttpResponse) -> Result<Envelope<T>, ApiError> {
    let raw = serde_json::from_str::<Envelope<serde_json::Value>>(&response.body);
    if !response.is_success() {
        return match raw {
            Ok(envelope) => Err(ApiError::from_server_message(Some(response.status), envelope.error)),
            Err(_) => Err(ApiError::Http {
                status: response.status,
                body: response.body,
            }),
        };
    }

    let envelope = raw.map_err(|e| ApiError::Deserialization(e.to_string()))?;
    if !envelope.success {
        return Ok(Envelope {
            success: false,
            data: None,
            error: envelope.error,
        });
    }
    let data = envelope
        .data
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ApiError::Deserialization(e.to_string()))?;
    Ok(Envelope {
        success: true,
        data,
        error: envelope.error,
    })
}

fn to_json<B: Serialize>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn user_path(user_id: &str) -> String {
    format!("{API_PREFIX}/users/{user_id}")
}

fn histories_path(user_id: &str) -> String {
    format!("{API_PREFIX}/users/{user_id}/histories")
}

fn history_path(user_id: &str, history_id: Uuid) -> String {
    format!("{API_PREFIX}/users/{user_id}/histories/{history_id}")
}
