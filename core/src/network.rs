//! Transport abstraction the client dispatches requests through.
//!
//! # Design
//! `StarterClient` never performs I/O itself. It builds an `HttpRequest` and
//! hands it to a `NetworkClient`, which may be reqwest, a platform HTTP
//! stack, or a test double. Transports return every HTTP status as data so
//! the client stays the only place that interprets statuses and envelopes.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestOptions};

/// Minimal async HTTP capability: one method per verb the API uses.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, TransportError>;

    async fn post(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, TransportError>;

    async fn put(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, TransportError>;

    async fn delete(&self, url: &str, options: RequestOptions)
        -> Result<HttpResponse, TransportError>;
}

/// Route a built request to the matching verb on `network`.
pub async fn dispatch(
    network: &dyn NetworkClient,
    request: HttpRequest,
) -> Result<HttpResponse, TransportError> {
    let (method, url, options) = request.into_parts();
    match method {
        HttpMethod::Get => network.get(&url, options).await,
        HttpMethod::Post => network.post(&url, options).await,
        HttpMethod::Put => network.put(&url, options).await,
        HttpMethod::Delete => network.delete(&url, options).await,
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestNetworkClient;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::{Client, Method};

    use crate::error::TransportError;
    use crate::http::{HttpResponse, RequestOptions};

    use super::NetworkClient;

    /// Reqwest-backed transport. Owns connection pooling and, optionally, a
    /// per-request timeout; nothing else.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestNetworkClient {
        client: Client,
    }

    impl ReqwestNetworkClient {
        pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
            let mut builder = Client::builder();
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            let client = builder
                .build()
                .map_err(|e| TransportError::Client(e.to_string()))?;
            Ok(Self { client })
        }

        pub fn with_client(client: Client) -> Self {
            Self { client }
        }

        async fn send(
            &self,
            method: Method,
            verb: &'static str,
            url: &str,
            options: RequestOptions,
        ) -> Result<HttpResponse, TransportError> {
            let mut builder = self.client.request(method, url);
            for (name, value) in &options.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = options.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| TransportError::Request {
                method: verb,
                url: url.to_string(),
                message: e.to_string(),
            })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(|e| TransportError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    #[async_trait]
    impl NetworkClient for ReqwestNetworkClient {
        async fn get(
            &self,
            url: &str,
            options: RequestOptions,
        ) -> Result<HttpResponse, TransportError> {
            self.send(Method::GET, "GET", url, options).await
        }

        async fn post(
            &self,
            url: &str,
            options: RequestOptions,
        ) -> Result<HttpResponse, TransportError> {
            self.send(Method::POST, "POST", url, options).await
        }

        async fn put(
            &self,
            url: &str,
            options: RequestOptions,
        ) -> Result<HttpResponse, TransportError> {
            self.send(Method::PUT, "PUT", url, options).await
        }

        async fn delete(
            &self,
            url: &str,
            options: RequestOptions,
        ) -> Result<HttpResponse, TransportError> {
            self.send(Method::DELETE, "DELETE", url, options).await
        }
    }
}
