//! Async API client core for the starter service.
//!
//! # Overview
//! `StarterClient` turns typed calls (`get_user`, `get_histories`,
//! `create_history`, ...) into HTTP requests, sends them through an injected
//! `NetworkClient`, and decodes the `{success, data, error}` envelope the
//! backend wraps every response in.
//!
//! # Design
//! - `StarterClient` is stateless: it holds `base_url` and a shared transport.
//! - Each operation has a pure `build_*` step, so the request shape is
//!   testable without I/O.
//! - Transports implement `NetworkClient`; the reqwest transport ships behind
//!   the default `reqwest` feature.
//! - No retries, timeouts or caching happen here. Caching lives in the
//!   `starter-query` crate; timeouts belong to the transport.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod network;
pub mod types;

pub use client::{parse_envelope, StarterClient};
pub use config::ClientConfig;
pub use envelope::Envelope;
pub use error::{ApiError, ConfigError, TransportError};
pub use http::{build_url, HttpMethod, HttpRequest, HttpResponse, RequestOptions};
#[cfg(feature = "reqwest")]
pub use network::ReqwestNetworkClient;
pub use network::{dispatch, NetworkClient};
pub use types::{History, HistoriesTotal, HistoryCreateRequest, HistoryUpdateRequest, User};
