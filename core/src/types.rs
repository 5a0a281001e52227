//! Domain DTOs for the starter API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently.
//! Integration tests catch any schema drift between the two crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user record, keyed by its Firebase uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub firebase_uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single timestamped value recorded for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct History {
    pub id: Uuid,
    pub firebase_uid: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Request payload for creating a history. The server assigns the id and
/// defaults `recorded_at` to the current time when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryCreateRequest {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Request payload for updating a history. Only the fields present in the
/// JSON are applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Payload of the public total endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoriesTotal {
    pub total: u64,
}
