//! The `{success, data, error}` wrapper every endpoint responds with.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Uniform response envelope.
///
/// `data` is only meaningful when `success` is true. Callers go through
/// [`Envelope::into_data`] or [`Envelope::into_unit`] rather than reading the
/// fields directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Unwrap the payload.
    ///
    /// `success: false` becomes `ApiError::Api` with the server message;
    /// `success: true` without data becomes `ApiError::MissingData`.
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::from_server_message(None, self.error));
        }
        self.data.ok_or(ApiError::MissingData)
    }

    /// Check only the success flag, for endpoints without a payload.
    pub fn into_unit(self) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::from_server_message(None, self.error))
        }
    }

    /// Drop whatever payload came along, keeping success and error.
    pub fn discard_data(self) -> Envelope<()> {
        Envelope {
            success: self.success,
            data: None,
            error: self.error,
        }
    }
}
