//! Response envelope shared by every route.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::LoreError;
use crate::responses;

/// `{ "success": bool, "data"?: T, "error"?: string }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful envelope around `data`
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// A failed request, rendered as an error envelope
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, responses::NOT_FOUND)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, responses::INTERNAL_ERROR)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<LoreError>() {
            Some(LoreError::Validation(message)) => Self::bad_request(message.clone()),
            Some(LoreError::NotFound(_)) => Self::not_found(),
            _ => {
                tracing::error!(error = %err, "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ApiError::from(anyhow::Error::from(LoreError::Validation(
            responses::MISSING_MESSAGE.to_string(),
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, responses::MISSING_MESSAGE);
    }

    #[test]
    fn test_unclassified_errors_are_internal() {
        let err = ApiError::from(anyhow::Error::from(LoreError::Storage("disk".into())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, responses::INTERNAL_ERROR);
    }

    #[test]
    fn test_ok_envelope_omits_error() {
        let Json(body) = ApiResponse::ok(42);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, serde_json::json!({"success": true, "data": 42}));
    }
}
