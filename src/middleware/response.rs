use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::envelope::Envelope;
use crate::error::ApiError;

/// Gateway-generated body, wrapped in the same envelope the backend uses
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub result: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(result: T) -> Self {
        Self { result }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(Envelope::ok(self.result)) {
            Ok(envelope) => Json(envelope).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                ApiError::internal_server_error("Failed to serialize response data").into_response()
            }
        }
    }
}
