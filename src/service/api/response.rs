use crate::ledger::LedgerError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Envelope around every response body, success or error
///
/// `code` repeats the HTTP status; `data` is `null` on errors.
#[derive(Serialize, Deserialize, Debug)]
pub struct ResponseMessage<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

pub struct ApiResponse<T> {
    message: &'static str,
    data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &'static str, data: T) -> Self {
        Self { message, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::OK;
        let body = ResponseMessage {
            code: status.as_u16(),
            message: self.message.to_owned(),
            data: Some(self.data),
        };
        (status, Json(body)).into_response()
    }
}

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

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = match &e {
            LedgerError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            LedgerError::InvalidAmount(_) | LedgerError::ItemNotBiddable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::NoBidsForItem(_) => StatusCode::NOT_FOUND,
            LedgerError::Store(e) => {
                error!(error = ?e, "bid store failure");
                return Self::internal("Failed to access the bid store");
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(%rejection, "failed to parse incoming json payload");
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ResponseMessage::<()> {
            code: self.status.as_u16(),
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}
