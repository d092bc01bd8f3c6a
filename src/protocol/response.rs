//! Response definitions
//!
//! Represents responses to HTTP clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    Unauthorized,
    Error,
}

impl Status {
    pub fn code(self) -> StatusCode {
        match self {
            Status::Ok => StatusCode::OK,
            Status::BadRequest => StatusCode::BAD_REQUEST,
            Status::Unauthorized => StatusCode::UNAUTHORIZED,
            Status::Error => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body: either a confirmation or an error, never both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A response to send to the client
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// JSON body, `None` for an empty body
    pub body: Option<ResponseBody>,
}

impl Response {
    /// Create an OK response carrying a confirmation message
    pub fn ok(message: &str) -> Self {
        Self {
            status: Status::Ok,
            body: Some(ResponseBody {
                message: Some(message.to_string()),
                ..ResponseBody::default()
            }),
        }
    }

    /// Create a BAD_REQUEST response
    pub fn bad_request(error: &str) -> Self {
        Self::failure(Status::BadRequest, error)
    }

    /// Create an UNAUTHORIZED response (empty body)
    pub fn unauthorized() -> Self {
        Self {
            status: Status::Unauthorized,
            body: None,
        }
    }

    /// Create an internal ERROR response
    pub fn error(error: &str) -> Self {
        Self::failure(Status::Error, error)
    }

    fn failure(status: Status, error: &str) -> Self {
        Self {
            status,
            body: Some(ResponseBody {
                error: Some(error.to_string()),
                ..ResponseBody::default()
            }),
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        match self.body {
            Some(body) => (self.status.code(), Json(body)).into_response(),
            None => self.status.code().into_response(),
        }
    }
}
