use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imgup_blob::BlobError;
use imgup_vision::DescribeError;
use serde_json::json;

/// Error categories exposed to HTTP clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    GeneralError,
    BadGateway,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::GeneralError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::BadGateway => "BadGateway",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::BadGateway => "bad-gateway",
        }
    }
}

/// Request-scoped failure; rendered as `{name, message, code, className}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Describe(#[from] DescribeError),
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::Blob(e) => match e {
                BlobError::Invalid { .. } => ErrorKind::BadRequest,
                BlobError::NotFound { .. } => ErrorKind::NotFound,
                BlobError::Io { .. } => ErrorKind::GeneralError,
                BlobError::ContainerAlreadyExists { .. }
                | BlobError::Provision { .. }
                | BlobError::Upload { .. }
                | BlobError::List { .. }
                | BlobError::Backend { .. } => ErrorKind::BadGateway,
            },
            ApiError::Describe(_) => ErrorKind::BadGateway,
        }
    }

    /// What the client is told. Storage internals stay in the logs; vision
    /// failures are passed through as the service reported them.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Blob(e) => match e {
                BlobError::Invalid { message } => message.clone(),
                BlobError::NotFound { key } => format!("No object named {}", key),
                BlobError::Provision { .. } | BlobError::ContainerAlreadyExists { .. } => {
                    "Storage container could not be provisioned".to_string()
                }
                BlobError::Upload { .. } => "Storage upload failed".to_string(),
                BlobError::List { .. } => "Storage listing failed".to_string(),
                BlobError::Backend { .. } => "Storage request failed".to_string(),
                BlobError::Io { .. } => "Internal server error".to_string(),
            },
            ApiError::Describe(DescribeError::Service { message, .. }) => message.clone(),
            ApiError::Describe(e) => e.to_string(),
        }
    }

    /// Extra detail attached to the error body, if any
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Describe(DescribeError::Service { status, code, .. }) => Some(json!({
                "status": status,
                "code": code,
            })),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let kind = self.kind();
        let mut body = json!({
            "name": kind.name(),
            "message": self.client_message(),
            "code": kind.status_code().as_u16(),
            "className": kind.class_name(),
        });
        if let Some(data) = self.data() {
            body["data"] = data;
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, source = ?std::error::Error::source(&self), "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.to_json())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_bad_gateway_without_details() {
        let err = ApiError::from(BlobError::upload("abc123", BlobError::backend_message("secret endpoint exploded")));
        assert_eq!(err.kind(), ErrorKind::BadGateway);

        let body = err.to_json();
        assert_eq!(body["name"], "BadGateway");
        assert_eq!(body["code"], 502);
        assert_eq!(body["className"], "bad-gateway");
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }

    #[test]
    fn validation_failures_are_bad_request() {
        let err = ApiError::from(BlobError::invalid("Identifier \"a/b\" is not a valid path segment"));
        assert_eq!(err.kind().status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_json()["message"].as_str().unwrap().contains("a/b"));
    }

    #[test]
    fn local_io_is_general_error() {
        let err = ApiError::from(BlobError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        assert_eq!(err.to_json()["name"], "GeneralError");
        assert_eq!(err.to_json()["code"], 500);
    }

    #[test]
    fn vision_failures_are_bad_gateway() {
        let err = ApiError::from(DescribeError::EmptyResult);
        assert_eq!(err.kind(), ErrorKind::BadGateway);
        assert_eq!(err.to_json()["className"], "bad-gateway");
        assert_eq!(err.to_json()["message"], "Vision service returned no description");
        assert!(err.to_json().get("data").is_none());
    }

    #[test]
    fn vision_service_errors_are_passed_through() {
        let err = ApiError::from(DescribeError::service(
            400,
            Some("InvalidImageUrl".to_string()),
            "Image URL is badly formatted.",
        ));
        let body = err.to_json();
        assert_eq!(body["name"], "BadGateway");
        assert_eq!(body["code"], 502);
        assert_eq!(body["message"], "Image URL is badly formatted.");
        assert_eq!(body["data"]["status"], 400);
        assert_eq!(body["data"]["code"], "InvalidImageUrl");
    }

    #[test]
    fn storage_failures_carry_no_data() {
        let err = ApiError::from(BlobError::list(BlobError::backend_message("timeout")));
        assert!(err.to_json().get("data").is_none());
    }
}
