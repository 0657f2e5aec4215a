use thiserror::Error;

pub type DescribeResult<T> = Result<T, DescribeError>;

#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("Invalid vision endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Vision request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    #[error("Vision service returned {status}: {message}")]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Vision service returned no description")]
    EmptyResult,
}

impl DescribeError {
    pub fn invalid_endpoint<E: Into<String>, M: std::fmt::Display>(endpoint: E, message: M) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn service<S: Into<String>>(status: u16, code: Option<String>, message: S) -> Self {
        Self::Service {
            status,
            code,
            message: message.into(),
        }
    }
}
