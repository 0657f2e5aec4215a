use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::{DescribeAdapter, DescribeError, DescribeResult, Description};

const DESCRIBE_PATH: &str = "vision/v2.0/describe";
const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Client for the Computer Vision `describe` operation
#[derive(Clone)]
pub struct ComputerVisionClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_key: String,
    max_candidates: u32,
    language: String,
}

#[derive(Deserialize)]
struct DescribeResponse {
    description: Option<Description>,
}

impl ComputerVisionClient {
    pub fn new(endpoint: &str, subscription_key: impl Into<String>) -> DescribeResult<Self> {
        let mut endpoint = Url::parse(endpoint.trim()).map_err(|e| DescribeError::invalid_endpoint(endpoint, e))?;
        if endpoint.cannot_be_a_base() {
            return Err(DescribeError::invalid_endpoint(endpoint.as_str(), "not a base URL"));
        }
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            subscription_key: subscription_key.into(),
            max_candidates: 1,
            language: "en".to_string(),
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn describe_url(&self) -> DescribeResult<Url> {
        let mut url = self
            .endpoint
            .join(DESCRIBE_PATH)
            .map_err(|e| DescribeError::invalid_endpoint(self.endpoint.as_str(), e))?;
        url.query_pairs_mut()
            .append_pair("maxCandidates", &self.max_candidates.to_string())
            .append_pair("language", &self.language);
        Ok(url)
    }

    /// Pull `code`/`message` out of either error shape the service uses
    fn service_error(status: u16, body: &str) -> DescribeError {
        let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let detail = value.get("error").unwrap_or(&value);
        let code = detail.get("code").and_then(Value::as_str).map(str::to_string);
        let message = detail
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        DescribeError::service(status, code, message)
    }
}

impl std::fmt::Debug for ComputerVisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputerVisionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("max_candidates", &self.max_candidates)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DescribeAdapter for ComputerVisionClient {
    async fn describe(&self, object_url: &str) -> DescribeResult<Description> {
        let url = self.describe_url()?;
        tracing::debug!(object_url, "requesting image description");

        let response = self
            .http
            .post(url)
            .header(SUBSCRIPTION_HEADER, &self.subscription_key)
            .json(&json!({ "url": object_url }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Self::service_error(status.as_u16(), &body);
            tracing::warn!(object_url, error = %err, "vision describe failed");
            return Err(err);
        }

        let parsed: DescribeResponse = response.json().await?;
        parsed.description.ok_or(DescribeError::EmptyResult)
    }
}
