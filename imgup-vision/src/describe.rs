use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::DescribeResult;

/// Turns the public URL of a stored image into captions and tags
#[async_trait]
pub trait DescribeAdapter: Send + Sync {
    async fn describe(&self, object_url: &str) -> DescribeResult<Description>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,
    pub confidence: f64,
}

/// Captions (best first) and tags for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub captions: Vec<Caption>,
    #[serde(default)]
    pub tags: Vec<String>,
}
