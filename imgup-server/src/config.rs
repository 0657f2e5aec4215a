use std::path::PathBuf;

use imgup_blob::{BlobConfig, ContainerUrl, IdPolicy, S3Config, UploadRules};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid<M: std::fmt::Display>(key: &'static str, message: M) -> Self {
        Self::Invalid {
            key,
            message: message.to_string(),
        }
    }
}

/// Everything the process needs, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: S3Config,
    pub public_url: ContainerUrl,
    pub vision_endpoint: String,
    pub vision_subscription_key: String,
    pub blob: BlobConfig,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub const DEFAULT_CONTAINER: &'static str = "imgup";
    pub const DEFAULT_REGION: &'static str = "us-east-1";

    /// Read from the process environment (call `dotenvy::dotenv()` first)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let account = required("IMGUP_STORAGE_ACCOUNT")?;
        let access_key = required("IMGUP_STORAGE_ACCESS_KEY")?;
        let vision_subscription_key = required("IMGUP_VISION_SUBSCRIPTION_KEY")?;
        let vision_endpoint = required("IMGUP_VISION_ENDPOINT")?;
        parse_http_url("IMGUP_VISION_ENDPOINT", &vision_endpoint)?;

        let region = get("IMGUP_STORAGE_REGION").unwrap_or_else(|| Self::DEFAULT_REGION.to_string());
        let endpoint = get("IMGUP_STORAGE_ENDPOINT").unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region));
        let endpoint = parse_http_url("IMGUP_STORAGE_ENDPOINT", &endpoint)?;
        let endpoint = endpoint.as_str().trim_end_matches('/').to_string();

        let container = get("IMGUP_CONTAINER").unwrap_or_else(|| Self::DEFAULT_CONTAINER.to_string());
        validate_container("IMGUP_CONTAINER", &container)?;

        let public_url = get("IMGUP_PUBLIC_URL").unwrap_or_else(|| format!("{}/{}", endpoint, container));
        let public_url =
            ContainerUrl::parse(&public_url).map_err(|e| ConfigError::invalid("IMGUP_PUBLIC_URL", e))?;

        let block_size = parse_nonzero::<u64>(&get, "IMGUP_BLOCK_SIZE_BYTES", UploadRules::DEFAULT_BLOCK_SIZE)?;
        let parallelism = parse_nonzero::<usize>(&get, "IMGUP_UPLOAD_PARALLELISM", UploadRules::DEFAULT_PARALLELISM)?;
        let id_policy = match get("IMGUP_ID_POLICY") {
            Some(raw) => raw
                .parse::<IdPolicy>()
                .map_err(|e| ConfigError::invalid("IMGUP_ID_POLICY", e))?,
            None => IdPolicy::default(),
        };

        let mut blob = BlobConfig::new()
            .with_upload_rules(
                UploadRules::new()
                    .with_block_size(block_size)
                    .with_parallelism(parallelism),
            )
            .with_id_policy(id_policy);
        if let Some(dir) = get("IMGUP_STAGING_DIR") {
            blob = blob.with_staging_dir(dir);
        }

        let host = get("HTTP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_nonzero::<u16>(&get, "HTTP_PORT", 8080)?;
        let static_dir = PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| "static".to_string()));

        Ok(Self {
            storage: S3Config {
                endpoint,
                region,
                access_key_id: account,
                secret_access_key: access_key,
                bucket: container,
            },
            public_url,
            vision_endpoint,
            vision_subscription_key,
            blob,
            host,
            port,
            static_dir,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_http_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(key, e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::invalid(key, format!("{} is not an http(s) URL", raw)));
    }
    Ok(url)
}

fn parse_nonzero<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    let value = raw.parse::<T>().map_err(|e| ConfigError::invalid(key, e))?;
    if value == T::default() {
        return Err(ConfigError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

/// Bucket naming: 3-63 chars of lowercase letters, digits, '-' and '.'
fn validate_container(key: &'static str, name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if !(3..=63).contains(&name.len()) || !valid_chars {
        return Err(ConfigError::invalid(key, format!("{:?} is not a valid container name", name)));
    }
    Ok(())
}
