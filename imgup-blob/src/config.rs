use std::path::PathBuf;

use crate::IdPolicy;

/// Configuration for the upload pipeline
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Rules for block-based uploads
    pub upload_rules: UploadRules,

    /// How object identifiers are generated
    pub id_policy: IdPolicy,

    /// Directory for per-upload staging files (None = OS temp dir)
    pub staging_dir: Option<PathBuf>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            upload_rules: UploadRules::default(),
            id_policy: IdPolicy::default(),
            staging_dir: None,
        }
    }
}

/// Rules for block uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRules {
    /// Block size (bytes). Inputs smaller than one block go up in a single put.
    pub block_size: u64,

    /// Upper bound on block transfers in flight for one upload
    pub parallelism: usize,
}

impl UploadRules {
    pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024; // 4MiB
    pub const DEFAULT_PARALLELISM: usize = 16;

    /// Create new upload rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Set block size
    pub fn with_block_size(mut self, bytes: u64) -> Self {
        self.block_size = bytes;
        self
    }

    /// Set max concurrent block transfers
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            parallelism: Self::DEFAULT_PARALLELISM,
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set upload rules
    pub fn with_upload_rules(mut self, rules: UploadRules) -> Self {
        self.upload_rules = rules;
        self
    }

    pub fn with_id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }

    /// Stage uploads under `dir` instead of the OS temp dir
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Resolved staging directory
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_upload_shape() {
        let config = BlobConfig::default();
        assert_eq!(config.upload_rules.block_size, 4 * 1024 * 1024);
        assert_eq!(config.upload_rules.parallelism, 16);
        assert_eq!(config.id_policy, IdPolicy::Alphanumeric { length: 6 });
        assert_eq!(config.staging_dir(), std::env::temp_dir());
    }

    #[test]
    fn builders_override_defaults() {
        let config = BlobConfig::new()
            .with_upload_rules(UploadRules::new().with_block_size(1024).with_parallelism(2))
            .with_id_policy(IdPolicy::Numeric)
            .with_staging_dir("/var/tmp/imgup");

        assert_eq!(config.upload_rules.block_size, 1024);
        assert_eq!(config.upload_rules.parallelism, 2);
        assert_eq!(config.id_policy, IdPolicy::Numeric);
        assert_eq!(config.staging_dir(), PathBuf::from("/var/tmp/imgup"));
    }
}
