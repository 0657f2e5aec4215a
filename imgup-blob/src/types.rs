use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{BlobError, BlobResult};

/// Name of a stored object within the container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Longest key any supported backend accepts
    pub const MAX_LEN: usize = 1024;

    /// Validate an identifier received from outside (e.g. a URL path)
    pub fn parse<S: Into<String>>(id: S) -> BlobResult<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > Self::MAX_LEN {
            return Err(BlobError::invalid(format!(
                "Identifier must be 1-{} bytes long",
                Self::MAX_LEN
            )));
        }
        if id == "." || id == ".." {
            return Err(BlobError::invalid("Identifier cannot be a relative path segment"));
        }
        if id.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control()) {
            return Err(BlobError::invalid(format!("Identifier {:?} is not a valid path segment", id)));
        }
        Ok(Self(id))
    }

    /// Wrap a key reported by the store without validation
    pub fn from_key(key: String) -> Self {
        Self(key)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How identifiers are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Fixed-length string over `[A-Za-z0-9]`
    Alphanumeric { length: usize },
    /// Non-negative 63-bit integer as decimal text
    Numeric,
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self::Alphanumeric { length: 6 }
    }
}

impl std::str::FromStr for IdPolicy {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alphanumeric" | "alnum" => Ok(Self::default()),
            "numeric" => Ok(Self::Numeric),
            other => Err(BlobError::invalid(format!("Unknown id policy: {}", other))),
        }
    }
}

/// Produces object identifiers.
///
/// The random source is seeded once when the generator is built, so rapid
/// successive calls draw from one sequence instead of re-seeding per call.
/// No collision check is made against the store.
pub struct IdGenerator {
    policy: IdPolicy,
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    pub fn new(policy: IdPolicy) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn policy(&self) -> IdPolicy {
        self.policy
    }

    pub fn generate(&self) -> ObjectId {
        let mut rng = self.rng.lock();
        let id = match self.policy {
            IdPolicy::Alphanumeric { length } => (&mut *rng)
                .sample_iter(&Alphanumeric)
                .take(length.max(1))
                .map(char::from)
                .collect(),
            IdPolicy::Numeric => (rng.gen::<u64>() >> 1).to_string(),
        };
        ObjectId(id)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(IdPolicy::default())
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Public base URL of the container; object URLs are `<base>/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUrl {
    base: String,
}

impl ContainerUrl {
    pub fn parse(raw: &str) -> BlobResult<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| BlobError::invalid(format!("Invalid container URL {:?}: {}", raw, e)))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(BlobError::invalid(format!("Container URL {:?} has no host", raw)));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(BlobError::invalid(format!(
                "Container URL {:?} must not carry a query or fragment",
                raw
            )));
        }
        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    pub fn object_url(&self, id: &ObjectId) -> String {
        format!("{}/{}", self.base, id)
    }
}

impl std::fmt::Display for ContainerUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}
