use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    /// Signalled by backends when the container is already provisioned.
    #[error("Container already exists: {container}")]
    ContainerAlreadyExists { container: String },

    #[error("Failed to provision container {container}: {source}")]
    Provision {
        container: String,
        #[source]
        source: BoxError,
    },

    #[error("Upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Listing failed: {source}")]
    List {
        #[source]
        source: BoxError,
    },

    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: BoxError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a backend error from a plain message
    pub fn backend_message<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            source: message.into().into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn already_exists<S: Into<String>>(container: S) -> Self {
        Self::ContainerAlreadyExists {
            container: container.into(),
        }
    }

    /// Wrap a backend failure that happened while creating the container
    pub fn provision<S: Into<String>>(container: S, source: BlobError) -> Self {
        Self::Provision {
            container: container.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a backend failure that happened while writing an object
    pub fn upload<S: Into<String>>(key: S, source: BlobError) -> Self {
        Self::Upload {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a backend failure that happened while walking a listing
    pub fn list(source: BlobError) -> Self {
        Self::List {
            source: Box::new(source),
        }
    }
}
