pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid multiscale, axis or node metadata.
    #[error("malformed metadata at \"{path}\": {message}")]
    MalformedMetadata { path: String, message: String },
    /// Image metadata which disagrees with itself or with the OME-XML.
    #[error("inconsistent image \"{path}\": {message}")]
    Consistency { path: String, message: String },
    #[error("series not found: \"{0}\"")]
    SeriesNotFound(String),
    #[error("computation failed for \"{path}\": {message}")]
    Computation { path: String, message: String },
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedMetadata {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn consistency(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consistency {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn computation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Computation {
            path: path.into(),
            message: message.into(),
        }
    }
}
