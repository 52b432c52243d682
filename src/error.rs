/// Convenience result type used across Flipbook.
pub type FlipbookResult<T> = Result<T, FlipbookError>;

/// Top-level error taxonomy used by the load/decode pipeline.
///
/// All four pipeline variants propagate out of a load unchanged; nothing is
/// retried internally and nothing partial is ever cached.
#[derive(thiserror::Error, Debug)]
pub enum FlipbookError {
    /// Transport failure or non-success status while fetching network bytes.
    #[error("network error: {0}")]
    Network(String),

    /// A bundled asset was requested that the bundle does not contain.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// Filesystem read failure for file sources.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unsupported encoded image container.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid caller-provided configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlipbookError {
    /// Build a [`FlipbookError::Network`] value.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Build a [`FlipbookError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`FlipbookError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`FlipbookError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_map_to_variants() {
        assert!(matches!(
            FlipbookError::network("x"),
            FlipbookError::Network(_)
        ));
        assert!(matches!(
            FlipbookError::not_found("x"),
            FlipbookError::NotFound(_)
        ));
        assert!(matches!(FlipbookError::decode("x"), FlipbookError::Decode(_)));
        assert!(matches!(
            FlipbookError::validation("x"),
            FlipbookError::Validation(_)
        ));
    }

    #[test]
    fn io_errors_convert() {
        let err: FlipbookError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, FlipbookError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
