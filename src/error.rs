//! Error types for the nested virtual file system.

use std::path::PathBuf;

/// Boxed lower-level cause carried by codec errors.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type with contextual variants for every layer of the resolver.
///
/// "Not found" during a lookup is not an error: lookups return `Ok(None)`.
/// [`VfsError::NotFound`] is reserved for opening raw data that must exist.
///
/// Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use nestvfs::VfsError;
///
/// let err = VfsError::UnknownTypeIndicator { type_indicator: "NTFS".into() };
/// assert_eq!(err.to_string(), "unknown type indicator: NTFS");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    // Construction errors
    /// A path specification was built with missing, unknown or mistyped attributes.
    #[error("invalid {type_indicator} path specification: {reason}")]
    InvalidArgument {
        /// Type indicator of the rejected specification.
        type_indicator: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No definition, provider or codec is registered for this type indicator.
    #[error("unknown type indicator: {type_indicator}")]
    UnknownTypeIndicator {
        /// The unregistered type indicator.
        type_indicator: String,
    },

    /// A registry already holds an entry under this key.
    #[error("{registry}: already registered: {key}")]
    AlreadyRegistered {
        /// The registry that refused the entry.
        registry: &'static str,
        /// The duplicate key.
        key: String,
    },

    // Lookup errors
    /// Raw data addressed by a path specification does not exist.
    #[error("not found: {path_spec}")]
    NotFound {
        /// Comparable string of the missing path specification.
        path_spec: String,
    },

    // Data errors
    /// The underlying bytes are not in the format this layer understands.
    #[error("{type_indicator}: unsupported format ({details})")]
    Format {
        /// Layer that failed to parse its input.
        type_indicator: String,
        /// Details about the mismatch.
        details: String,
    },

    /// A decompressor rejected structurally invalid data.
    #[error("{method} decompression failed: {source}")]
    Codec {
        /// Compression method of the failing codec.
        method: String,
        /// The codec's own error.
        #[source]
        source: BoxedCause,
    },

    /// No decompressor is registered for the compression method.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression {
        /// The requested method.
        method: String,
    },

    /// Cyclic or self-referential container metadata was detected.
    #[error("structural anomaly at {location}: {details}")]
    StructuralAnomaly {
        /// Location of the entry where traversal stopped.
        location: String,
        /// What was detected.
        details: String,
    },

    // Contract errors
    /// Mismatched open/close calls on a resolver context.
    #[error("resolver state violation for {key}: {details}")]
    State {
        /// Cache key the call referred to.
        key: String,
        /// Description of the violation.
        details: String,
    },

    /// An instance was used after its context closed it.
    #[error("{type_indicator}: used after close")]
    Closed {
        /// Type indicator of the closed instance.
        type_indicator: String,
    },

    /// Operation is not supported by this backend.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl VfsError {
    /// Shorthand for [`VfsError::InvalidArgument`].
    pub fn invalid_argument(type_indicator: impl Into<String>, reason: impl Into<String>) -> Self {
        VfsError::InvalidArgument {
            type_indicator: type_indicator.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VfsError::Format`].
    pub fn format(type_indicator: impl Into<String>, details: impl Into<String>) -> Self {
        VfsError::Format {
            type_indicator: type_indicator.into(),
            details: details.into(),
        }
    }

    /// Returns `true` for errors caused by data a layer cannot parse.
    pub fn is_format_error(&self) -> bool {
        matches!(self, VfsError::Format { .. })
    }
}

impl From<std::io::Error> for VfsError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound {
                path_spec: String::new(),
            },
            _ => VfsError::Io {
                operation: "io",
                path: PathBuf::new(),
                source: error,
            },
        }
    }
}
