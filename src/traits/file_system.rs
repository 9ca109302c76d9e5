//! File systems: one parsed storage layer.

use std::sync::Arc;

use crate::{Context, FileEntry, PathSpec, VfsError};

/// A backend that parses one storage layer and exposes its entries.
///
/// A file system is valid while the raw data it was built from stays open.
/// Instances obtained from a [`Context`] are pinned by its cache until the
/// matching [`close_file_system`](Context::close_file_system); holders never
/// close them directly.
///
/// # Not Found vs. Errors
///
/// Lookups return `Ok(None)` when no entry exists and `Err` only when the
/// layer's structures cannot be read. Data that is not in this layer's format
/// surfaces as [`VfsError::Format`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Methods use `&self`.
///
/// # Object Safety
///
/// This trait is object-safe and is used as `dyn FileSystem`.
pub trait FileSystem: Send + Sync {
    /// Type indicator of the layer this file system parses.
    fn type_indicator(&self) -> &'static str;

    /// Entry for the layer's top-level location.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Format`] if the raw data is not in this layer's format
    fn root_file_entry(&self) -> Result<Arc<dyn FileEntry>, VfsError>;

    /// Resolves a path specification to an entry.
    ///
    /// When a spec carries both an inode-style key and a location, the key is
    /// used: it is a direct lookup where a location is a walk.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if the spec belongs to another layer
    /// - [`VfsError::Format`] or [`VfsError::Io`] for unreadable structures
    fn file_entry_by_path_spec(
        &self,
        path_spec: &PathSpec,
    ) -> Result<Option<Arc<dyn FileEntry>>, VfsError>;

    /// Checks whether an entry exists without materializing it.
    fn file_entry_exists_by_path_spec(&self, path_spec: &PathSpec) -> Result<bool, VfsError> {
        Ok(self.file_entry_by_path_spec(path_spec)?.is_some())
    }

    /// Builds the path specification of this file system's entry at `location`.
    fn path_spec_for_location(&self, location: &str) -> Result<PathSpec, VfsError>;

    /// Releases the file system's resources.
    ///
    /// Called by the [`Context`] when the last reference is closed. A file
    /// system that opened its parent through the context closes it here.
    fn close(&self, context: &Context) -> Result<(), VfsError> {
        let _ = context;
        Ok(())
    }
}

pub(crate) fn ensure_layer(
    type_indicator: &'static str,
    path_spec: &PathSpec,
) -> Result<(), VfsError> {
    if path_spec.type_indicator() == type_indicator {
        Ok(())
    } else {
        Err(VfsError::invalid_argument(
            path_spec.type_indicator(),
            format!("not a {type_indicator} path specification"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_system_is_object_safe() {
        fn _check(_: &dyn FileSystem) {}
    }

    #[test]
    fn ensure_layer_rejects_foreign_specs() {
        let spec = PathSpec::os("/x").unwrap();
        assert!(ensure_layer("OS", &spec).is_ok());
        assert!(matches!(
            ensure_layer("FAKE", &spec),
            Err(VfsError::InvalidArgument { .. })
        ));
    }
}
