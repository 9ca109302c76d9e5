//! # Backends
//!
//! Storage layers that need no format parsing.
//!
//! | Type indicator | Provides | Reads from |
//! |----------------|----------|------------|
//! | `OS` | file system, file object | the host |
//! | `FAKE` | file system (file objects via entry data) | an in-memory tree |
//! | `DATA_RANGE` | file object | a byte window of the parent |
//! | `COMPRESSED_STREAM` | file object | the parent, decompressed |
//!
//! All but `FAKE` are registered by
//! [`Resolver::with_builtin`](crate::Resolver::with_builtin). A fake tree is
//! registered by passing the built [`FakeFileSystem`] to
//! [`Resolver::register_file_system`](crate::Resolver::register_file_system).

mod compressed_stream;
mod data_range;
mod fake;
mod os;

pub use compressed_stream::{CompressedStreamFileObject, CompressedStreamProvider};
pub use data_range::{DataRangeFileObject, DataRangeProvider};
pub use fake::{FakeFileEntry, FakeFileSystem, FakeFileSystemBuilder};
pub use os::{OsFileEntry, OsFileObject, OsFileObjectProvider, OsFileSystem, OsFileSystemProvider};

use crate::{PathSpec, VfsError};

/// The parent layer of a spec whose definition requires one.
pub(crate) fn require_parent(path_spec: &PathSpec) -> Result<&PathSpec, VfsError> {
    path_spec
        .parent()
        .ok_or_else(|| VfsError::invalid_argument(path_spec.type_indicator(), "missing parent"))
}

/// Name of the last segment of a location; empty for the root.
pub(crate) fn base_name(location: &str) -> &str {
    location
        .trim_end_matches(crate::LOCATION_SEPARATOR)
        .rsplit(crate::LOCATION_SEPARATOR)
        .next()
        .unwrap_or_default()
}
