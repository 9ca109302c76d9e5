//! # nestvfs
//!
//! A virtual file system for data nested inside storage containers: a file
//! inside a partition inside a disk image inside an archive, addressed and
//! read through one model.
//!
//! ---
//!
//! ## Quick Start
//!
//! Describe *how to reach* the data as a [`PathSpec`] chain, then let a
//! [`Context`] open every layer of it:
//!
//! ```rust
//! use nestvfs::{Context, FakeFileSystemBuilder, FileObjectExt, PathSpec, Resolver};
//! use std::sync::Arc;
//!
//! let mut resolver = Resolver::with_builtin();
//! resolver.register_file_system(
//!     FakeFileSystemBuilder::new()
//!         .add_file("/images/disk.raw", b"boot sector|partition one|tail".to_vec())
//!         .build(),
//! )?;
//! let context = Context::new(Arc::new(resolver));
//!
//! let image = PathSpec::fake("/images/disk.raw")?;
//! let partition = PathSpec::data_range(12, 13, &image)?;
//!
//! let data = context.open_file_object(&partition)?;
//! assert_eq!(data.read_to_end()?, b"partition one");
//! context.close_file_object(&partition)?;
//! assert!(context.is_empty());
//! # Ok::<(), nestvfs::VfsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`PathSpec`] | Immutable, chained address of data; also the cache key |
//! | [`PathSpecFactory`] | Registry of variant definitions, (de)serialization |
//! | [`Resolver`] | Registry of file system and file object providers |
//! | [`Context`] | Reference counted cache of opened layers |
//! | [`FileSystem`], [`FileEntry`], [`FileObject`] | What a storage layer implements |
//! | [`FileSystemSearcher`], [`FindSpec`] | Matching walk over a file system |
//! | [`CompressionManager`], [`Decompressor`] | Codecs for compressed layers |
//! | [`VfsError`] | Error type with context |
//!
//! ---
//!
//! ## Layers
//!
//! ```text
//! PathSpec chain (root first)          opened as
//! type: OS, location: /cases/img.E01   FileObject  (OsFileObject)
//! type: EWF                            FileObject  (external provider)
//! type: TSK, location: /etc/passwd     FileSystem + FileEntry (external provider)
//! ```
//!
//! Shipped layers: `OS`, `FAKE`, `DATA_RANGE` and `COMPRESSED_STREAM`. The
//! other [`type_indicators`] have definitions only, so their chains can be
//! built, compared and serialized; decoders plug in with a
//! [`FileSystemProvider`] or [`FileObjectProvider`].
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, VfsError>`. Lookups that find nothing
//! return `Ok(None)`, data a layer cannot parse is [`VfsError::Format`] and
//! a chain that does not fit its layers' schemas is rejected when built:
//!
//! ```rust
//! use nestvfs::{PathSpec, VfsError};
//!
//! let image = PathSpec::qcow(&PathSpec::os("/img.qcow2")?)?;
//! assert_eq!(image.depth(), 2);
//!
//! let err = PathSpec::tsk(None, None, &image).unwrap_err();
//! assert!(matches!(err, VfsError::InvalidArgument { .. }));
//! # Ok::<(), VfsError>(())
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! File systems, entries and file objects are `Send + Sync` and take `&self`.
//! A [`Context`] can be shared across threads; its cache lock is never held
//! while a layer is being opened.
//!
//! ---
//!
//! ## Logging
//!
//! Cache activity, pruning and anomalies are reported through `tracing`. The
//! crate never installs a subscriber.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for [`Stat`], [`AttributeValue`], [`SerializedLayer`]; JSON helpers |

// Private modules
mod backends;
mod compression;
mod error;
mod ext;
mod path_spec;
mod resolver;
mod searcher;
mod traits;
mod types;

// Public re-exports - error types
pub use error::{BoxedCause, VfsError};

// Public re-exports - core types
pub use types::{
    FileEntryType, LOCATION_SEPARATOR, ROOT_LOCATION, Stat, compression_methods, type_indicators,
};

// Public re-exports - path specifications
pub use path_spec::{
    AttributeField, AttributeKind, AttributeValue, Attributes, BUILTIN_DEFINITIONS,
    ParentRequirement, PathSpec, PathSpecDefinition, PathSpecFactory, SerializedLayer, attributes,
};

// Public re-exports - layer traits
pub use traits::{
    Decompressor, DecompressorConstructor, DecompressorRegistration, EntryCache, FileEntry,
    FileObject, FileObjectReader, FileSystem,
};

// Public re-exports - resolution
pub use resolver::{Context, FileObjectProvider, FileSystemProvider, Resolver};

// Public re-exports - search
pub use searcher::{Find, FileSystemSearcher, FindSpec, SearcherConfig};

// Public re-exports - codecs
pub use compression::{CompressionManager, DEFLATE, ZLIB, ZlibDecompressor};

// Public re-exports - backends
pub use backends::{
    CompressedStreamFileObject, CompressedStreamProvider, DataRangeFileObject, DataRangeProvider,
    FakeFileEntry, FakeFileSystem, FakeFileSystemBuilder, OsFileEntry, OsFileObject,
    OsFileObjectProvider, OsFileSystem, OsFileSystemProvider,
};

// Public re-exports - infrastructure
pub use ext::FileObjectExt;

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::FileObjectExtJson;
