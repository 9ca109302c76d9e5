//! # Resolver
//!
//! Turns path specifications into live file systems and file objects.
//!
//! ## Overview
//!
//! | Type | Role |
//! |------|------|
//! | [`Resolver`] | registry of providers per type indicator, plus the [`CompressionManager`] |
//! | [`Context`] | reference counted cache of opened instances |
//! | [`FileSystemProvider`] | builds a [`FileSystem`] for one type indicator |
//! | [`FileObjectProvider`] | builds a [`FileObject`] for one type indicator |
//!
//! Providers open whatever they read from through the [`Context`] they are
//! handed, so a nested chain opens each shared layer exactly once:
//!
//! ```text
//! TSK ──parent──▶ RAW ──parent──▶ OS
//!  │               │               │
//!  FileSystem      FileObject      FileObject   (each cached once per Context)
//! ```
//!
//! ## Entry Data Streams
//!
//! A type indicator with a file system provider but no file object provider
//! still resolves to a file object: the context opens the file system, looks
//! up the entry and serves its [`data_stream`](FileEntry::data_stream). The
//! file system stays pinned until that file object is closed.

mod context;

use std::collections::HashMap;
use std::sync::Arc;

use crate::backends::{
    CompressedStreamProvider, DataRangeProvider, OsFileObjectProvider, OsFileSystemProvider,
};
use crate::{CompressionManager, FileEntry, FileObject, FileSystem, PathSpec, VfsError};

pub use context::Context;

/// Builds file systems of one storage layer.
///
/// # Example
///
/// ```rust
/// use nestvfs::{Context, FileSystem, FileSystemProvider, PathSpec, VfsError};
/// use std::sync::Arc;
///
/// struct ExtProvider;
///
/// impl FileSystemProvider for ExtProvider {
///     fn type_indicator(&self) -> &'static str {
///         "EXT"
///     }
///
///     fn open_file_system(
///         &self,
///         context: &Context,
///         path_spec: &PathSpec,
///     ) -> Result<Arc<dyn FileSystem>, VfsError> {
///         let parent = path_spec.parent().ok_or_else(|| {
///             VfsError::invalid_argument("EXT", "missing parent")
///         })?;
///         let _image = context.open_file_object(parent)?;
///         // parse the superblock, build the file system
///         # unimplemented!()
///     }
/// }
/// ```
pub trait FileSystemProvider: Send + Sync {
    /// The type indicator this provider serves.
    fn type_indicator(&self) -> &'static str;

    /// Opens the file system `path_spec` lives in.
    ///
    /// Whatever is opened through `context` must be closed again by the
    /// returned file system's [`close`](FileSystem::close), or here if
    /// construction fails.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Format`] if the parent's data is not in this layer's format
    fn open_file_system(
        &self,
        context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileSystem>, VfsError>;
}

/// Builds raw data objects of one storage layer.
pub trait FileObjectProvider: Send + Sync {
    /// The type indicator this provider serves.
    fn type_indicator(&self) -> &'static str;

    /// Opens the data `path_spec` addresses.
    ///
    /// Same release contract as
    /// [`FileSystemProvider::open_file_system`].
    fn open_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileObject>, VfsError>;
}

/// Provider registry and compression codecs shared by contexts.
///
/// Built once and shared read-only through an `Arc`.
///
/// # Example
///
/// ```rust
/// use nestvfs::{Context, Resolver};
/// use std::sync::Arc;
///
/// let resolver = Arc::new(Resolver::with_builtin());
/// assert!(resolver.supports_file_object("DATA_RANGE"));
///
/// let context = Context::new(resolver);
/// assert!(context.is_empty());
/// ```
#[derive(Default)]
pub struct Resolver {
    file_systems: HashMap<&'static str, Arc<dyn FileSystemProvider>>,
    file_objects: HashMap<&'static str, Arc<dyn FileObjectProvider>>,
    compression: CompressionManager,
}

impl Resolver {
    /// Empty registry without codecs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the OS, DATA_RANGE and COMPRESSED_STREAM providers and
    /// the built-in codecs.
    pub fn with_builtin() -> Self {
        let mut resolver = Self {
            compression: CompressionManager::with_builtin(),
            ..Self::default()
        };
        let file_system: Arc<dyn FileSystemProvider> = Arc::new(OsFileSystemProvider);
        resolver
            .file_systems
            .insert(file_system.type_indicator(), file_system);
        let objects: [Arc<dyn FileObjectProvider>; 3] = [
            Arc::new(OsFileObjectProvider),
            Arc::new(DataRangeProvider),
            Arc::new(CompressedStreamProvider),
        ];
        for provider in objects {
            resolver
                .file_objects
                .insert(provider.type_indicator(), provider);
        }
        resolver
    }

    /// Registers a file system provider.
    ///
    /// # Errors
    ///
    /// - [`VfsError::AlreadyRegistered`] if its type indicator is taken
    pub fn register_file_system(
        &mut self,
        provider: impl FileSystemProvider + 'static,
    ) -> Result<(), VfsError> {
        let type_indicator = provider.type_indicator();
        if self.file_systems.contains_key(type_indicator) {
            return Err(VfsError::AlreadyRegistered {
                registry: "file system",
                key: type_indicator.to_string(),
            });
        }
        self.file_systems.insert(type_indicator, Arc::new(provider));
        Ok(())
    }

    /// Registers a file object provider.
    ///
    /// # Errors
    ///
    /// - [`VfsError::AlreadyRegistered`] if its type indicator is taken
    pub fn register_file_object(
        &mut self,
        provider: impl FileObjectProvider + 'static,
    ) -> Result<(), VfsError> {
        let type_indicator = provider.type_indicator();
        if self.file_objects.contains_key(type_indicator) {
            return Err(VfsError::AlreadyRegistered {
                registry: "file object",
                key: type_indicator.to_string(),
            });
        }
        self.file_objects.insert(type_indicator, Arc::new(provider));
        Ok(())
    }

    /// Removes the file system provider of a type indicator.
    pub fn deregister_file_system(&mut self, type_indicator: &str) -> bool {
        self.file_systems.remove(type_indicator).is_some()
    }

    /// Removes the file object provider of a type indicator.
    pub fn deregister_file_object(&mut self, type_indicator: &str) -> bool {
        self.file_objects.remove(type_indicator).is_some()
    }

    /// Returns `true` if file systems of this layer can be opened.
    pub fn supports_file_system(&self, type_indicator: &str) -> bool {
        self.file_systems.contains_key(type_indicator)
    }

    /// Returns `true` if file objects of this layer can be opened, directly
    /// or through an entry's data stream.
    pub fn supports_file_object(&self, type_indicator: &str) -> bool {
        self.file_objects.contains_key(type_indicator)
            || self.file_systems.contains_key(type_indicator)
    }

    /// The codecs available to decompressing layers.
    pub fn compression(&self) -> &CompressionManager {
        &self.compression
    }

    /// Mutable access to the codecs, for registering decompressors.
    pub fn compression_mut(&mut self) -> &mut CompressionManager {
        &mut self.compression
    }

    pub(crate) fn open_file_system(
        &self,
        context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        let provider = self
            .file_systems
            .get(path_spec.type_indicator())
            .ok_or_else(|| unknown(path_spec))?;
        provider.open_file_system(context, path_spec)
    }

    pub(crate) fn open_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileObject>, VfsError> {
        if let Some(provider) = self.file_objects.get(path_spec.type_indicator()) {
            return provider.open_file_object(context, path_spec);
        }
        if !self.file_systems.contains_key(path_spec.type_indicator()) {
            return Err(unknown(path_spec));
        }

        let Some(entry) = context.open_file_entry(path_spec)? else {
            return Err(VfsError::NotFound {
                path_spec: path_spec.comparable().to_string(),
            });
        };
        match entry.data_stream() {
            Ok(inner) => Ok(Arc::new(EntryDataStream {
                path_spec: path_spec.clone(),
                inner,
            })),
            Err(e) => {
                release_quietly(context.close_file_system(path_spec));
                Err(e)
            }
        }
    }
}

fn unknown(path_spec: &PathSpec) -> VfsError {
    VfsError::UnknownTypeIndicator {
        type_indicator: path_spec.type_indicator().to_string(),
    }
}

/// Drops the result of a release done while another error is propagated.
pub(crate) fn release_quietly(result: Result<(), VfsError>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "release after failed open");
    }
}

/// Data stream of a file entry, pinning its file system while open.
struct EntryDataStream {
    path_spec: PathSpec,
    inner: Box<dyn FileObject>,
}

impl FileObject for EntryDataStream {
    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        self.inner.read_at(offset, buf)
    }

    fn size(&self) -> Result<u64, VfsError> {
        self.inner.size()
    }

    fn close(&self, context: &Context) -> Result<(), VfsError> {
        self.inner.close(context)?;
        context.close_file_system(&self.path_spec)
    }
}
