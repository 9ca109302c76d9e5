//! File entries: the nodes of a layer's exposed tree.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::{FileEntryType, FileObject, PathSpec, Stat, VfsError};

/// A node (file, directory, link, device, pipe, socket) of a file system.
///
/// Stat and children are computed on first access and memoized for the
/// lifetime of the entry instance; [`EntryCache`] implements that contract
/// for backends. Containers are read-only snapshots, so memoized values are
/// never invalidated.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Methods use `&self`.
///
/// # Object Safety
///
/// This trait is object-safe and is used as `dyn FileEntry`.
pub trait FileEntry: Send + Sync {
    /// Name of the entry (last location segment, empty for a root).
    fn name(&self) -> &str;

    /// The path specification addressing this entry.
    fn path_spec(&self) -> &PathSpec;

    /// Stat information, computed once.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Io`] or [`VfsError::Format`] if the backend fails
    fn stat(&self) -> Result<&Stat, VfsError>;

    /// Child entries, expanded on first access and memoized.
    ///
    /// Non-directories return an empty slice.
    fn sub_file_entries(&self) -> Result<&[Arc<dyn FileEntry>], VfsError>;

    /// Opens the entry's data.
    ///
    /// The returned object is not cached by a context; dropping it releases it.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] for entries without data (directories)
    fn data_stream(&self) -> Result<Box<dyn FileObject>, VfsError>;

    /// Target of a symbolic link, if this entry is one and the layer records it.
    fn link_target(&self) -> Result<Option<String>, VfsError> {
        Ok(None)
    }

    /// The entry's type.
    fn entry_type(&self) -> Result<FileEntryType, VfsError> {
        Ok(self.stat()?.entry_type)
    }

    /// Returns `true` if this is a directory.
    fn is_directory(&self) -> Result<bool, VfsError> {
        Ok(self.entry_type()? == FileEntryType::Directory)
    }

    /// Returns `true` if this is a regular file.
    fn is_file(&self) -> Result<bool, VfsError> {
        Ok(self.entry_type()? == FileEntryType::File)
    }

    /// Returns `true` if this is a symbolic link.
    fn is_link(&self) -> Result<bool, VfsError> {
        Ok(self.entry_type()? == FileEntryType::Link)
    }
}

/// Compute-once storage for a file entry's stat and children.
///
/// Each value is either uncomputed or present. The first caller computes it
/// while holding that value's init lock, so concurrent callers never compute
/// twice; a failed computation leaves the value uncomputed. Listing children
/// may consult the stat.
///
/// # Example
///
/// ```rust
/// use nestvfs::{EntryCache, FileEntryType, Stat};
///
/// let cache = EntryCache::new();
/// let mut calls = 0;
/// for _ in 0..3 {
///     cache.stat_or_init(|| {
///         calls += 1;
///         Ok(Stat::new(FileEntryType::File))
///     })?;
/// }
/// assert_eq!(calls, 1);
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
#[derive(Default)]
pub struct EntryCache {
    stat: OnceLock<Stat>,
    children: OnceLock<Vec<Arc<dyn FileEntry>>>,
    stat_init: Mutex<()>,
    children_init: Mutex<()>,
}

impl EntryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stat, computing it with `init` on first use.
    pub fn stat_or_init<F>(&self, init: F) -> Result<&Stat, VfsError>
    where
        F: FnOnce() -> Result<Stat, VfsError>,
    {
        once(&self.stat, &self.stat_init, init)
    }

    /// Returns the children, computing them with `init` on first use.
    pub fn children_or_init<F>(&self, init: F) -> Result<&[Arc<dyn FileEntry>], VfsError>
    where
        F: FnOnce() -> Result<Vec<Arc<dyn FileEntry>>, VfsError>,
    {
        once(&self.children, &self.children_init, init).map(Vec::as_slice)
    }

    /// Returns `true` once the children have been enumerated.
    pub fn children_loaded(&self) -> bool {
        self.children.get().is_some()
    }
}

fn once<'a, T, F>(cell: &'a OnceLock<T>, lock: &Mutex<()>, init: F) -> Result<&'a T, VfsError>
where
    F: FnOnce() -> Result<T, VfsError>,
{
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn file_entry_is_object_safe() {
        fn _check(_: &dyn FileEntry) {}
    }

    #[test]
    fn failed_init_is_retried() {
        let cache = EntryCache::new();
        let err = cache.stat_or_init(|| {
            Err(VfsError::NotSupported {
                operation: "stat",
            })
        });
        assert!(err.is_err());

        let stat = cache
            .stat_or_init(|| Ok(Stat::new(FileEntryType::Directory)))
            .unwrap();
        assert!(stat.is_directory());
    }

    #[test]
    fn children_computed_once_across_threads() {
        let cache = Arc::new(EntryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    let children = cache
                        .children_or_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(Vec::new())
                        })
                        .unwrap();
                    children.len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.children_loaded());
    }
}
