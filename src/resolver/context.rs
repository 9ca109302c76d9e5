//! Reference counted cache of opened file systems and file objects.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{FileEntry, FileObject, FileSystem, PathSpec, Resolver, VfsError};

/// Cache of live instances, keyed by comparable strings.
///
/// Every successful `open_*` must be paired with one `close_*` for an equal
/// path specification. The instance is closed and evicted when its last
/// reference is released. Closing more often than opening is a contract
/// violation reported as [`VfsError::State`].
///
/// | Instance | Cache key |
/// |----------|-----------|
/// | file system | [`PathSpec::file_system_key`] |
/// | file object | [`PathSpec::comparable`] |
///
/// The cache lock is never held while a provider runs. Two threads opening
/// the same key may both construct; the first insert wins and the other
/// instance is closed again.
///
/// # Example
///
/// ```rust
/// use nestvfs::{Context, FakeFileSystemBuilder, PathSpec, Resolver};
/// use std::sync::Arc;
///
/// let mut resolver = Resolver::with_builtin();
/// resolver.register_file_system(FakeFileSystemBuilder::new().add_file("/a", "x").build())?;
/// let context = Context::new(Arc::new(resolver));
///
/// let spec = PathSpec::fake("/a")?;
/// let first = context.open_file_system(&spec)?;
/// let second = context.open_file_system(&PathSpec::fake("/")?)?;
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(context.file_system_reference_count(&spec), 2);
///
/// context.close_file_system(&spec)?;
/// context.close_file_system(&spec)?;
/// assert!(context.is_empty());
/// assert!(context.close_file_system(&spec).is_err());
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
pub struct Context {
    resolver: Arc<Resolver>,
    cache: Mutex<Cache>,
}

#[derive(Default)]
struct Cache {
    file_systems: HashMap<String, Cached<dyn FileSystem>>,
    file_objects: HashMap<String, Cached<dyn FileObject>>,
}

struct Cached<T: ?Sized> {
    instance: Arc<T>,
    references: usize,
}

/// The two kinds of cached instance.
trait Kind {
    type Instance: ?Sized;

    const NAME: &'static str;

    fn key(path_spec: &PathSpec) -> &str;

    fn map(cache: &mut Cache) -> &mut HashMap<String, Cached<Self::Instance>>;

    fn construct(context: &Context, path_spec: &PathSpec)
    -> Result<Arc<Self::Instance>, VfsError>;

    fn release(instance: &Self::Instance, context: &Context) -> Result<(), VfsError>;
}

struct FileSystems;

impl Kind for FileSystems {
    type Instance = dyn FileSystem;

    const NAME: &'static str = "file system";

    fn key(path_spec: &PathSpec) -> &str {
        path_spec.file_system_key()
    }

    fn map(cache: &mut Cache) -> &mut HashMap<String, Cached<dyn FileSystem>> {
        &mut cache.file_systems
    }

    fn construct(context: &Context, path_spec: &PathSpec) -> Result<Arc<dyn FileSystem>, VfsError> {
        context.resolver.open_file_system(context, path_spec)
    }

    fn release(instance: &dyn FileSystem, context: &Context) -> Result<(), VfsError> {
        instance.close(context)
    }
}

struct FileObjects;

impl Kind for FileObjects {
    type Instance = dyn FileObject;

    const NAME: &'static str = "file object";

    fn key(path_spec: &PathSpec) -> &str {
        path_spec.comparable()
    }

    fn map(cache: &mut Cache) -> &mut HashMap<String, Cached<dyn FileObject>> {
        &mut cache.file_objects
    }

    fn construct(context: &Context, path_spec: &PathSpec) -> Result<Arc<dyn FileObject>, VfsError> {
        context.resolver.open_file_object(context, path_spec)
    }

    fn release(instance: &dyn FileObject, context: &Context) -> Result<(), VfsError> {
        instance.close(context)
    }
}

impl Context {
    /// Empty context resolving through `resolver`.
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// The registry this context resolves through.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Opens, or reuses, the file system `path_spec` lives in.
    ///
    /// # Errors
    ///
    /// - [`VfsError::UnknownTypeIndicator`] if no provider serves the layer
    /// - whatever the provider fails with, [`VfsError::Format`] included
    pub fn open_file_system(&self, path_spec: &PathSpec) -> Result<Arc<dyn FileSystem>, VfsError> {
        self.open::<FileSystems>(path_spec)
    }

    /// Releases one reference obtained from
    /// [`open_file_system`](Self::open_file_system).
    ///
    /// # Errors
    ///
    /// - [`VfsError::State`] if the file system is not open
    pub fn close_file_system(&self, path_spec: &PathSpec) -> Result<(), VfsError> {
        self.close::<FileSystems>(path_spec)
    }

    /// Opens, or reuses, the raw data `path_spec` addresses.
    ///
    /// # Errors
    ///
    /// - [`VfsError::UnknownTypeIndicator`] if no provider serves the layer
    /// - [`VfsError::NotFound`] if the data does not exist
    pub fn open_file_object(&self, path_spec: &PathSpec) -> Result<Arc<dyn FileObject>, VfsError> {
        self.open::<FileObjects>(path_spec)
    }

    /// Releases one reference obtained from
    /// [`open_file_object`](Self::open_file_object).
    ///
    /// # Errors
    ///
    /// - [`VfsError::State`] if the file object is not open
    pub fn close_file_object(&self, path_spec: &PathSpec) -> Result<(), VfsError> {
        self.close::<FileObjects>(path_spec)
    }

    /// Opens the file system of `path_spec` and looks the entry up.
    ///
    /// On `Ok(Some(_))` the file system stays open and the caller closes it
    /// with [`close_file_system`](Self::close_file_system) once done with the
    /// entry. On `Ok(None)` and on errors nothing stays open.
    pub fn open_file_entry(
        &self,
        path_spec: &PathSpec,
    ) -> Result<Option<Arc<dyn FileEntry>>, VfsError> {
        let file_system = self.open_file_system(path_spec)?;
        let lookup = file_system.file_entry_by_path_spec(path_spec);
        drop(file_system);
        match lookup {
            Ok(Some(entry)) => Ok(Some(entry)),
            Ok(None) => {
                self.close_file_system(path_spec)?;
                Ok(None)
            }
            Err(e) => {
                super::release_quietly(self.close_file_system(path_spec));
                Err(e)
            }
        }
    }

    /// Open references to the file system of `path_spec`, 0 if not cached.
    pub fn file_system_reference_count(&self, path_spec: &PathSpec) -> usize {
        self.lock()
            .file_systems
            .get(path_spec.file_system_key())
            .map_or(0, |c| c.references)
    }

    /// Open references to the file object of `path_spec`, 0 if not cached.
    pub fn file_object_reference_count(&self, path_spec: &PathSpec) -> usize {
        self.lock()
            .file_objects
            .get(path_spec.comparable())
            .map_or(0, |c| c.references)
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        let cache = self.lock();
        cache.file_systems.is_empty() && cache.file_objects.is_empty()
    }

    /// Closes every cached instance regardless of reference counts.
    ///
    /// Deeper layers are closed first, so instances releasing their parents
    /// find them still cached. Returns the first close error after trying
    /// every instance.
    pub fn close_all(&self) -> Result<(), VfsError> {
        let mut pending: Vec<(usize, bool, String)> = {
            let cache = self.lock();
            let objects = cache.file_objects.keys().map(|k| (k, true));
            let systems = cache.file_systems.keys().map(|k| (k, false));
            objects
                .chain(systems)
                .map(|(key, is_object)| (key.lines().count(), is_object, key.clone()))
                .collect()
        };
        // deepest first, file objects before file systems of equal depth
        pending.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut first_error = None;
        for (_, is_object, key) in pending {
            let result = if is_object {
                self.evict::<FileObjects>(&key)
            } else {
                self.evict::<FileSystems>(&key)
            };
            if let Err(e) = result {
                tracing::error!(key = %key, error = %e, "close failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn open<K: Kind>(&self, path_spec: &PathSpec) -> Result<Arc<K::Instance>, VfsError> {
        let key = K::key(path_spec);
        if let Some(cached) = K::map(&mut self.lock()).get_mut(key) {
            cached.references += 1;
            tracing::debug!(kind = K::NAME, key, references = cached.references, "cache hit");
            return Ok(Arc::clone(&cached.instance));
        }

        let instance = K::construct(self, path_spec)?;

        let (winner, loser) = match K::map(&mut self.lock()).entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let cached = occupied.get_mut();
                cached.references += 1;
                (Arc::clone(&cached.instance), Some(instance))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Cached {
                    instance: Arc::clone(&instance),
                    references: 1,
                });
                (instance, None)
            }
        };

        match loser {
            Some(loser) => {
                tracing::debug!(kind = K::NAME, key, "concurrent open, closing duplicate");
                // the caller already holds a counted reference to the winner
                if let Err(e) = K::release(&loser, self) {
                    tracing::warn!(kind = K::NAME, key, error = %e, "closing duplicate failed");
                }
            }
            None => tracing::debug!(kind = K::NAME, key, "opened"),
        }
        Ok(winner)
    }

    fn close<K: Kind>(&self, path_spec: &PathSpec) -> Result<(), VfsError> {
        let key = K::key(path_spec);
        let evicted = {
            let mut cache = self.lock();
            let map = K::map(&mut cache);
            let Some(cached) = map.get_mut(key) else {
                drop(cache);
                tracing::error!(kind = K::NAME, key, "close without matching open");
                return Err(VfsError::State {
                    key: key.to_string(),
                    details: format!("{} is not open", K::NAME),
                });
            };
            cached.references -= 1;
            if cached.references > 0 {
                tracing::debug!(kind = K::NAME, key, references = cached.references, "released");
                return Ok(());
            }
            map.remove(key)
        };

        match evicted {
            Some(cached) => {
                tracing::debug!(kind = K::NAME, key, "evicted");
                K::release(&cached.instance, self)
            }
            None => Ok(()),
        }
    }

    fn evict<K: Kind>(&self, key: &str) -> Result<(), VfsError> {
        let removed = K::map(&mut self.lock()).remove(key);
        match removed {
            Some(cached) => K::release(&cached.instance, self),
            // released by a deeper layer's close
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        let (file_systems, file_objects) = {
            let cache = self.lock();
            (cache.file_systems.len(), cache.file_objects.len())
        };
        if file_systems + file_objects > 0 {
            tracing::warn!(file_systems, file_objects, "context dropped with open instances");
            let _ = self.close_all();
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.lock();
        f.debug_struct("Context")
            .field("file_systems", &cache.file_systems.len())
            .field("file_objects", &cache.file_objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileObjectProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts constructions and closes of a byte object.
    struct Counting {
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct Bytes {
        spec: PathSpec,
        closed: Arc<AtomicUsize>,
    }

    impl FileObject for Bytes {
        fn path_spec(&self) -> &PathSpec {
            &self.spec
        }

        fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize, VfsError> {
            Ok(0)
        }

        fn size(&self) -> Result<u64, VfsError> {
            Ok(0)
        }

        fn close(&self, _context: &Context) -> Result<(), VfsError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl FileObjectProvider for Counting {
        fn type_indicator(&self) -> &'static str {
            "OS"
        }

        fn open_file_object(
            &self,
            _context: &Context,
            path_spec: &PathSpec,
        ) -> Result<Arc<dyn FileObject>, VfsError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Bytes {
                spec: path_spec.clone(),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn counting_context() -> (Context, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let mut resolver = Resolver::new();
        resolver
            .register_file_object(Counting {
                opened: Arc::clone(&opened),
                closed: Arc::clone(&closed),
            })
            .unwrap();
        (Context::new(Arc::new(resolver)), opened, closed)
    }

    #[test]
    fn n_opens_and_n_closes_leave_context_empty() {
        let (context, opened, closed) = counting_context();
        let spec = PathSpec::os("/evidence.raw").unwrap();

        let first = context.open_file_object(&spec).unwrap();
        for _ in 0..4 {
            let again = context.open_file_object(&PathSpec::os("/evidence.raw").unwrap()).unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(context.file_object_reference_count(&spec), 5);

        for _ in 0..5 {
            context.close_file_object(&spec).unwrap();
        }
        assert!(context.is_empty());
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        let err = context.close_file_object(&spec).unwrap_err();
        assert!(matches!(err, VfsError::State { .. }));
    }

    #[test]
    fn instance_is_closed_only_at_zero() {
        let (context, _, closed) = counting_context();
        let spec = PathSpec::os("/a").unwrap();

        context.open_file_object(&spec).unwrap();
        context.open_file_object(&spec).unwrap();
        context.close_file_object(&spec).unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert_eq!(context.file_object_reference_count(&spec), 1);

        context.close_file_object(&spec).unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    /// Builds distinct objects once two openers are both inside the provider;
    /// every close fails.
    struct Racing {
        barrier: std::sync::Barrier,
    }

    struct Failing {
        spec: PathSpec,
    }

    impl FileObject for Failing {
        fn path_spec(&self) -> &PathSpec {
            &self.spec
        }

        fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize, VfsError> {
            Ok(0)
        }

        fn size(&self) -> Result<u64, VfsError> {
            Ok(0)
        }

        fn close(&self, _context: &Context) -> Result<(), VfsError> {
            Err(VfsError::format("OS", "close failed"))
        }
    }

    impl FileObjectProvider for Racing {
        fn type_indicator(&self) -> &'static str {
            "OS"
        }

        fn open_file_object(
            &self,
            _context: &Context,
            path_spec: &PathSpec,
        ) -> Result<Arc<dyn FileObject>, VfsError> {
            self.barrier.wait();
            Ok(Arc::new(Failing {
                spec: path_spec.clone(),
            }))
        }
    }

    #[test]
    fn failed_duplicate_close_still_hands_out_the_winner() {
        let mut resolver = Resolver::new();
        resolver
            .register_file_object(Racing {
                barrier: std::sync::Barrier::new(2),
            })
            .unwrap();
        let context = Context::new(Arc::new(resolver));
        let spec = PathSpec::os("/shared.raw").unwrap();

        let objects: Vec<Arc<dyn FileObject>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| context.open_file_object(&spec)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().ok().unwrap())
                .collect()
        });
        assert!(Arc::ptr_eq(&objects[0], &objects[1]));
        assert_eq!(context.file_object_reference_count(&spec), 2);

        context.close_file_object(&spec).unwrap();
        // the last close evicts even though the instance fails to close
        assert!(context.close_file_object(&spec).unwrap_err().is_format_error());
        assert!(context.is_empty());
    }

    #[test]
    fn unknown_layer_fails_to_open() {
        let context = Context::new(Arc::new(Resolver::new()));
        let spec = PathSpec::os("/a").unwrap();
        assert!(matches!(
            context.open_file_system(&spec),
            Err(VfsError::UnknownTypeIndicator { .. })
        ));
        assert!(context.is_empty());
    }

    #[test]
    fn close_without_open_is_state_error() {
        let context = Context::new(Arc::new(Resolver::with_builtin()));
        let spec = PathSpec::os("/never/opened").unwrap();
        assert!(matches!(
            context.close_file_system(&spec),
            Err(VfsError::State { .. })
        ));
    }

    #[test]
    fn concurrent_opens_share_one_entry() {
        let (context, _, closed) = counting_context();
        let context = Arc::new(context);
        let spec = PathSpec::os("/shared").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                let spec = spec.clone();
                std::thread::spawn(move || context.open_file_object(&spec).unwrap())
            })
            .collect();
        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(context.file_object_reference_count(&spec), 8);
        // duplicates built by racing threads are closed immediately
        let duplicates = closed.load(Ordering::SeqCst);

        for _ in 0..8 {
            context.close_file_object(&spec).unwrap();
        }
        assert_eq!(closed.load(Ordering::SeqCst), duplicates + 1);
    }

    #[test]
    fn close_all_empties_the_cache() {
        let (context, _, closed) = counting_context();
        for location in ["/a", "/b"] {
            let spec = PathSpec::os(location).unwrap();
            context.open_file_object(&spec).unwrap();
            context.open_file_object(&spec).unwrap();
        }

        context.close_all().unwrap();
        assert!(context.is_empty());
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drop_closes_live_instances() {
        let (context, _, closed) = counting_context();
        context.open_file_object(&PathSpec::os("/leak").unwrap()).unwrap();
        drop(context);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
