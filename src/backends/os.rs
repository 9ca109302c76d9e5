//! Host operating system layer.
//!
//! Locations are host paths. Stat uses `symlink_metadata`, so a link is
//! reported as a link and never traversed.

use std::fs::{self, File, Metadata};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backends::base_name;
use crate::traits::ensure_layer;
use crate::types::{ROOT_LOCATION, type_indicators};
use crate::{
    Context, EntryCache, FileEntry, FileEntryType, FileObject, FileObjectProvider, FileSystem,
    FileSystemProvider, PathSpec, Stat, VfsError,
};

/// The host file system. Stateless; one instance serves every location.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn type_indicator(&self) -> &'static str {
        type_indicators::OS
    }

    fn root_file_entry(&self) -> Result<Arc<dyn FileEntry>, VfsError> {
        Ok(Arc::new(OsFileEntry::new(PathSpec::os(ROOT_LOCATION)?)?))
    }

    fn file_entry_by_path_spec(
        &self,
        path_spec: &PathSpec,
    ) -> Result<Option<Arc<dyn FileEntry>>, VfsError> {
        ensure_layer(type_indicators::OS, path_spec)?;
        let entry = OsFileEntry::new(path_spec.clone())?;
        match fs::symlink_metadata(&entry.path) {
            Ok(_) => Ok(Some(Arc::new(entry))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("stat", &entry.path, e)),
        }
    }

    fn file_entry_exists_by_path_spec(&self, path_spec: &PathSpec) -> Result<bool, VfsError> {
        ensure_layer(type_indicators::OS, path_spec)?;
        let path = location_path(path_spec)?;
        match fs::symlink_metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("stat", &path, e)),
        }
    }

    fn path_spec_for_location(&self, location: &str) -> Result<PathSpec, VfsError> {
        PathSpec::os(location)
    }
}

/// Opens [`OsFileSystem`] for the `OS` type indicator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystemProvider;

impl FileSystemProvider for OsFileSystemProvider {
    fn type_indicator(&self) -> &'static str {
        type_indicators::OS
    }

    fn open_file_system(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileSystem>, VfsError> {
        ensure_layer(type_indicators::OS, path_spec)?;
        Ok(Arc::new(OsFileSystem))
    }
}

/// A host file, directory or special file.
pub struct OsFileEntry {
    path_spec: PathSpec,
    path: PathBuf,
    name: String,
    cache: EntryCache,
}

impl OsFileEntry {
    fn new(path_spec: PathSpec) -> Result<Self, VfsError> {
        let path = location_path(&path_spec)?;
        let name = base_name(path_spec.location().unwrap_or_default()).to_string();
        Ok(Self {
            path_spec,
            path,
            name,
            cache: EntryCache::new(),
        })
    }

    /// The host path of this entry.
    pub fn host_path(&self) -> &Path {
        &self.path
    }
}

impl FileEntry for OsFileEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn stat(&self) -> Result<&Stat, VfsError> {
        self.cache.stat_or_init(|| {
            let metadata = fs::symlink_metadata(&self.path)
                .map_err(|e| io_error("stat", &self.path, e))?;
            Ok(stat_from_metadata(&metadata))
        })
    }

    fn sub_file_entries(&self) -> Result<&[Arc<dyn FileEntry>], VfsError> {
        self.cache.children_or_init(|| {
            if !self.stat()?.is_directory() {
                return Ok(Vec::new());
            }
            let listing_error = |e| io_error("read_dir", &self.path, e);
            let mut locations = Vec::new();
            for dir_entry in fs::read_dir(&self.path).map_err(listing_error)? {
                let dir_entry = dir_entry.map_err(listing_error)?;
                match dir_entry.path().into_os_string().into_string() {
                    Ok(location) => locations.push(location),
                    // locations must map back to the host path
                    Err(raw) => {
                        tracing::warn!(path = ?raw, "skipping entry with a non UTF-8 name");
                    }
                }
            }
            // read_dir order is unspecified
            locations.sort();

            locations
                .into_iter()
                .map(|location| -> Result<Arc<dyn FileEntry>, VfsError> {
                    Ok(Arc::new(OsFileEntry::new(PathSpec::os(location)?)?))
                })
                .collect()
        })
    }

    fn data_stream(&self) -> Result<Box<dyn FileObject>, VfsError> {
        if self.stat()?.is_directory() {
            return Err(VfsError::NotSupported {
                operation: "data_stream on a directory",
            });
        }
        Ok(Box::new(OsFileObject::open(&self.path_spec)?))
    }

    fn link_target(&self) -> Result<Option<String>, VfsError> {
        if !self.stat()?.is_link() {
            return Ok(None);
        }
        let target =
            fs::read_link(&self.path).map_err(|e| io_error("read_link", &self.path, e))?;
        Ok(Some(target.to_string_lossy().into_owned()))
    }
}

/// An open host file.
pub struct OsFileObject {
    path_spec: PathSpec,
    file: Mutex<Option<File>>,
    size: u64,
}

impl OsFileObject {
    /// Opens the file at the spec's location.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotFound`] if there is no file
    /// - [`VfsError::Io`] for other host failures
    pub fn open(path_spec: &PathSpec) -> Result<Self, VfsError> {
        ensure_layer(type_indicators::OS, path_spec)?;
        let path = location_path(path_spec)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound {
                path_spec: path_spec.comparable().to_string(),
            },
            _ => io_error("open", &path, e),
        })?;
        let size = file.metadata().map_err(|e| io_error("stat", &path, e))?.len();
        Ok(Self {
            path_spec: path_spec.clone(),
            file: Mutex::new(Some(file)),
            size,
        })
    }
}

impl FileObject for OsFileObject {
    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = guard.as_mut().ok_or_else(|| VfsError::Closed {
            type_indicator: type_indicators::OS.to_string(),
        })?;
        read_full(file, offset, buf).map_err(|e| VfsError::Io {
            operation: "read",
            path: PathBuf::from(self.path_spec.location().unwrap_or_default()),
            source: e,
        })
    }

    fn size(&self) -> Result<u64, VfsError> {
        Ok(self.size)
    }

    fn close(&self, _context: &Context) -> Result<(), VfsError> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// Opens [`OsFileObject`] for the `OS` type indicator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileObjectProvider;

impl FileObjectProvider for OsFileObjectProvider {
    fn type_indicator(&self) -> &'static str {
        type_indicators::OS
    }

    fn open_file_object(
        &self,
        _context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileObject>, VfsError> {
        Ok(Arc::new(OsFileObject::open(path_spec)?))
    }
}

fn read_full(file: &mut File, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn location_path(path_spec: &PathSpec) -> Result<PathBuf, VfsError> {
    path_spec
        .location()
        .map(PathBuf::from)
        .ok_or_else(|| VfsError::invalid_argument(type_indicators::OS, "missing location"))
}

fn io_error(operation: &'static str, path: &Path, source: std::io::Error) -> VfsError {
    VfsError::Io {
        operation,
        path: path.to_path_buf(),
        source,
    }
}

fn stat_from_metadata(metadata: &Metadata) -> Stat {
    let file_type = metadata.file_type();
    let entry_type = if file_type.is_symlink() {
        FileEntryType::Link
    } else if file_type.is_dir() {
        FileEntryType::Directory
    } else if file_type.is_file() {
        FileEntryType::File
    } else {
        special_type(&file_type)
    };

    let mut stat = Stat::new(entry_type);
    stat.size = metadata.len();
    if let Ok(time) = metadata.accessed() {
        stat.accessed = time;
    }
    if let Ok(time) = metadata.modified() {
        stat.modified = time;
    }
    set_unix_fields(&mut stat, metadata);
    stat
}

#[cfg(unix)]
fn special_type(file_type: &fs::FileType) -> FileEntryType {
    use std::os::unix::fs::FileTypeExt;

    if file_type.is_fifo() {
        FileEntryType::Pipe
    } else if file_type.is_socket() {
        FileEntryType::Socket
    } else {
        FileEntryType::Device
    }
}

#[cfg(not(unix))]
fn special_type(_file_type: &fs::FileType) -> FileEntryType {
    FileEntryType::Device
}

#[cfg(unix)]
fn set_unix_fields(stat: &mut Stat, metadata: &Metadata) {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, SystemTime};

    stat.mode = metadata.mode() & 0o7777;
    stat.uid = metadata.uid();
    stat.gid = metadata.gid();
    stat.inode = Some(metadata.ino());
    if let (Ok(seconds), Ok(nanos)) = (
        u64::try_from(metadata.ctime()),
        u32::try_from(metadata.ctime_nsec()),
    ) {
        stat.changed = SystemTime::UNIX_EPOCH + Duration::new(seconds, nanos);
    }
}

#[cfg(not(unix))]
fn set_unix_fields(stat: &mut Stat, metadata: &Metadata) {
    if metadata.permissions().readonly() {
        stat.mode &= !0o222;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolver;

    fn scratch() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs/syslog"), b"Jan 1 boot\n").unwrap();
        fs::write(dir.path().join("readme.txt"), b"hello").unwrap();
        dir
    }

    fn spec(dir: &tempfile::TempDir, relative: &str) -> PathSpec {
        PathSpec::os(dir.path().join(relative).to_string_lossy().into_owned()).unwrap()
    }

    #[test]
    fn entry_lookup_and_stat() {
        let dir = scratch();
        let entry = OsFileSystem
            .file_entry_by_path_spec(&spec(&dir, "readme.txt"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.name(), "readme.txt");
        assert!(entry.is_file().unwrap());
        assert_eq!(entry.stat().unwrap().size, 5);
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = scratch();
        let missing = spec(&dir, "nope");
        assert!(OsFileSystem.file_entry_by_path_spec(&missing).unwrap().is_none());
        assert!(!OsFileSystem.file_entry_exists_by_path_spec(&missing).unwrap());
    }

    #[test]
    fn children_are_sorted() {
        let dir = scratch();
        let root = OsFileSystem
            .file_entry_by_path_spec(&spec(&dir, ""))
            .unwrap()
            .unwrap();
        let names: Vec<_> = root
            .sub_file_entries()
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, ["logs", "readme.txt"]);
    }

    #[test]
    fn file_object_reads_at_offsets() {
        let dir = scratch();
        let object = OsFileObject::open(&spec(&dir, "logs/syslog")).unwrap();
        assert_eq!(object.size().unwrap(), 11);

        let mut buf = [0u8; 4];
        assert_eq!(object.read_at(6, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"boot");
        assert_eq!(object.read_at(11, &mut buf).unwrap(), 0);
    }

    #[test]
    fn closed_object_refuses_reads() {
        let dir = scratch();
        let context = Context::new(Arc::new(Resolver::with_builtin()));
        let object = OsFileObject::open(&spec(&dir, "readme.txt")).unwrap();
        object.close(&context).unwrap();
        assert!(matches!(
            object.read_at(0, &mut [0u8; 1]),
            Err(VfsError::Closed { .. })
        ));
    }

    #[test]
    fn opening_missing_file_is_not_found() {
        let dir = scratch();
        assert!(matches!(
            OsFileObject::open(&spec(&dir, "absent.bin")),
            Err(VfsError::NotFound { .. })
        ));
    }

    #[test]
    fn directory_has_no_data_stream() {
        let dir = scratch();
        let entry = OsFileSystem
            .file_entry_by_path_spec(&spec(&dir, "logs"))
            .unwrap()
            .unwrap();
        assert!(matches!(
            entry.data_stream(),
            Err(VfsError::NotSupported { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::os::unix::ffi::OsStrExt;

        let dir = scratch();
        let raw = std::ffi::OsStr::from_bytes(b"carved\xff.bin");
        fs::write(dir.path().join("logs").join(raw), b"").unwrap();

        let logs = OsFileSystem
            .file_entry_by_path_spec(&spec(&dir, "logs"))
            .unwrap()
            .unwrap();
        let names: Vec<_> = logs
            .sub_file_entries()
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, ["syslog"]);
    }

    #[cfg(unix)]
    #[test]
    fn change_time_keeps_nanoseconds() {
        use std::os::unix::fs::MetadataExt;
        use std::time::UNIX_EPOCH;

        let dir = scratch();
        let path = dir.path().join("readme.txt");
        let metadata = fs::symlink_metadata(&path).unwrap();
        let entry = OsFileSystem
            .file_entry_by_path_spec(&spec(&dir, "readme.txt"))
            .unwrap()
            .unwrap();
        let changed = entry.stat().unwrap().changed.duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(changed.as_secs() as i64, metadata.ctime());
        assert_eq!(i64::from(changed.subsec_nanos()), metadata.ctime_nsec());
    }

    #[cfg(unix)]
    #[test]
    fn links_are_not_followed() {
        let dir = scratch();
        std::os::unix::fs::symlink(dir.path().join("logs"), dir.path().join("current")).unwrap();

        let entry = OsFileSystem
            .file_entry_by_path_spec(&spec(&dir, "current"))
            .unwrap()
            .unwrap();
        assert!(entry.is_link().unwrap());
        assert!(entry.sub_file_entries().unwrap().is_empty());
        let target = entry.link_target().unwrap().unwrap();
        assert!(target.ends_with("logs"));
    }
}
