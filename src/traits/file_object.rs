//! Raw data objects: the byte sources every other layer builds on.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::{Context, PathSpec, VfsError};

/// A read-only byte source addressed by a path specification.
///
/// Reads are positional so one cached instance can serve many readers; wrap
/// it in a [`FileObjectReader`] for a cursor with `Read + Seek`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Methods take `&self`; backends that
/// need a cursor on an underlying handle serialize access internally.
///
/// # Object Safety
///
/// This trait is object-safe and is used as `dyn FileObject`.
pub trait FileObject: Send + Sync {
    /// The path specification this object was opened from.
    fn path_spec(&self) -> &PathSpec;

    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; `0` at or beyond the end of data.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Io`] or [`VfsError::Codec`] if the backend fails
    /// - [`VfsError::Closed`] if the object was closed
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError>;

    /// Size of the data in bytes.
    fn size(&self) -> Result<u64, VfsError>;

    /// Releases the object's resources.
    ///
    /// Called by the [`Context`] when the last reference is closed; objects
    /// opened through the context release their own parents here.
    fn close(&self, context: &Context) -> Result<(), VfsError> {
        let _ = context;
        Ok(())
    }
}

/// Cursor over a shared [`FileObject`] implementing `Read + Seek`.
///
/// # Example
///
/// ```rust
/// use nestvfs::{Context, FileObjectReader, PathSpec, Resolver};
/// use std::io::{Read, Seek, SeekFrom};
/// use std::sync::Arc;
///
/// # fn demo(path: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let context = Context::new(Arc::new(Resolver::with_builtin()));
/// let spec = PathSpec::os(path)?;
///
/// let mut reader = FileObjectReader::new(context.open_file_object(&spec)?);
/// reader.seek(SeekFrom::Start(16))?;
/// let mut header = [0u8; 4];
/// reader.read_exact(&mut header)?;
///
/// context.close_file_object(&spec)?;
/// # Ok(())
/// # }
/// ```
pub struct FileObjectReader {
    object: Arc<dyn FileObject>,
    position: u64,
}

impl FileObjectReader {
    /// Reader positioned at offset 0.
    pub fn new(object: Arc<dyn FileObject>) -> Self {
        Self {
            object,
            position: 0,
        }
    }

    /// Current offset.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The wrapped object.
    pub fn get_ref(&self) -> &Arc<dyn FileObject> {
        &self.object
    }
}

impl Read for FileObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .object
            .read_at(self.position, buf)
            .map_err(io::Error::other)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for FileObjectReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let size = self.object.size().map_err(io::Error::other)?;
                size.checked_add_signed(delta)
            }
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of data")
        })?;
        self.position = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BytesObject {
        spec: PathSpec,
        data: Vec<u8>,
    }

    impl FileObject for BytesObject {
        fn path_spec(&self) -> &PathSpec {
            &self.spec
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
            let start = (offset as usize).min(self.data.len());
            let n = buf.len().min(self.data.len() - start);
            buf[..n].copy_from_slice(&self.data[start..start + n]);
            Ok(n)
        }

        fn size(&self) -> Result<u64, VfsError> {
            Ok(self.data.len() as u64)
        }
    }

    fn reader(data: &[u8]) -> FileObjectReader {
        FileObjectReader::new(Arc::new(BytesObject {
            spec: PathSpec::os("/bytes").unwrap(),
            data: data.to_vec(),
        }))
    }

    #[test]
    fn file_object_is_object_safe() {
        fn _check(_: &dyn FileObject) {}
    }

    #[test]
    fn reader_reads_sequentially() {
        let mut r = reader(b"hello world");
        let mut buf = [0u8; 5];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(r.position(), 5);

        let mut rest = String::new();
        r.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, " world");
    }

    #[test]
    fn reader_seeks_from_all_origins() {
        let mut r = reader(b"0123456789");
        assert_eq!(r.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(r.seek(SeekFrom::Current(-2)).unwrap(), 5);
        assert_eq!(r.seek(SeekFrom::Start(1)).unwrap(), 1);

        let mut buf = [0u8; 2];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"12");
    }

    #[test]
    fn reader_rejects_negative_positions() {
        let mut r = reader(b"abc");
        assert!(r.seek(SeekFrom::Current(-1)).is_err());
        assert!(r.seek(SeekFrom::End(-4)).is_err());
    }

    #[test]
    fn reading_past_end_returns_zero() {
        let mut r = reader(b"abc");
        r.seek(SeekFrom::Start(10)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }
}
