//! # Extension Traits
//!
//! Convenience reads on top of [`FileObject::read_at`].
//!
//! ## Overview
//!
//! [`FileObjectExt`] is implemented for every file object, sized or not, so
//! `Arc<dyn FileObject>` and `Box<dyn FileObject>` get it for free.
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`read_exact_at`](FileObjectExt::read_exact_at) | Fill a buffer or fail |
//! | [`read_range`](FileObjectExt::read_range) | Read up to `len` bytes into a new vector |
//! | [`read_to_end`](FileObjectExt::read_to_end) | Read all data |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature, `FileObjectExtJson::read_json` deserializes the
//! whole data as JSON.

use crate::{FileObject, VfsError};

const READ_CHUNK: usize = 64 * 1024;

/// Extension methods for any file object.
///
/// # Example
///
/// ```rust
/// use nestvfs::{Context, FakeFileSystemBuilder, FileObjectExt, PathSpec, Resolver};
/// use std::sync::Arc;
///
/// let mut resolver = Resolver::with_builtin();
/// resolver.register_file_system(
///     FakeFileSystemBuilder::new().add_file("/mbr.bin", vec![0u8; 512]).build(),
/// )?;
/// let context = Context::new(Arc::new(resolver));
///
/// let spec = PathSpec::fake("/mbr.bin")?;
/// let object = context.open_file_object(&spec)?;
/// let mut signature = [0u8; 2];
/// object.read_exact_at(510, &mut signature)?;
/// assert_eq!(object.read_to_end()?.len(), 512);
/// context.close_file_object(&spec)?;
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
pub trait FileObjectExt: FileObject {
    /// Fills `buf` with the bytes at `offset`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Format`] if the data ends before `buf` is full
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), VfsError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(VfsError::format(
                    self.path_spec().type_indicator(),
                    format!(
                        "short read: {} of {} bytes at offset {offset}",
                        filled,
                        buf.len()
                    ),
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Reads up to `len` bytes at `offset`; shorter at the end of data.
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, VfsError> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Reads everything from offset 0.
    fn read_to_end(&self) -> Result<Vec<u8>, VfsError> {
        let size = self.size()?;
        let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = self.read_at(data.len() as u64, &mut chunk)?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }
}

// Blanket implementation - any FileObject gets FileObjectExt for free
impl<T: FileObject + ?Sized> FileObjectExt for T {}

#[cfg(feature = "serde")]
mod json {
    use super::FileObjectExt;
    use crate::{FileObject, VfsError};
    use serde::de::DeserializeOwned;

    /// JSON reads for file objects (requires `serde` feature).
    pub trait FileObjectExtJson: FileObject {
        /// Reads the whole data and deserializes it as JSON.
        ///
        /// # Errors
        ///
        /// - [`VfsError::Format`] if the data is not valid JSON for `T`
        fn read_json<T: DeserializeOwned>(&self) -> Result<T, VfsError> {
            let data = self.read_to_end()?;
            serde_json::from_slice(&data)
                .map_err(|e| VfsError::format(self.path_spec().type_indicator(), e.to_string()))
        }
    }

    // Blanket implementation
    impl<B: FileObject + ?Sized> FileObjectExtJson for B {}
}

#[cfg(feature = "serde")]
pub use json::FileObjectExtJson;
