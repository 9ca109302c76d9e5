//! # Compression
//!
//! Registry of decompressors keyed by compression method.
//!
//! The [`CompressionManager`] holds no state besides its registry; every call
//! to [`decompressor`](CompressionManager::decompressor) builds a new
//! instance, because a decompressor carries the state of one stream.
//!
//! | Method | Decompressor |
//! |--------|--------------|
//! | `zlib` | [`ZlibDecompressor::zlib`] |
//! | `deflate` | [`ZlibDecompressor::raw_deflate`] |

mod zlib;

use std::collections::HashMap;

use crate::{Decompressor, DecompressorConstructor, DecompressorRegistration, VfsError};

pub use zlib::{DEFLATE, ZLIB, ZlibDecompressor};

/// Maps compression methods to decompressor constructors.
///
/// # Example
///
/// ```rust
/// use nestvfs::CompressionManager;
///
/// let manager = CompressionManager::with_builtin();
/// let mut decompressor = manager.decompressor("zlib")?;
///
/// // zlib stream of "abc"
/// let compressed = [0x78, 0x9c, 0x4b, 0x4c, 0x4a, 0x06, 0x00, 0x02, 0x4d, 0x01, 0x27];
/// let (data, leftover) = decompressor.decompress(&compressed)?;
/// assert_eq!(data, b"abc");
/// assert!(leftover.is_empty());
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
#[derive(Debug, Default)]
pub struct CompressionManager {
    constructors: HashMap<&'static str, DecompressorConstructor>,
}

impl CompressionManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with the zlib and raw DEFLATE decompressors registered.
    pub fn with_builtin() -> Self {
        let constructors = [ZLIB, DEFLATE]
            .into_iter()
            .map(|r| (r.method, r.constructor))
            .collect();
        Self { constructors }
    }

    /// Registers decompressors.
    ///
    /// Nothing is registered if any entry fails.
    ///
    /// # Errors
    ///
    /// - [`VfsError::AlreadyRegistered`] if a method is already registered or
    ///   listed twice
    /// - [`VfsError::InvalidArgument`] if a constructor builds a decompressor
    ///   declaring another method
    pub fn register_decompressors(
        &mut self,
        registrations: &[DecompressorRegistration],
    ) -> Result<(), VfsError> {
        for (index, registration) in registrations.iter().enumerate() {
            let listed_before = registrations[..index]
                .iter()
                .any(|r| r.method == registration.method);
            if listed_before || self.constructors.contains_key(registration.method) {
                return Err(VfsError::AlreadyRegistered {
                    registry: "compression",
                    key: registration.method.to_string(),
                });
            }
            let declared = (registration.constructor)().compression_method();
            if declared != registration.method {
                return Err(VfsError::invalid_argument(
                    "compression",
                    format!("{} constructor builds a {declared} decompressor", registration.method),
                ));
            }
        }

        for registration in registrations {
            self.constructors
                .insert(registration.method, registration.constructor);
        }
        Ok(())
    }

    /// Removes a method, returning `true` if it was registered.
    pub fn deregister(&mut self, method: &str) -> bool {
        self.constructors.remove(method).is_some()
    }

    /// Returns `true` if a decompressor is registered for `method`.
    pub fn is_supported(&self, method: &str) -> bool {
        self.constructors.contains_key(method)
    }

    /// Builds a fresh decompressor for `method`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::UnsupportedCompression`] if nothing is registered for it
    pub fn decompressor(&self, method: &str) -> Result<Box<dyn Decompressor>, VfsError> {
        let constructor =
            self.constructors
                .get(method)
                .ok_or_else(|| VfsError::UnsupportedCompression {
                    method: method.to_string(),
                })?;
        Ok(constructor())
    }
}
