//! Stateful per-stream decompressors.

use crate::VfsError;

/// Converts a compressed stream to uncompressed bytes incrementally.
///
/// A decompressor holds the state of exactly one stream; the
/// [`CompressionManager`](crate::CompressionManager) hands out a fresh
/// instance per request.
///
/// # Object Safety
///
/// This trait is object-safe and is used as `Box<dyn Decompressor>`.
pub trait Decompressor: Send {
    /// The compression method this decompressor implements.
    fn compression_method(&self) -> &'static str;

    /// Feeds the next chunk of compressed data.
    ///
    /// Returns the bytes uncompressed so far from this chunk and the leftover:
    /// input following the logical end of the compressed stream, which is
    /// non-empty when the stream is embedded in larger data. Once the end is
    /// reached every further input is returned as leftover.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Codec`] if the data is not a valid stream
    fn decompress(&mut self, compressed: &[u8]) -> Result<(Vec<u8>, Vec<u8>), VfsError>;

    /// Returns `true` once the end of the compressed stream was seen.
    fn is_finished(&self) -> bool;
}

/// Constructor for a decompressor.
pub type DecompressorConstructor = fn() -> Box<dyn Decompressor>;

/// Pairs a compression method with its constructor.
#[derive(Debug, Clone, Copy)]
pub struct DecompressorRegistration {
    /// The method tag the constructor's decompressors declare.
    pub method: &'static str,
    /// Builds a fresh decompressor.
    pub constructor: DecompressorConstructor,
}
