//! zlib and raw DEFLATE decompressors backed by `flate2`.

use flate2::{Decompress, FlushDecompress, Status};

use crate::types::compression_methods;
use crate::{Decompressor, DecompressorRegistration, VfsError};

const CHUNK_SIZE: usize = 16 * 1024;

/// Registration of the zlib decompressor.
pub const ZLIB: DecompressorRegistration = DecompressorRegistration {
    method: compression_methods::ZLIB,
    constructor: new_zlib,
};

/// Registration of the raw DEFLATE decompressor.
pub const DEFLATE: DecompressorRegistration = DecompressorRegistration {
    method: compression_methods::DEFLATE,
    constructor: new_raw_deflate,
};

fn new_zlib() -> Box<dyn Decompressor> {
    Box::new(ZlibDecompressor::zlib())
}

fn new_raw_deflate() -> Box<dyn Decompressor> {
    Box::new(ZlibDecompressor::raw_deflate())
}

/// DEFLATE decompressor, with or without the zlib header.
pub struct ZlibDecompressor {
    inner: Decompress,
    method: &'static str,
    finished: bool,
}

impl ZlibDecompressor {
    /// Decompressor for zlib wrapped streams.
    pub fn zlib() -> Self {
        Self {
            inner: Decompress::new(true),
            method: compression_methods::ZLIB,
            finished: false,
        }
    }

    /// Decompressor for headerless DEFLATE streams.
    pub fn raw_deflate() -> Self {
        Self {
            inner: Decompress::new(false),
            method: compression_methods::DEFLATE,
            finished: false,
        }
    }
}

impl Decompressor for ZlibDecompressor {
    fn compression_method(&self) -> &'static str {
        self.method
    }

    fn decompress(&mut self, compressed: &[u8]) -> Result<(Vec<u8>, Vec<u8>), VfsError> {
        let method = self.method;
        let mut output = Vec::with_capacity(compressed.len().saturating_mul(2).max(CHUNK_SIZE));
        let mut input = compressed;

        while !self.finished {
            if output.len() == output.capacity() {
                output.reserve(output.len().max(CHUNK_SIZE));
            }
            let total_in = self.inner.total_in();
            let total_out = self.inner.total_out();

            let status = self
                .inner
                .decompress_vec(input, &mut output, FlushDecompress::None)
                .map_err(|e| VfsError::Codec {
                    method: method.to_string(),
                    source: Box::new(e),
                })?;

            let consumed = (self.inner.total_in() - total_in) as usize;
            let produced = self.inner.total_out() - total_out;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => self.finished = true,
                Status::Ok | Status::BufError => {
                    let has_space = output.len() < output.capacity();
                    let stalled = consumed == 0 && produced == 0;
                    if has_space && (input.is_empty() || stalled) {
                        break;
                    }
                }
            }
        }

        let leftover = if self.finished {
            input.to_vec()
        } else {
            Vec::new()
        };
        Ok((output, leftover))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use std::io::Write;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn sample() -> Vec<u8> {
        (0..50_000u32).flat_map(|i| (i % 251).to_le_bytes()).collect()
    }

    #[test]
    fn zlib_round_trip_has_empty_leftover() {
        let data = sample();
        let mut decompressor = ZlibDecompressor::zlib();

        let (output, leftover) = decompressor.decompress(&zlib_compress(&data)).unwrap();
        assert_eq!(output, data);
        assert!(leftover.is_empty());
        assert!(decompressor.is_finished());
    }

    #[test]
    fn trailing_bytes_are_leftover() {
        let mut input = zlib_compress(b"syslog line\n");
        input.extend_from_slice(b"TRAILER");

        let mut decompressor = ZlibDecompressor::zlib();
        let (output, leftover) = decompressor.decompress(&input).unwrap();
        assert_eq!(output, b"syslog line\n");
        assert_eq!(leftover, b"TRAILER");
    }

    #[test]
    fn input_after_end_is_leftover() {
        let mut decompressor = ZlibDecompressor::zlib();
        decompressor.decompress(&zlib_compress(b"x")).unwrap();

        let (output, leftover) = decompressor.decompress(b"more").unwrap();
        assert!(output.is_empty());
        assert_eq!(leftover, b"more");
    }

    #[test]
    fn chunked_input_reassembles() {
        let data = sample();
        let compressed = zlib_compress(&data);
        let mut decompressor = ZlibDecompressor::zlib();

        let mut output = Vec::new();
        for chunk in compressed.chunks(7) {
            let (part, leftover) = decompressor.decompress(chunk).unwrap();
            assert!(leftover.is_empty());
            output.extend_from_slice(&part);
        }
        assert_eq!(output, data);
        assert!(decompressor.is_finished());
    }

    #[test]
    fn truncated_stream_is_not_finished() {
        let compressed = zlib_compress(&sample());
        let mut decompressor = ZlibDecompressor::zlib();

        let (_, leftover) = decompressor.decompress(&compressed[..compressed.len() / 2]).unwrap();
        assert!(leftover.is_empty());
        assert!(!decompressor.is_finished());
    }

    #[test]
    fn raw_deflate_round_trip() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(b"raw deflate payload").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decompressor = ZlibDecompressor::raw_deflate();
        let (output, leftover) = decompressor.decompress(&compressed).unwrap();
        assert_eq!(output, b"raw deflate payload");
        assert!(leftover.is_empty());
        assert_eq!(decompressor.compression_method(), "deflate");
    }

    #[test]
    fn corrupt_stream_is_codec_error() {
        let mut decompressor = ZlibDecompressor::zlib();
        let err = decompressor.decompress(b"not a zlib stream").unwrap_err();
        assert!(matches!(err, VfsError::Codec { ref method, .. } if method == "zlib"));
    }

    #[test]
    fn registrations_build_matching_decompressors() {
        assert_eq!((ZLIB.constructor)().compression_method(), ZLIB.method);
        assert_eq!((DEFLATE.constructor)().compression_method(), DEFLATE.method);
    }
}
