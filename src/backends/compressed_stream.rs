//! Parent bytes passed through a decompressor.

use std::sync::Arc;

use crate::backends::require_parent;
use crate::traits::ensure_layer;
use crate::types::type_indicators;
use crate::{Context, Decompressor, FileObject, FileObjectProvider, PathSpec, VfsError};

const READ_SIZE: usize = 64 * 1024;

/// The decompressed contents of the parent.
///
/// The whole stream is decompressed when opened and the parent is released
/// again right away. Bytes following the end of the compressed stream are
/// ignored.
///
/// # Memory
///
/// The object holds the entire decompressed output, so an open costs
/// memory equal to [`size`](FileObject::size). Streams that decompress to
/// more than the host can hold (multi-gigabyte images) need a seekable codec
/// layer instead.
pub struct CompressedStreamFileObject {
    path_spec: PathSpec,
    data: Vec<u8>,
}

impl FileObject for CompressedStreamFileObject {
    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        let len = self.data.len();
        let start = usize::try_from(offset).map_or(len, |o| o.min(len));
        let n = buf.len().min(len - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> Result<u64, VfsError> {
        Ok(self.data.len() as u64)
    }
}

/// Opens [`CompressedStreamFileObject`] for the `COMPRESSED_STREAM` type
/// indicator, with the codecs of the context's resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompressedStreamProvider;

impl FileObjectProvider for CompressedStreamProvider {
    fn type_indicator(&self) -> &'static str {
        type_indicators::COMPRESSED_STREAM
    }

    fn open_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileObject>, VfsError> {
        ensure_layer(type_indicators::COMPRESSED_STREAM, path_spec)?;
        let method = path_spec.get_str("compression_method").ok_or_else(|| {
            VfsError::invalid_argument(
                type_indicators::COMPRESSED_STREAM,
                "missing compression_method",
            )
        })?;
        let mut decompressor = context.resolver().compression().decompressor(method)?;

        let parent_spec = require_parent(path_spec)?;
        let parent = context.open_file_object(parent_spec)?;
        let decompressed = decompress_all(parent.as_ref(), decompressor.as_mut(), method);
        drop(parent);
        let closed = context.close_file_object(parent_spec);

        let data = decompressed?;
        closed?;
        tracing::debug!(method, size = data.len(), "decompressed stream");
        Ok(Arc::new(CompressedStreamFileObject {
            path_spec: path_spec.clone(),
            data,
        }))
    }
}

fn decompress_all(
    parent: &dyn FileObject,
    decompressor: &mut dyn Decompressor,
    method: &str,
) -> Result<Vec<u8>, VfsError> {
    let mut data = Vec::new();
    let mut chunk = vec![0u8; READ_SIZE];
    let mut offset = 0u64;
    while !decompressor.is_finished() {
        let n = parent.read_at(offset, &mut chunk)?;
        if n == 0 {
            return Err(VfsError::format(
                type_indicators::COMPRESSED_STREAM,
                format!("{method} stream truncated after {offset} bytes"),
            ));
        }
        offset += n as u64;
        let (output, _leftover) = decompressor.decompress(&chunk[..n])?;
        data.extend_from_slice(&output);
    }
    Ok(data)
}
