//! Byte window of the parent file object.

use std::sync::Arc;

use crate::backends::require_parent;
use crate::resolver::release_quietly;
use crate::traits::ensure_layer;
use crate::types::type_indicators;
use crate::{Context, FileObject, FileObjectProvider, PathSpec, VfsError};

/// `range_size` bytes of the parent starting at `range_offset`.
///
/// Holds its parent open through the context until closed. A window
/// reaching past the end of the parent is cut short by the parent's size.
pub struct DataRangeFileObject {
    path_spec: PathSpec,
    parent: Arc<dyn FileObject>,
    offset: u64,
    size: u64,
}

impl DataRangeFileObject {
    /// Offset of the window in the parent.
    pub fn range_offset(&self) -> u64 {
        self.offset
    }
}

impl FileObject for DataRangeFileObject {
    fn path_spec(&self) -> &PathSpec {
        &self.path_spec
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, VfsError> {
        if offset >= self.size {
            return Ok(0);
        }
        let available = usize::try_from(self.size - offset).unwrap_or(usize::MAX);
        let n = buf.len().min(available);
        self.parent.read_at(self.offset + offset, &mut buf[..n])
    }

    fn size(&self) -> Result<u64, VfsError> {
        Ok(self.size)
    }

    fn close(&self, context: &Context) -> Result<(), VfsError> {
        context.close_file_object(self.parent.path_spec())
    }
}

/// Opens [`DataRangeFileObject`] for the `DATA_RANGE` type indicator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataRangeProvider;

impl FileObjectProvider for DataRangeProvider {
    fn type_indicator(&self) -> &'static str {
        type_indicators::DATA_RANGE
    }

    fn open_file_object(
        &self,
        context: &Context,
        path_spec: &PathSpec,
    ) -> Result<Arc<dyn FileObject>, VfsError> {
        ensure_layer(type_indicators::DATA_RANGE, path_spec)?;
        let missing = |name| {
            VfsError::invalid_argument(type_indicators::DATA_RANGE, format!("missing {name}"))
        };
        let offset = path_spec.get_u64("range_offset").ok_or_else(|| missing("range_offset"))?;
        let size = path_spec.get_u64("range_size").ok_or_else(|| missing("range_size"))?;
        if offset.checked_add(size).is_none() {
            return Err(VfsError::invalid_argument(
                type_indicators::DATA_RANGE,
                "range end overflows",
            ));
        }

        let parent_spec = require_parent(path_spec)?;
        let parent = context.open_file_object(parent_spec)?;
        let parent_size = match parent.size() {
            Ok(parent_size) => parent_size,
            Err(e) => {
                release_quietly(context.close_file_object(parent_spec));
                return Err(e);
            }
        };

        Ok(Arc::new(DataRangeFileObject {
            path_spec: path_spec.clone(),
            parent,
            offset,
            size: size.min(parent_size.saturating_sub(offset)),
        }))
    }
}
