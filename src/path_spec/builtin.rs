//! Definitions of the path specification variants shipped with the crate.

use super::{
    AttributeField, AttributeValue, Attributes, ParentRequirement, PathSpec, PathSpecDefinition,
    attributes,
};
use crate::VfsError;
use crate::types::type_indicators;

pub(crate) static OS: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::OS,
    parent: ParentRequirement::Forbidden,
    fields: &[AttributeField::string("location").required().locator()],
    one_of: &[],
};

pub(crate) static FAKE: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::FAKE,
    parent: ParentRequirement::Forbidden,
    fields: &[
        AttributeField::integer("inode").locator(),
        AttributeField::string("location").locator(),
    ],
    one_of: &["inode", "location"],
};

pub(crate) static DATA_RANGE: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::DATA_RANGE,
    parent: ParentRequirement::Required,
    fields: &[
        AttributeField::integer("range_offset").required(),
        AttributeField::integer("range_size").required(),
    ],
    one_of: &[],
};

pub(crate) static COMPRESSED_STREAM: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::COMPRESSED_STREAM,
    parent: ParentRequirement::Required,
    fields: &[AttributeField::string("compression_method").required()],
    one_of: &[],
};

pub(crate) static GZIP: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::GZIP,
    parent: ParentRequirement::Required,
    fields: &[],
    one_of: &[],
};

pub(crate) static QCOW: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::QCOW,
    parent: ParentRequirement::Required,
    fields: &[],
    one_of: &[],
};

pub(crate) static EWF: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::EWF,
    parent: ParentRequirement::Required,
    fields: &[],
    one_of: &[],
};

pub(crate) static RAW: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::RAW,
    parent: ParentRequirement::Required,
    fields: &[],
    one_of: &[],
};

// inode lookups are cheaper than location walks in SleuthKit, so inode sorts
// first in the comparable as well.
pub(crate) static TSK: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::TSK,
    parent: ParentRequirement::Required,
    fields: &[
        AttributeField::integer("inode").locator(),
        AttributeField::string("location").locator(),
    ],
    one_of: &["inode", "location"],
};

pub(crate) static TSK_PARTITION: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::TSK_PARTITION,
    parent: ParentRequirement::Required,
    fields: &[
        AttributeField::integer("part_index").locator(),
        AttributeField::integer("start_offset").locator(),
        AttributeField::string("location").locator(),
    ],
    one_of: &[],
};

pub(crate) static VSHADOW: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::VSHADOW,
    parent: ParentRequirement::Required,
    fields: &[
        AttributeField::integer("store_index").locator(),
        AttributeField::string("location").locator(),
    ],
    one_of: &[],
};

pub(crate) static TAR: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::TAR,
    parent: ParentRequirement::Required,
    fields: &[AttributeField::string("location").required().locator()],
    one_of: &[],
};

pub(crate) static ZIP: PathSpecDefinition = PathSpecDefinition {
    type_indicator: type_indicators::ZIP,
    parent: ParentRequirement::Required,
    fields: &[AttributeField::string("location").required().locator()],
    one_of: &[],
};

/// Every definition registered by
/// [`PathSpecFactory::with_builtin`](super::PathSpecFactory::with_builtin).
pub static BUILTIN_DEFINITIONS: &[&PathSpecDefinition] = &[
    &OS,
    &FAKE,
    &DATA_RANGE,
    &COMPRESSED_STREAM,
    &GZIP,
    &QCOW,
    &EWF,
    &RAW,
    &TSK,
    &TSK_PARTITION,
    &VSHADOW,
    &TAR,
    &ZIP,
];

/// Typed constructors for the built-in variants.
impl PathSpec {
    /// Operating system location (root layer).
    pub fn os(location: impl Into<String>) -> Result<Self, VfsError> {
        Self::new(&OS, attributes([("location", AttributeValue::String(location.into()))]), None)
    }

    /// Location inside the in-memory fake file system.
    pub fn fake(location: impl Into<String>) -> Result<Self, VfsError> {
        Self::new(&FAKE, attributes([("location", AttributeValue::String(location.into()))]), None)
    }

    /// Entry number inside the in-memory fake file system.
    pub fn fake_inode(inode: u64) -> Result<Self, VfsError> {
        Self::new(&FAKE, attributes([("inode", inode.into())]), None)
    }

    /// Byte window of the parent.
    pub fn data_range(offset: u64, size: u64, parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(
            &DATA_RANGE,
            attributes([("range_offset", offset.into()), ("range_size", size.into())]),
            Some(parent.clone()),
        )
    }

    /// Parent bytes decompressed with `method`.
    pub fn compressed_stream(method: &str, parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(
            &COMPRESSED_STREAM,
            attributes([("compression_method", method.into())]),
            Some(parent.clone()),
        )
    }

    /// gzip layer.
    pub fn gzip(parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(&GZIP, Attributes::new(), Some(parent.clone()))
    }

    /// QCOW image layer.
    pub fn qcow(parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(&QCOW, Attributes::new(), Some(parent.clone()))
    }

    /// EWF image layer.
    pub fn ewf(parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(&EWF, Attributes::new(), Some(parent.clone()))
    }

    /// RAW image layer.
    pub fn raw(parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(&RAW, Attributes::new(), Some(parent.clone()))
    }

    /// SleuthKit entry, by inode, location or both.
    pub fn tsk(
        inode: Option<u64>,
        location: Option<&str>,
        parent: &PathSpec,
    ) -> Result<Self, VfsError> {
        let mut attrs = Attributes::new();
        if let Some(inode) = inode {
            attrs.insert("inode".into(), inode.into());
        }
        if let Some(location) = location {
            attrs.insert("location".into(), location.into());
        }
        Self::new(&TSK, attrs, Some(parent.clone()))
    }

    /// Entry inside a tar archive.
    pub fn tar(location: &str, parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(&TAR, attributes([("location", location.into())]), Some(parent.clone()))
    }

    /// Entry inside a ZIP archive.
    pub fn zip(location: &str, parent: &PathSpec) -> Result<Self, VfsError> {
        Self::new(&ZIP, attributes([("location", location.into())]), Some(parent.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_rejects_parent_and_empty_location() {
        let os = PathSpec::os("/a").unwrap();
        assert!(PathSpec::new(&OS, attributes([("location", "/b".into())]), Some(os)).is_err());
        assert!(PathSpec::os("").is_err());
    }

    #[test]
    fn nested_layers_require_parent() {
        for definition in [&GZIP, &QCOW, &EWF, &RAW, &TSK_PARTITION, &VSHADOW] {
            let err = PathSpec::new(definition, Attributes::new(), None).unwrap_err();
            assert!(matches!(err, VfsError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn tsk_requires_inode_or_location() {
        let parent = PathSpec::os("/image.raw").unwrap();
        let err = PathSpec::tsk(None, None, &parent).unwrap_err();
        assert!(matches!(err, VfsError::InvalidArgument { .. }));

        assert!(PathSpec::tsk(Some(5), None, &parent).is_ok());
        assert!(PathSpec::tsk(None, Some("/"), &parent).is_ok());
    }

    #[test]
    fn tsk_without_parent_fails_even_with_location() {
        let err = PathSpec::new(&TSK, attributes([("location", "/".into())]), None).unwrap_err();
        assert!(err.to_string().contains("missing parent"));
    }

    #[test]
    fn archives_require_location() {
        let parent = PathSpec::os("/x.zip").unwrap();
        assert!(PathSpec::new(&ZIP, Attributes::new(), Some(parent.clone())).is_err());
        assert!(PathSpec::zip("/doc.txt", &parent).is_ok());
    }

    #[test]
    fn data_range_attributes() {
        let spec = PathSpec::data_range(512, 1024, &PathSpec::os("/img").unwrap()).unwrap();
        assert_eq!(spec.get_u64("range_offset"), Some(512));
        assert_eq!(spec.get_u64("range_size"), Some(1024));
    }

    #[test]
    fn builtin_indicators_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for definition in BUILTIN_DEFINITIONS {
            assert!(seen.insert(definition.type_indicator));
        }
    }
}
