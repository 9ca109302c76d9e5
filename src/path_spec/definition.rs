//! Attribute schemas of path specification variants.

use crate::VfsError;

use super::{AttributeValue, Attributes};

/// Kind of value an attribute holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Unsigned integer (offsets, inode numbers, indexes).
    Integer,
    /// UTF-8 string (locations, method names).
    String,
}

/// Whether a variant needs a parent layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRequirement {
    /// The variant addresses data inside another layer.
    Required,
    /// The variant is a root layer and rejects a parent.
    Forbidden,
    /// Both forms are accepted.
    Optional,
}

/// One attribute of a variant's schema.
#[derive(Debug, Clone, Copy)]
pub struct AttributeField {
    /// Attribute name.
    pub name: &'static str,
    /// Value kind.
    pub kind: AttributeKind,
    /// Construction fails without it.
    pub required: bool,
    /// The attribute selects an entry within the layer's file system rather
    /// than the file system itself (e.g. `location`, `inode`).
    pub locates_entry: bool,
}

impl AttributeField {
    /// Optional string attribute.
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeKind::String,
            required: false,
            locates_entry: false,
        }
    }

    /// Optional integer attribute.
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeKind::Integer,
            required: false,
            locates_entry: false,
        }
    }

    /// Marks the attribute as required.
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the attribute as an entry locator.
    pub const fn locator(mut self) -> Self {
        self.locates_entry = true;
        self
    }
}

/// Schema of a path specification variant.
///
/// A definition is the fixed discriminant of a variant: it is checked once
/// when a [`PathSpec`](super::PathSpec) is constructed and carried by it
/// afterwards. Definitions are `'static` so they can be declared as
/// `static` items and registered with a
/// [`PathSpecFactory`](super::PathSpecFactory).
///
/// # Example
///
/// ```rust
/// use nestvfs::{AttributeField, ParentRequirement, PathSpecDefinition};
///
/// static APFS: PathSpecDefinition = PathSpecDefinition {
///     type_indicator: "APFS",
///     parent: ParentRequirement::Required,
///     fields: &[
///         AttributeField::integer("identifier").locator(),
///         AttributeField::string("location").locator(),
///     ],
///     one_of: &["identifier", "location"],
/// };
///
/// assert_eq!(APFS.field("location").map(|f| f.locates_entry), Some(true));
/// ```
#[derive(Debug)]
pub struct PathSpecDefinition {
    /// The variant's type indicator.
    pub type_indicator: &'static str,
    /// Parent requirement.
    pub parent: ParentRequirement,
    /// Accepted attributes, in comparable order.
    pub fields: &'static [AttributeField],
    /// At least one of these attributes must be set (empty: no constraint).
    pub one_of: &'static [&'static str],
}

impl PathSpecDefinition {
    /// Looks up a field of the schema by name.
    pub fn field(&self, name: &str) -> Option<&AttributeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Checks attributes and parent presence against the schema.
    ///
    /// Empty strings count as absent.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] for a missing or forbidden parent,
    ///   unknown or mistyped attributes, or missing required attributes
    pub fn validate(&self, attributes: &Attributes, has_parent: bool) -> Result<(), VfsError> {
        let invalid = |reason: String| VfsError::invalid_argument(self.type_indicator, reason);

        match (self.parent, has_parent) {
            (ParentRequirement::Required, false) => {
                return Err(invalid("missing parent value".into()));
            }
            (ParentRequirement::Forbidden, true) => {
                return Err(invalid("parent value not supported".into()));
            }
            _ => {}
        }

        for (name, value) in attributes {
            let field = self
                .field(name)
                .ok_or_else(|| invalid(format!("unsupported attribute: {name}")))?;
            let kind_matches = matches!(
                (field.kind, value),
                (AttributeKind::Integer, AttributeValue::Integer(_))
                    | (AttributeKind::String, AttributeValue::String(_))
            );
            if !kind_matches {
                return Err(invalid(format!("attribute {name} has the wrong kind")));
            }
        }

        let is_set = |name: &str| attributes.get(name).is_some_and(|v| !v.is_empty());

        if let Some(missing) = self.fields.iter().find(|f| f.required && !is_set(f.name)) {
            return Err(invalid(format!("missing {} value", missing.name)));
        }

        if !self.one_of.is_empty() && !self.one_of.iter().any(|name| is_set(name)) {
            return Err(invalid(format!("missing {} value", self.one_of.join(" or "))));
        }

        Ok(())
    }
}
