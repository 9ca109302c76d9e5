//! # Path Specifications
//!
//! Immutable, chainable descriptors of how to reach a unit of data.
//!
//! ## Overview
//!
//! A [`PathSpec`] names one storage layer (its *type indicator*), the
//! attributes that layer needs (a `location`, an `inode`, a byte offset…) and
//! optionally the parent layer it is read from:
//!
//! ```text
//! TSK  location=/Windows/System32     (file system inside the image)
//!  └─ QCOW                             (disk image format)
//!      └─ OS  location=/cases/disk.qcow2
//! ```
//!
//! Parents are shared: cloning a spec or building siblings on the same parent
//! never copies the chain.
//!
//! ## Comparable Key
//!
//! [`PathSpec::comparable`] renders the chain root first, one line per layer,
//! attributes in schema order:
//!
//! ```text
//! type: OS, location: /cases/disk.qcow2
//! type: QCOW
//! type: TSK, location: /Windows/System32
//! ```
//!
//! Equality and hashing use this string only, so two independently built
//! chains describing the same data are equal and share cache entries.

mod builtin;
mod definition;
mod factory;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::VfsError;

pub use builtin::BUILTIN_DEFINITIONS;
pub use definition::{AttributeField, AttributeKind, ParentRequirement, PathSpecDefinition};
pub use factory::{PathSpecFactory, SerializedLayer};

/// Attribute set of one layer.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Builds an [`Attributes`] map from name/value pairs.
///
/// ```rust
/// use nestvfs::{attributes, AttributeValue};
///
/// let attrs = attributes([("location", "/a".into()), ("inode", 7u64.into())]);
/// assert_eq!(attrs.get("inode"), Some(&AttributeValue::Integer(7)));
/// ```
pub fn attributes<const N: usize>(pairs: [(&str, AttributeValue); N]) -> Attributes {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Value of a path specification attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttributeValue {
    /// Unsigned integer.
    Integer(u64),
    /// String.
    String(String),
}

impl AttributeValue {
    /// The string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::Integer(_) => None,
        }
    }

    /// The integer value, if this is an integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::Integer(n) => Some(*n),
            AttributeValue::String(_) => None,
        }
    }

    /// `true` for the empty string.
    pub fn is_empty(&self) -> bool {
        matches!(self, AttributeValue::String(s) if s.is_empty())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(n) => write!(f, "{n}"),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

/// Immutable descriptor of one storage layer plus its parent chain.
///
/// Cheap to clone (reference counted). Compared, hashed and used as a cache
/// key through [`comparable`](Self::comparable).
///
/// # Example
///
/// ```rust
/// use nestvfs::PathSpec;
///
/// let image = PathSpec::os("/cases/disk.raw")?;
/// let a = PathSpec::tsk(None, Some("/etc/passwd"), &PathSpec::raw(&image)?)?;
/// let b = PathSpec::tsk(None, Some("/etc/passwd"), &PathSpec::raw(&image)?)?;
///
/// assert_eq!(a, b);
/// assert_eq!(
///     a.comparable(),
///     "type: OS, location: /cases/disk.raw\ntype: RAW\ntype: TSK, location: /etc/passwd\n"
/// );
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
#[derive(Clone)]
pub struct PathSpec(Arc<Node>);

struct Node {
    definition: &'static PathSpecDefinition,
    attributes: Attributes,
    parent: Option<PathSpec>,
    comparable: String,
    file_system_key: String,
}

impl PathSpec {
    /// Constructs a path specification after validating it against its
    /// definition.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if the attributes or parent do not fit
    ///   the definition
    pub fn new(
        definition: &'static PathSpecDefinition,
        attributes: Attributes,
        parent: Option<PathSpec>,
    ) -> Result<Self, VfsError> {
        definition.validate(&attributes, parent.is_some())?;

        let parent_comparable = parent.as_ref().map_or("", |p| p.comparable());
        let comparable = format!(
            "{parent_comparable}{}",
            layer_line(definition, &attributes, false)
        );
        let file_system_key = format!(
            "{parent_comparable}{}",
            layer_line(definition, &attributes, true)
        );

        Ok(Self(Arc::new(Node {
            definition,
            attributes,
            parent,
            comparable,
            file_system_key,
        })))
    }

    /// A spec of the same layer and parent with different attributes.
    ///
    /// Backends use this to address sibling or child entries.
    pub fn with_attributes(&self, attributes: Attributes) -> Result<Self, VfsError> {
        Self::new(self.0.definition, attributes, self.0.parent.clone())
    }

    /// The storage layer's type indicator.
    #[inline]
    pub fn type_indicator(&self) -> &'static str {
        self.0.definition.type_indicator
    }

    /// The definition this spec was validated against.
    #[inline]
    pub fn definition(&self) -> &'static PathSpecDefinition {
        self.0.definition
    }

    /// The parent layer, if any.
    #[inline]
    pub fn parent(&self) -> Option<&PathSpec> {
        self.0.parent.as_ref()
    }

    /// Returns `true` if this spec is read from another layer.
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.0.parent.is_some()
    }

    /// All attributes of this layer.
    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.0.attributes
    }

    /// A single attribute.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.0.attributes.get(name)
    }

    /// A string attribute.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_str)
    }

    /// An integer attribute.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.attribute(name).and_then(AttributeValue::as_u64)
    }

    /// The `location` attribute.
    #[inline]
    pub fn location(&self) -> Option<&str> {
        self.get_str("location")
    }

    /// The `inode` attribute.
    #[inline]
    pub fn inode(&self) -> Option<u64> {
        self.get_u64("inode")
    }

    /// Canonical string of the whole chain.
    #[inline]
    pub fn comparable(&self) -> &str {
        &self.0.comparable
    }

    /// Comparable of the file system this spec lives in.
    ///
    /// Same as [`comparable`](Self::comparable) with this layer's
    /// entry-locating attributes left out, so every entry of one container
    /// maps to one key.
    #[inline]
    pub fn file_system_key(&self) -> &str {
        &self.0.file_system_key
    }

    /// Iterates from this layer to the root layer.
    pub fn ancestors(&self) -> impl Iterator<Item = &PathSpec> {
        std::iter::successors(Some(self), |spec| spec.parent())
    }

    /// Number of layers in the chain.
    pub fn depth(&self) -> usize {
        self.ancestors().count()
    }
}

fn layer_line(
    definition: &PathSpecDefinition,
    attributes: &Attributes,
    skip_locators: bool,
) -> String {
    let mut line = format!("type: {}", definition.type_indicator);
    for field in definition.fields {
        if skip_locators && field.locates_entry {
            continue;
        }
        match attributes.get(field.name) {
            Some(AttributeValue::String(value)) => {
                line.push_str(&format!(", {}: ", field.name));
                push_escaped(&mut line, value);
            }
            Some(value) => line.push_str(&format!(", {}: {value}", field.name)),
            None => {}
        }
    }
    line.push('\n');
    line
}

/// Escapes the attribute and layer delimiters of a string value.
fn push_escaped(line: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            ',' => line.push_str("\\,"),
            c => line.push(c),
        }
    }
}

impl PartialEq for PathSpec {
    fn eq(&self, other: &Self) -> bool {
        self.comparable() == other.comparable()
    }
}

impl Eq for PathSpec {}

impl Hash for PathSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.comparable().hash(state);
    }
}

impl fmt::Debug for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathSpec").field(&self.comparable()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparable_is_rooted_and_ordered() {
        let os = PathSpec::os("/tmp/image.qcow2").unwrap();
        let qcow = PathSpec::qcow(&os).unwrap();
        let tsk = PathSpec::tsk(Some(15), Some("/a/b"), &qcow).unwrap();

        assert_eq!(
            tsk.comparable(),
            "type: OS, location: /tmp/image.qcow2\n\
             type: QCOW\n\
             type: TSK, inode: 15, location: /a/b\n"
        );
    }

    #[test]
    fn separately_built_chains_are_equal() {
        let a = PathSpec::gzip(&PathSpec::os("/logs/syslog.gz").unwrap()).unwrap();
        let b = PathSpec::gzip(&PathSpec::os("/logs/syslog.gz").unwrap()).unwrap();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn file_system_key_ignores_locators() {
        let image = PathSpec::os("/img.raw").unwrap();
        let raw = PathSpec::raw(&image).unwrap();
        let a = PathSpec::tsk(None, Some("/a"), &raw).unwrap();
        let b = PathSpec::tsk(Some(42), None, &raw).unwrap();

        assert_ne!(a.comparable(), b.comparable());
        assert_eq!(a.file_system_key(), b.file_system_key());
        assert_eq!(
            a.file_system_key(),
            "type: OS, location: /img.raw\ntype: RAW\ntype: TSK\n"
        );
    }

    #[test]
    fn string_values_cannot_forge_layers() {
        let raw = PathSpec::raw(&PathSpec::os("/x").unwrap()).unwrap();
        let forged = PathSpec::os("/x\ntype: RAW").unwrap();
        assert_ne!(raw, forged);
        assert_eq!(forged.comparable(), "type: OS, location: /x\\ntype: RAW\n");

        let a = PathSpec::tar("/a, location: /b", &PathSpec::os("/t").unwrap()).unwrap();
        let b = PathSpec::tar("/a\\, location: /b", &PathSpec::os("/t").unwrap()).unwrap();
        assert_ne!(a.comparable(), b.comparable());
        assert_eq!(
            b.comparable().lines().last(),
            Some("type: TAR, location: /a\\\\\\, location: /b")
        );
    }

    #[test]
    fn file_system_key_keeps_identifying_attributes() {
        let os = PathSpec::os("/img").unwrap();
        let a = PathSpec::data_range(0, 512, &os).unwrap();
        let b = PathSpec::data_range(512, 512, &os).unwrap();
        assert_ne!(a.file_system_key(), b.file_system_key());
    }

    #[test]
    fn siblings_share_parent_instance() {
        let os = PathSpec::os("/img").unwrap();
        let a = PathSpec::raw(&os).unwrap();
        let b = PathSpec::raw(&os).unwrap();
        assert!(Arc::ptr_eq(&a.parent().unwrap().0, &b.parent().unwrap().0));
    }

    #[test]
    fn with_attributes_keeps_layer_and_parent() {
        let tar = PathSpec::tar("/a", &PathSpec::os("/x.tar").unwrap()).unwrap();
        let sibling = tar.with_attributes(attributes([("location", "/b".into())])).unwrap();
        assert_eq!(sibling.type_indicator(), "TAR");
        assert_eq!(sibling.location(), Some("/b"));
        assert_eq!(sibling.parent(), tar.parent());
    }

    #[test]
    fn ancestors_walk_to_root() {
        let os = PathSpec::os("/x").unwrap();
        let gz = PathSpec::gzip(&os).unwrap();
        let tar = PathSpec::tar("/f", &gz).unwrap();

        let kinds: Vec<_> = tar.ancestors().map(PathSpec::type_indicator).collect();
        assert_eq!(kinds, ["TAR", "GZIP", "OS"]);
        assert_eq!(tar.depth(), 3);
    }

    #[test]
    fn attribute_accessors() {
        let spec = PathSpec::tsk(Some(3), Some("/x"), &PathSpec::os("/i").unwrap()).unwrap();
        assert_eq!(spec.inode(), Some(3));
        assert_eq!(spec.location(), Some("/x"));
        assert_eq!(spec.get_u64("location"), None);
        assert_eq!(spec.get_str("missing"), None);
    }

    #[test]
    fn path_spec_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PathSpec>();
    }
}
