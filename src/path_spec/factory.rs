//! Registry of path specification definitions and the serialized chain form.

use std::collections::HashMap;

use super::builtin::BUILTIN_DEFINITIONS;
use super::{Attributes, PathSpec, PathSpecDefinition};
use crate::VfsError;

/// One layer of a serialized path specification chain.
///
/// A chain serializes to a list of layers ordered outermost first: the root
/// layer (e.g. `OS`) comes first and the innermost addressed layer last.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerializedLayer {
    /// The layer's type indicator.
    pub type_indicator: String,
    /// The layer's attributes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: Attributes,
}

/// Maps type indicators to their definitions.
///
/// Used to construct path specifications whose variant is only known at
/// runtime, most importantly when a chain is read back from a saved session.
///
/// # Example
///
/// ```rust
/// use nestvfs::{PathSpec, PathSpecFactory};
///
/// let factory = PathSpecFactory::with_builtin();
/// let spec = PathSpec::tar("/etc/hosts", &PathSpec::os("/backup.tar")?)?;
///
/// let layers = factory.serialize(&spec);
/// assert_eq!(layers[0].type_indicator, "OS");
/// assert_eq!(factory.deserialize(&layers)?, spec);
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
#[derive(Debug, Default)]
pub struct PathSpecFactory {
    definitions: HashMap<&'static str, &'static PathSpecDefinition>,
}

impl PathSpecFactory {
    /// Empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with every built-in definition registered.
    pub fn with_builtin() -> Self {
        let definitions = BUILTIN_DEFINITIONS
            .iter()
            .map(|d| (d.type_indicator, *d))
            .collect();
        Self { definitions }
    }

    /// Registers a definition.
    ///
    /// # Errors
    ///
    /// - [`VfsError::AlreadyRegistered`] if the type indicator is taken
    pub fn register(&mut self, definition: &'static PathSpecDefinition) -> Result<(), VfsError> {
        if self.definitions.contains_key(definition.type_indicator) {
            return Err(VfsError::AlreadyRegistered {
                registry: "path specification",
                key: definition.type_indicator.to_string(),
            });
        }
        self.definitions.insert(definition.type_indicator, definition);
        Ok(())
    }

    /// Removes a definition, returning it if it was registered.
    pub fn deregister(&mut self, type_indicator: &str) -> Option<&'static PathSpecDefinition> {
        self.definitions.remove(type_indicator)
    }

    /// The definition registered for a type indicator.
    pub fn definition(&self, type_indicator: &str) -> Option<&'static PathSpecDefinition> {
        self.definitions.get(type_indicator).copied()
    }

    /// Returns `true` if the type indicator is registered.
    pub fn is_registered(&self, type_indicator: &str) -> bool {
        self.definitions.contains_key(type_indicator)
    }

    /// Constructs a path specification by type indicator.
    ///
    /// # Errors
    ///
    /// - [`VfsError::UnknownTypeIndicator`] if the indicator is not registered
    /// - [`VfsError::InvalidArgument`] if the attributes or parent do not fit
    pub fn new_path_spec(
        &self,
        type_indicator: &str,
        attributes: Attributes,
        parent: Option<PathSpec>,
    ) -> Result<PathSpec, VfsError> {
        let definition =
            self.definition(type_indicator)
                .ok_or_else(|| VfsError::UnknownTypeIndicator {
                    type_indicator: type_indicator.to_string(),
                })?;
        PathSpec::new(definition, attributes, parent)
    }

    /// Rebuilds a chain from its serialized layers, outermost first.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if `layers` is empty or a layer is invalid
    /// - [`VfsError::UnknownTypeIndicator`] if a layer's indicator is unregistered
    pub fn deserialize(&self, layers: &[SerializedLayer]) -> Result<PathSpec, VfsError> {
        let mut current: Option<PathSpec> = None;
        for layer in layers {
            let spec = self.new_path_spec(
                &layer.type_indicator,
                layer.attributes.clone(),
                current.take(),
            )?;
            current = Some(spec);
        }
        current.ok_or_else(|| VfsError::invalid_argument("chain", "no layers to deserialize"))
    }

    /// Serializes a chain to its layers, outermost first.
    pub fn serialize(&self, path_spec: &PathSpec) -> Vec<SerializedLayer> {
        let mut layers: Vec<SerializedLayer> = path_spec
            .ancestors()
            .map(|spec| SerializedLayer {
                type_indicator: spec.type_indicator().to_string(),
                attributes: spec.attributes().clone(),
            })
            .collect();
        layers.reverse();
        layers
    }

    /// Serializes a chain to JSON.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if encoding fails
    #[cfg(feature = "serde")]
    pub fn to_json(&self, path_spec: &PathSpec) -> Result<String, VfsError> {
        serde_json::to_string(&self.serialize(path_spec))
            .map_err(|e| VfsError::invalid_argument("chain", e.to_string()))
    }

    /// Rebuilds a chain from JSON produced by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if the JSON is malformed
    /// - any error of [`deserialize`](Self::deserialize)
    #[cfg(feature = "serde")]
    pub fn from_json(&self, json: &str) -> Result<PathSpec, VfsError> {
        let layers: Vec<SerializedLayer> = serde_json::from_str(json)
            .map_err(|e| VfsError::invalid_argument("chain", e.to_string()))?;
        self.deserialize(&layers)
    }
}
