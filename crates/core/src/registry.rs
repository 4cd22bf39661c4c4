//! Per-run registries: loaded documents, reusable parameters and discriminators.
//!
//! Registries are created empty for a run, only ever appended to while it
//! resolves, and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::hint::SchemaKind;
use crate::pointer::{Pointer, ROOT_DOCUMENT};

/// Identity of a loaded document: `"."` for the root, otherwise a path
/// relative to the root or an absolute URI.
pub type DocumentId = String;

/// A loaded document and the kind it was first encountered as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    /// Kind hint the document was loaded under.
    pub hint: SchemaKind,
    /// The document tree, with references rewritten in place.
    pub schema: Value,
}

/// Discriminator declared by a schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    /// The property name that carries the tag value.
    pub property_name: String,
    /// Optional mapping from tag values to reference strings, in declaration order.
    pub mapping: Option<Map<String, Value>>,
}

impl Discriminator {
    /// Tag value for a member whose own location ends in `segment`.
    ///
    /// An explicit mapping entry wins when its value equals `segment`, or when
    /// its value is a pointer whose final segment equals `segment`.
    pub fn tag_for(&self, segment: &str) -> String {
        let mapped = self.mapping.as_ref().and_then(|mapping| {
            mapping.iter().find_map(|(tag, target)| {
                let target = target.as_str()?;
                let matches = if target.starts_with('#') {
                    Pointer::parse(target)
                        .ok()
                        .is_some_and(|ptr| ptr.last_segment() == Some(segment))
                } else {
                    target == segment
                };
                matches.then(|| tag.clone())
            })
        });
        mapped.unwrap_or_else(|| segment.to_string())
    }
}

/// Canonical index -> raw parameter node.
pub type ParameterRegistry = BTreeMap<String, Value>;

/// Canonical index of the declaring schema -> discriminator.
pub type DiscriminatorRegistry = BTreeMap<String, Discriminator>;

/// Canonical index -> the document and path it was flattened from.
pub type ReferenceRegistry = BTreeMap<String, Pointer>;

/// Canonical indexes of schemas composed from a discriminator base. Each of
/// them carries its own literal tag, so it always renders as an object shape.
pub type TaggedSchemas = BTreeSet<String>;

/// Every registry populated by one resolution run.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    /// Loaded documents addressed by DocumentID.
    pub documents: BTreeMap<DocumentId, SchemaDocument>,
    /// Reusable parameters.
    pub parameters: ParameterRegistry,
    /// Discriminators.
    pub discriminators: DiscriminatorRegistry,
    /// Every reference target named by a flattened reference.
    pub references: ReferenceRegistry,
    /// Schemas that inherit a discriminator tag.
    pub tagged: TaggedSchemas,
}

impl Registries {
    /// The root document, once loaded.
    pub fn root(&self) -> Option<&SchemaDocument> {
        self.documents.get(ROOT_DOCUMENT)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discriminator_deserializes_camel_case() {
        let disc: Discriminator = serde_json::from_value(json!({
            "propertyName": "petType",
            "mapping": { "dog": "#/components/schemas/Dog" }
        }))
        .unwrap();
        assert_eq!(disc.property_name, "petType");
        assert_eq!(disc.tag_for("Dog"), "dog");
        assert_eq!(disc.tag_for("Cat"), "Cat");
    }

    #[test]
    fn test_tag_for_plain_mapping_value() {
        let disc: Discriminator = serde_json::from_value(json!({
            "propertyName": "kind",
            "mapping": { "big-cat": "Lion" }
        }))
        .unwrap();
        assert_eq!(disc.tag_for("Lion"), "big-cat");
    }
}
