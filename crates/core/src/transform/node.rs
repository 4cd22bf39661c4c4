//! Closed view over a schema node, decided once before transformation.

use serde_json::{Map, Value};

use super::ts::truthy;

/// Shape of a schema node.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode<'a> {
    /// Anything that is not an object or array; passed through as text.
    Scalar(&'a Value),
    /// A literal tuple.
    Tuple(&'a [Value]),
    /// A flattened reference.
    Reference(&'a str),
    /// A schema object.
    Schema(SchemaObject<'a>),
}

impl<'a> SchemaNode<'a> {
    /// Classify `value`.
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => Self::Tuple(items),
            Value::Object(fields) => match fields.get("$ref") {
                Some(Value::String(reference)) => Self::Reference(reference),
                _ => Self::Schema(SchemaObject { fields }),
            },
            scalar => Self::Scalar(scalar),
        }
    }
}

/// The three boolean composition keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionKind {
    /// Exactly one member.
    OneOf,
    /// Every member.
    AllOf,
    /// At least one member.
    AnyOf,
}

impl CompositionKind {
    /// Discriminator lookup order.
    pub const ALL: [Self; 3] = [Self::OneOf, Self::AllOf, Self::AnyOf];

    /// The keyword.
    pub const fn key(self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
        }
    }
}

/// Typed accessors over a schema object's fields.
#[derive(Debug, Clone, Copy)]
pub struct SchemaObject<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> SchemaObject<'a> {
    /// Raw fields.
    pub fn fields(&self) -> &'a Map<String, Value> {
        self.fields
    }

    /// Raw field.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key)
    }

    /// Whether `key` is declared at all.
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }

    /// `nullable: true`
    pub fn nullable(&self) -> bool {
        self.flag("nullable")
    }

    /// `readOnly: true`
    pub fn read_only(&self) -> bool {
        self.flag("readOnly")
    }

    /// Declared `type`, as a single name.
    pub fn type_name(&self) -> Option<&'a str> {
        self.get("type").and_then(Value::as_str)
    }

    /// Declared `type`, when it is a list of names.
    pub fn type_list(&self) -> Option<&'a [Value]> {
        self.get("type").and_then(Value::as_array).map(Vec::as_slice)
    }

    /// True when `type` is `string` or a list containing `string`.
    pub fn allows_string(&self) -> bool {
        self.type_name() == Some("string")
            || self
                .type_list()
                .is_some_and(|types| types.iter().any(|ty| ty.as_str() == Some("string")))
    }

    /// `const`, when set to something other than `null`.
    pub fn constant(&self) -> Option<&'a Value> {
        self.get("const").filter(|value| !value.is_null())
    }

    /// `enum` values.
    pub fn enum_values(&self) -> Option<&'a [Value]> {
        self.get("enum").and_then(Value::as_array).map(Vec::as_slice)
    }

    /// Members of a composition keyword.
    pub fn composition(&self, kind: CompositionKind) -> Option<&'a [Value]> {
        self.get(kind.key())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// `properties`, when it is an object.
    pub fn properties(&self) -> Option<&'a Map<String, Value>> {
        self.get("properties").and_then(Value::as_object)
    }

    /// `required` names.
    pub fn required(&self) -> Option<&'a [Value]> {
        self.get("required")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// Whether `name` is listed in `required`.
    pub fn is_required(&self, name: &str) -> bool {
        self.required()
            .is_some_and(|names| names.iter().any(|n| n.as_str() == Some(name)))
    }

    /// `additionalProperties`, when truthy.
    pub fn additional_properties(&self) -> Option<&'a Value> {
        self.get("additionalProperties").filter(|value| truthy(value))
    }

    /// Fixed tuple items from `prefixItems` or an array-valued `items`.
    pub fn tuple_items(&self) -> Option<&'a [Value]> {
        match self.get("prefixItems").filter(|value| truthy(value)) {
            Some(Value::Array(items)) => Some(items),
            Some(_) => None,
            None => self.get("items").and_then(Value::as_array).map(Vec::as_slice),
        }
    }

    /// Single `items` schema, when truthy and not a list.
    pub fn items(&self) -> Option<&'a Value> {
        self.get("items")
            .filter(|value| truthy(value) && !value.is_array())
    }

    /// `minItems` when it is a non-negative integer, else 0.
    pub fn min_items(&self) -> u64 {
        self.get("minItems").and_then(Value::as_u64).unwrap_or(0)
    }

    /// Raw `maxItems` when it is a non-negative integer.
    pub fn max_items(&self) -> Option<u64> {
        self.get("maxItems").and_then(Value::as_u64)
    }
}
