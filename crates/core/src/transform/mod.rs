//! Schema node to TypeScript type expression.
//!
//! [`transform`] is a pure recursive function over one resolved node. It
//! reads the discriminator registry through the [`GenerationContext`] and
//! never touches anything else, so independent nodes can be transformed in
//! parallel once resolution is done.
//!
//! Decision order, first match wins:
//! 1. scalars pass through, arrays are literal tuples, references are names
//! 2. the custom hook, when it returns something
//! 3. `const`, then `enum`
//! 4. `oneOf` without a discriminated member; exclusive when a branch is an
//!    object shape or a tagged schema
//! 5. primitive `type`s, including arrays with bounded-length expansion
//! 6. object shape, discriminator tag, then `oneOf` / `allOf` / `anyOf`
//! 7. nullable wrapping and the empty fallbacks

mod node;
pub mod ts;

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::pointer::Pointer;
use crate::registry::{Discriminator, DiscriminatorRegistry, TaggedSchemas};

pub use node::{CompositionKind, SchemaNode, SchemaObject};
use ts::{
    entries, esc_obj_key, esc_str, indent, quote, raw_text, schema_comment, ts_array_of,
    ts_intersection_of, ts_omit, ts_one_of, ts_optional_property, ts_readonly, ts_tuple_of,
    ts_union_of, ts_with_required,
};

/// Arrays are expanded into per-length tuples only below this estimated size.
const LENGTH_EXPANSION_LIMIT: u128 = 30;

/// Generation flags, loadable from a `[generate]` config table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct GenerationOptions {
    /// Sort properties in natural order instead of declaration order.
    pub alphabetize: bool,
    /// Drop properties marked `deprecated`.
    pub exclude_deprecated: bool,
    /// Emit every property and array as `readonly`.
    pub immutable_types: bool,
    /// Give every object shape an index signature.
    pub additional_properties: bool,
    /// Treat properties with a `default` as always present.
    pub default_non_nullable: bool,
    /// Typed-but-empty objects become `Record<string, unknown>`.
    pub empty_objects_unknown: bool,
    /// Expand small `minItems` / `maxItems` ranges into tuples.
    pub support_array_length: bool,
}

/// Custom type mapping. Both hooks default to "no opinion".
pub trait TransformHook: Send + Sync {
    /// Runs before the built-in rules; a non-empty result wins.
    fn transform(
        &self,
        _schema: SchemaObject<'_>,
        _path: &str,
        _ctx: &GenerationContext<'_>,
    ) -> Option<String> {
        None
    }

    /// Runs on every result; a non-empty result replaces it.
    fn post_transform(
        &self,
        _output: &str,
        _path: &str,
        _ctx: &GenerationContext<'_>,
    ) -> Option<String> {
        None
    }
}

/// The default hook: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl TransformHook for NoHook {}

static NO_HOOK: NoHook = NoHook;

static NO_TAGGED: TaggedSchemas = TaggedSchemas::new();

/// Per-call configuration. Child calls only ever change `indent_lv`.
#[derive(Clone, Copy)]
pub struct GenerationContext<'a> {
    /// Current indentation level.
    pub indent_lv: usize,
    /// Generation flags.
    pub options: &'a GenerationOptions,
    /// Discriminators collected during resolution.
    pub discriminators: &'a DiscriminatorRegistry,
    /// Schemas that inherit a discriminator tag.
    pub tagged: &'a TaggedSchemas,
    hooks: &'a dyn TransformHook,
}

impl fmt::Debug for GenerationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("indent_lv", &self.indent_lv)
            .field("options", self.options)
            .field("discriminators", &self.discriminators.len())
            .field("tagged", &self.tagged.len())
            .finish_non_exhaustive()
    }
}

impl<'a> GenerationContext<'a> {
    /// Root-level context without hooks.
    pub fn new(options: &'a GenerationOptions, discriminators: &'a DiscriminatorRegistry) -> Self {
        Self {
            indent_lv: 0,
            options,
            discriminators,
            tagged: &NO_TAGGED,
            hooks: &NO_HOOK,
        }
    }

    /// Use the tagged-schema set collected during resolution.
    pub fn with_tagged(self, tagged: &'a TaggedSchemas) -> Self {
        Self { tagged, ..self }
    }

    /// Install custom hooks.
    pub fn with_hooks(self, hooks: &'a dyn TransformHook) -> Self {
        Self { hooks, ..self }
    }

    /// Same context at another indentation level.
    pub fn at_level(self, indent_lv: usize) -> Self {
        Self { indent_lv, ..self }
    }

    fn nested(self) -> Self {
        self.at_level(self.indent_lv + 1)
    }

    /// Discriminator registered for `member`'s reference, if any.
    fn discriminator_for(&self, member: &Value) -> Option<&'a Discriminator> {
        let reference = member.as_object()?.get("$ref")?.as_str()?;
        self.discriminators.get(reference)
    }

    /// True when `member` references a schema that carries its own tag.
    fn is_tagged(&self, member: &Value) -> bool {
        member
            .as_object()
            .and_then(|fields| fields.get("$ref"))
            .and_then(Value::as_str)
            .is_some_and(|reference| self.tagged.contains(reference))
    }
}

/// Transform `node`, found at `path`, into a type expression.
///
/// `path` is the node's own location as a reference string
/// (`document#/a/b`); its final segment names discriminated members.
pub fn transform(node: &Value, path: &str, ctx: GenerationContext<'_>) -> String {
    let output = transform_default(node, path, ctx);
    ctx.hooks
        .post_transform(&output, path, &ctx)
        .filter(|custom| !custom.is_empty())
        .unwrap_or(output)
}

fn transform_default(node: &Value, path: &str, ctx: GenerationContext<'_>) -> String {
    let schema = match SchemaNode::classify(node) {
        SchemaNode::Scalar(value) => return raw_text(value),
        SchemaNode::Tuple(items) => {
            let tuple = ts_tuple_of(items.iter().map(|item| transform(item, path, ctx)));
            return if ctx.options.immutable_types {
                ts_readonly(&tuple)
            } else {
                tuple
            };
        }
        SchemaNode::Reference(reference) => return reference.to_string(),
        SchemaNode::Schema(schema) => schema,
    };

    if let Some(custom) = ctx
        .hooks
        .transform(schema, path, &ctx)
        .filter(|custom| !custom.is_empty())
    {
        return custom;
    }

    if let Some(constant) = schema.constant() {
        return transform(&Value::String(esc_str(constant)), path, ctx.nested());
    }

    if let Some(values) = schema.enum_values() {
        return enum_type(schema, values);
    }

    if let Some(members) = schema.composition(CompositionKind::OneOf)
        && !members
            .iter()
            .any(|member| ctx.discriminator_for(member).is_some())
    {
        let types: Vec<String> = members
            .iter()
            .map(|member| transform(member, path, ctx))
            .collect();
        let object_shaped = types.iter().any(|ty| ty.contains('{'))
            || members.iter().any(|member| ctx.is_tagged(member));
        return if object_shaped {
            ts_one_of(types)
        } else {
            ts_union_of(types)
        };
    }

    if let Some(primitive) = primitive_type(schema, path, ctx) {
        return primitive;
    }

    object_type(schema, path, ctx)
}

fn nullable(type_text: String, schema: SchemaObject<'_>) -> String {
    if schema.nullable() {
        ts_union_of([type_text, "null".to_string()])
    } else {
        type_text
    }
}

fn enum_type(schema: SchemaObject<'_>, values: &[Value]) -> String {
    let literal: fn(&Value) -> String = if !schema.has("type") || schema.allows_string() {
        esc_str
    } else {
        raw_text
    };
    let mut members: Vec<String> = values.iter().map(literal).collect();
    if schema.nullable() {
        members.push("null".to_string());
    }
    ts_union_of(members)
}

fn primitive_type(
    schema: SchemaObject<'_>,
    path: &str,
    ctx: GenerationContext<'_>,
) -> Option<String> {
    match schema.get("type")? {
        Value::String(ty) => match ty.as_str() {
            "null" => Some("null".to_string()),
            "string" | "boolean" => Some(nullable(ty.clone(), schema)),
            "number" | "integer" => Some(nullable("number".to_string(), schema)),
            "array" => Some(array_type(schema, path, ctx)),
            _ => None,
        },
        Value::Array(types) => Some(ts_union_of(types.iter().map(|ty| {
            let mut fields = schema.fields().clone();
            fields.insert("type".to_string(), ty.clone());
            transform(&Value::Object(fields), path, ctx)
        }))),
        _ => None,
    }
}

fn array_type(schema: SchemaObject<'_>, path: &str, ctx: GenerationContext<'_>) -> String {
    let item_ctx = ctx.nested();
    let readonly = ctx.options.immutable_types || schema.read_only();
    let wrap = |type_text: String| {
        if readonly {
            ts_readonly(&type_text)
        } else {
            type_text
        }
    };

    let (item_type, is_tuple) = if let Some(items) = schema.tuple_items() {
        let members = items.iter().map(|item| transform(item, path, item_ctx));
        (ts_tuple_of(members), true)
    } else if let Some(items) = schema.items() {
        (transform(items, path, item_ctx), false)
    } else {
        ("unknown".to_string(), false)
    };

    let min = schema.min_items();
    let max = schema.max_items().filter(|max| *max >= min);
    let estimate = match max {
        Some(max) => {
            let (min, max) = (u128::from(min), u128::from(max));
            (max * (max + 1) - min * min.saturating_sub(1)) / 2
        }
        None => u128::from(min),
    };

    let array = if ctx.options.support_array_length
        && (min != 0 || max.is_some())
        && estimate < LENGTH_EXPANSION_LIMIT
    {
        match max {
            None => {
                let mut slots = vec![item_type.clone(); min as usize];
                slots.push(format!("...{}", ts_array_of(&item_type)));
                wrap(ts_tuple_of(slots))
            }
            Some(max) => ts_union_of(
                (min..=max).map(|len| wrap(ts_tuple_of(vec![item_type.as_str(); len as usize]))),
            ),
        }
    } else if is_tuple {
        wrap(item_type)
    } else {
        wrap(ts_array_of(&item_type))
    };

    nullable(array, schema)
}

fn object_type(schema: SchemaObject<'_>, path: &str, ctx: GenerationContext<'_>) -> String {
    let level = ctx.indent_lv;
    let options = ctx.options;
    let mut core: Vec<String> = Vec::new();

    let has_properties = schema.properties().is_some_and(|properties| !properties.is_empty());
    if has_properties || schema.additional_properties().is_some() {
        let inner = ctx.nested();
        let readonly = options.immutable_types || schema.read_only();

        if let Some(properties) = schema.properties() {
            let properties = entries(properties, options.alphabetize, options.exclude_deprecated);
            for (name, property) in properties {
                if let Some(doc) = schema_comment(property, level + 1) {
                    core.push(indent(&doc, level + 1));
                }
                let defaulted = options.default_non_nullable
                    && property
                        .as_object()
                        .is_some_and(|fields| fields.contains_key("default"));
                let mut key = esc_obj_key(name);
                if !schema.is_required(name) && !defaulted {
                    key = ts_optional_property(&key);
                }
                if readonly {
                    key = ts_readonly(&key);
                }
                let value = transform(property, path, inner);
                core.push(indent(&format!("{key}: {value};"), level + 1));
            }
        }

        if schema.additional_properties().is_some() || options.additional_properties {
            let value = match schema.get("additionalProperties") {
                Some(additional @ Value::Object(fields)) if !fields.is_empty() => {
                    transform(additional, path, inner)
                }
                _ => String::new(),
            };
            let value = if value.is_empty() {
                "unknown".to_string()
            } else {
                value
            };
            let signature = ts_union_of([value, "undefined".to_string()]);
            core.push(indent(&format!("[key: string]: {signature};"), level + 1));
        }
    }

    let discriminator = CompositionKind::ALL.iter().find_map(|kind| {
        schema
            .composition(*kind)?
            .iter()
            .find_map(|member| ctx.discriminator_for(member))
    });
    if let Some(discriminator) = discriminator {
        let tag = discriminator.tag_for(&location_tail(path));
        let line = format!("{}: {};", esc_obj_key(&discriminator.property_name), quote(&tag));
        core.insert(0, indent(&line, level + 1));
    }

    let mut final_type = if core.is_empty() {
        String::new()
    } else {
        format!("{{\n{}\n{}", core.join("\n"), indent("}", level))
    };

    let collect = |members: &[Value]| -> Vec<String> {
        members
            .iter()
            .map(|member| {
                let member_type = transform(member, path, ctx);
                match ctx.discriminator_for(member) {
                    Some(discriminator) => {
                        ts_omit(&member_type, &[discriminator.property_name.as_str()])
                    }
                    None => member_type,
                }
            })
            .collect()
    };

    if let Some(members) = schema.composition(CompositionKind::OneOf) {
        let one_of = ts_one_of(collect(members));
        final_type = if final_type.is_empty() {
            one_of
        } else {
            ts_intersection_of([final_type, one_of])
        };
    } else {
        if let Some(members) = schema.composition(CompositionKind::AllOf) {
            let mut parts = Vec::with_capacity(members.len() + 1);
            if !final_type.is_empty() {
                parts.push(final_type);
            }
            parts.extend(collect(members));
            final_type = ts_intersection_of(parts);
            if let Some(required) = schema.required().filter(|required| !required.is_empty()) {
                final_type = ts_with_required(&final_type, required);
            }
        }
        if let Some(members) = schema.composition(CompositionKind::AnyOf) {
            let any_of = ts_union_of(collect(members));
            final_type = if final_type.is_empty() {
                any_of
            } else {
                ts_intersection_of([final_type, any_of])
            };
        }
    }

    if schema.nullable() {
        let base = if final_type.is_empty() {
            "Record<string, unknown>".to_string()
        } else {
            final_type
        };
        final_type = ts_union_of([base, "null".to_string()]);
    }

    if !final_type.is_empty() {
        return final_type;
    }
    if !schema.has("type") {
        return "unknown".to_string();
    }
    if options.empty_objects_unknown {
        "Record<string, unknown>".to_string()
    } else {
        "Record<string, never>".to_string()
    }
}

/// Final segment of a node location, unescaped.
fn location_tail(path: &str) -> String {
    Pointer::parse(path)
        .ok()
        .and_then(|pointer| pointer.path.last().cloned())
        .unwrap_or_default()
}
