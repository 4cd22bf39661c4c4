//! Module assembly: named declarations out of the registries, rendered as a
//! single TypeScript module of nested namespaces.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::hint::SchemaKind;
use crate::pointer::{Pointer, ROOT_DOCUMENT, document_index};
use crate::registry::Registries;
use crate::resolve::{ResolveOptions, resolve};
use crate::source::SchemaSource;
use crate::transform::ts::indent;
use crate::transform::{GenerationContext, GenerationOptions, transform};

const HEADER: &str = "/**
 * This file was auto-generated by openapi-ts.
 * Do not make direct changes to the file.
 */";

const HELPERS: &str = "type Without<T, U> = { [P in Exclude<keyof T, keyof U>]?: never };
type XOR<T, U> = T | U extends object ? (Without<T, U> & U) | (Without<U, T> & T) : T | U;
type OneOf<T extends any[]> = T extends [infer Only]
  ? Only
  : T extends [infer A, infer B, ...infer Rest]
    ? OneOf<[XOR<A, B>, ...Rest]>
    : never;
type WithRequired<T, K extends keyof T> = T & { [P in K]-?: T[P] };";

/// Leaf name used when a declaration has no path of its own.
const ROOT_LEAF: &str = "Root";

/// Trait for emitting TypeScript source from assembled parts.
pub trait Emit {
    /// Render to TypeScript text.
    fn emit(&self) -> String;
}

/// One named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Canonical index; every flattened reference to this schema uses it.
    pub name: String,
    /// Where the schema lives, as `document#/a/b`.
    pub location: String,
    /// The type expression, laid out for its namespace depth.
    pub type_text: String,
}

impl Declaration {
    fn segments(&self) -> Vec<&str> {
        if self.name.is_empty() {
            Vec::new()
        } else {
            self.name.split('.').collect()
        }
    }
}

/// Every schema the loaded documents declare, in document order, followed by
/// every other reference target.
///
/// Root-kind documents contribute each `components.schemas` entry, schema-map
/// documents each top-level entry and a schema-object root document itself.
/// Any flattened reference whose index none of those cover is then declared
/// from the node it points at, so every reference in the output names a
/// declaration.
pub fn collect_declarations(
    registries: &Registries,
    ctx: GenerationContext<'_>,
) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for (id, document) in &registries.documents {
        let entries: Vec<(Vec<String>, &Value)> = match document.hint {
            SchemaKind::OpenApi3 => document
                .schema
                .pointer("/components/schemas")
                .and_then(Value::as_object)
                .map(|schemas| {
                    schemas
                        .iter()
                        .map(|(name, schema)| {
                            let path = vec![
                                "components".to_string(),
                                "schemas".to_string(),
                                name.clone(),
                            ];
                            (path, schema)
                        })
                        .collect()
                })
                .unwrap_or_default(),
            SchemaKind::SchemaMap => document
                .schema
                .as_object()
                .map(|map| {
                    map.iter()
                        .map(|(name, schema)| (vec![name.clone()], schema))
                        .collect()
                })
                .unwrap_or_default(),
            SchemaKind::SchemaObject if id == ROOT_DOCUMENT => {
                vec![(Vec::new(), &document.schema)]
            }
            other => {
                debug!(document = %id, hint = %other, "Document declares no schemas of its own.");
                Vec::new()
            }
        };
        for (path, schema) in entries {
            declarations.push(declare(id, path, schema, ctx));
        }
    }

    let declared: HashSet<String> = declarations
        .iter()
        .map(|declaration| declaration.name.clone())
        .collect();
    for (name, target) in &registries.references {
        if declared.contains(name) {
            continue;
        }
        let Some(schema) = registries
            .documents
            .get(&target.document)
            .and_then(|document| node_at(&document.schema, &target.path))
        else {
            debug!(reference = %name, document = %target.document, "Reference target is missing.");
            continue;
        };
        declarations.push(declare(&target.document, target.path.clone(), schema, ctx));
    }
    declarations
}

fn declare(
    document: &str,
    path: Vec<String>,
    schema: &Value,
    ctx: GenerationContext<'_>,
) -> Declaration {
    let name = document_index(document, &path);
    let depth = name.matches('.').count();
    let location = Pointer {
        document: document.to_string(),
        path,
    }
    .to_reference_string();
    let type_text = transform(schema, &location, ctx.at_level(depth));
    Declaration {
        name,
        location,
        type_text,
    }
}

/// The node at `path` below `root`; array segments are decimal indexes.
fn node_at<'v>(root: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, segment| match node {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

#[derive(Debug, Default)]
struct Namespace<'a> {
    types: Vec<(&'a str, &'a str)>,
    children: BTreeMap<&'a str, Namespace<'a>>,
}

impl<'a> Namespace<'a> {
    fn insert(&mut self, declaration: &'a Declaration) {
        let segments = declaration.segments();
        let Some((leaf, parents)) = segments.split_last() else {
            self.types.push((ROOT_LEAF, &declaration.type_text));
            return;
        };
        let mut node = self;
        for parent in parents {
            node = node.children.entry(*parent).or_default();
        }
        node.types.push((*leaf, &declaration.type_text));
    }

    fn render(&self, level: usize, out: &mut Vec<String>) {
        for (name, type_text) in &self.types {
            out.push(indent(&format!("export type {name} = {type_text};"), level));
        }
        for (name, child) in &self.children {
            out.push(indent(&format!("export namespace {name} {{"), level));
            child.render(level + 1, out);
            out.push(indent("}", level));
        }
    }
}

/// A complete module: header, helper types and the namespace tree.
#[derive(Debug, Clone, Copy)]
pub struct Module<'a> {
    declarations: &'a [Declaration],
}

impl<'a> Module<'a> {
    /// Module over `declarations`.
    pub fn new(declarations: &'a [Declaration]) -> Self {
        Self { declarations }
    }
}

impl Emit for Module<'_> {
    fn emit(&self) -> String {
        let mut root = Namespace::default();
        for declaration in self.declarations {
            root.insert(declaration);
        }
        let mut body = Vec::new();
        root.render(0, &mut body);

        let mut out = format!("{HEADER}\n\n{HELPERS}\n");
        if !body.is_empty() {
            out.push('\n');
            out.push_str(&body.join("\n"));
            out.push('\n');
        }
        out
    }
}

/// Render `declarations` as one module.
pub fn render_module(declarations: &[Declaration]) -> String {
    Module::new(declarations).emit()
}

/// Resolve `source`, transform every declared schema and render the module.
pub async fn generate(
    source: SchemaSource,
    resolve_options: ResolveOptions,
    options: &GenerationOptions,
) -> Result<String> {
    let registries = resolve(source, resolve_options).await?;
    let ctx = GenerationContext::new(options, &registries.discriminators)
        .with_tagged(&registries.tagged);
    let declarations = collect_declarations(&registries, ctx);
    info!(declarations = declarations.len(), "Rendering type module.");
    Ok(render_module(&declarations))
}
