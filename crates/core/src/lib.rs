//! Schema resolution and type generation for OpenAPI documents.
//!
//! The crate has two halves:
//! - [`resolve`] loads a root document, follows every cross-document
//!   reference, flattens references into canonical index names and collects
//!   parameter and discriminator registries.
//! - [`transform`] turns one resolved schema node into a TypeScript type
//!   expression.
//!
//! [`emit::generate`] strings both together into a rendered module.

mod error;
mod fetch;
mod hint;
mod pointer;
mod registry;
mod source;
mod walk;

pub mod emit;
pub mod resolve;
pub mod transform;

pub use emit::{Declaration, collect_declarations, generate, render_module};
pub use error::{Error, Result};
pub use fetch::{Fetch, FetchRequest, FetchResponse, ReqwestFetch};
pub use hint::{SchemaKind, infer_kind};
pub use pointer::{
    EXTENSION_PREFIX, EXTERNAL_MARKER, Pointer, ROOT_DOCUMENT, canonical_index, document_index,
    is_canonical_index, sanitize_segment,
};
pub use registry::{
    Discriminator, DiscriminatorRegistry, DocumentId, ParameterRegistry, ReferenceRegistry,
    Registries, SchemaDocument, TaggedSchemas,
};
pub use resolve::{ResolveOptions, Resolver, flatten_references};
pub use source::{SchemaSource, VIRTUAL_JSON_URL};
pub use transform::{GenerationContext, GenerationOptions, NoHook, TransformHook};
pub use walk::{PathSegment, Walk, render_path, walk, walk_mut};
