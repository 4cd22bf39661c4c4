//! Multi-document reference resolution.
//!
//! The resolver loads a root document, follows every cross-document reference
//! it contains (concurrently, once per document), rewrites the references into
//! a single canonical namespace and collects reusable parameters and
//! discriminators.
//!
//! Pipeline per root-level call:
//! 1. Load the entry document and walk it, dispatching a load for every newly
//!    seen referenced document. Each of those walks its own references.
//! 2. Once every load has joined, flatten all references in every document
//!    into canonical index strings.
//! 3. Collect parameters and discriminators keyed by canonical index.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchRequest, ReqwestFetch};
use crate::hint::{SchemaKind, infer_kind};
use crate::pointer::{Pointer, ROOT_DOCUMENT, document_index, is_canonical_index};
use crate::registry::{Discriminator, DocumentId, ReferenceRegistry, Registries, SchemaDocument};
use crate::source::{
    Format, SchemaSource, VIRTUAL_JSON_URL, is_file_path, is_remote_url, parse_document,
    parse_remote_url,
};
use crate::walk::{PathSegment, render_path, walk, walk_mut};

const REF_KEY: &str = "$ref";
const COMPOSITION_KEYS: [&str; 3] = ["allOf", "anyOf", "oneOf"];
const USER_AGENT: &str = "openapi-ts";

/// Options for a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Kind the entry document is loaded as.
    pub hint: SchemaKind,
    /// HTTP capability for remote documents.
    pub fetch: Arc<dyn Fetch>,
    /// Value of the `Authorization` header, if any.
    pub auth: Option<String>,
    /// Extra request headers. Non-string values are sent as JSON text.
    pub headers: BTreeMap<String, Value>,
    /// HTTP method used to fetch documents.
    pub http_method: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            hint: SchemaKind::OpenApi3,
            fetch: Arc::new(ReqwestFetch::new()),
            auth: None,
            headers: BTreeMap::new(),
            http_method: "GET".to_string(),
        }
    }
}

impl ResolveOptions {
    /// Use a custom fetch capability.
    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = fetch;
        self
    }

    /// Send `auth` as the `Authorization` header.
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];
        if let Some(auth) = &self.auth {
            headers.push(("Authorization".to_string(), auth.clone()));
        }
        for (name, value) in &self.headers {
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value));
        }
        headers
    }
}

/// Resolves schema documents into one [`Registries`] set.
///
/// Repeated [`Resolver::resolve`] calls accumulate into the same run.
#[derive(Debug, Clone)]
pub struct Resolver {
    state: Arc<RunState>,
}

#[derive(Debug)]
struct RunState {
    options: ResolveOptions,
    root: OnceLock<Url>,
    seen: Mutex<HashSet<DocumentId>>,
    registries: Mutex<Registries>,
}

/// The document currently being walked.
#[derive(Debug, Clone)]
struct DocumentContext {
    id: DocumentId,
    location: Url,
    hint: SchemaKind,
}

impl DocumentContext {
    fn is_virtual(&self) -> bool {
        self.location.as_str() == VIRTUAL_JSON_URL
    }
}

/// Resolve `source` in a fresh run and return the populated registries.
pub async fn resolve(source: SchemaSource, options: ResolveOptions) -> Result<Registries> {
    let resolver = Resolver::new(options);
    resolver.resolve(source).await?;
    Ok(resolver.into_registries())
}

impl Resolver {
    /// Start an empty run.
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            state: Arc::new(RunState {
                options,
                root: OnceLock::new(),
                seen: Mutex::new(HashSet::new()),
                registries: Mutex::new(Registries::default()),
            }),
        }
    }

    /// Load `source` and everything it references, then flatten references
    /// and collect parameters and discriminators across the whole run.
    pub async fn resolve(&self, source: SchemaSource) -> Result<()> {
        let (location, payload) = match source {
            SchemaSource::Path(path) => (local_url(&path).await?, Payload::Fetch),
            SchemaSource::Url(url) => (url, Payload::Fetch),
            SchemaSource::Value(value) => (virtual_root()?, Payload::Value(value)),
            SchemaSource::Stream(reader) => (virtual_root()?, Payload::Stream(reader)),
        };

        let root = self.state.root.get_or_init(|| location.clone());
        let id = document_id(root, &location);
        if !self.state.mark_seen(&id) {
            debug!(document = %id, "Document already loaded in this run.");
            return Ok(());
        }

        let schema = match payload {
            Payload::Fetch => self.state.load(&location, &id).await?,
            Payload::Value(value) => value,
            Payload::Stream(mut reader) => {
                let mut bytes = Vec::new();
                reader
                    .read_to_end(&mut bytes)
                    .await
                    .map_err(|err| Error::not_found(&id, err))?;
                let text = decode_stream(bytes, &id)?;
                let text = text.trim();
                parse_document(text, Format::sniff(text), &id)?
            }
        };

        let hint = self.state.options.hint;
        debug!(document = %id, %hint, location = %location, "Resolving schema document.");
        Arc::clone(&self.state)
            .process(DocumentContext { id, location, hint }, schema)
            .await?;

        self.state.finish()
    }

    /// Snapshot of the registries populated so far.
    pub fn registries(&self) -> Registries {
        self.state.lock_registries().clone()
    }

    /// Consume the resolver and return its registries.
    pub fn into_registries(self) -> Registries {
        std::mem::take(&mut *self.state.lock_registries())
    }
}

enum Payload {
    Fetch,
    Value(Value),
    Stream(Box<dyn tokio::io::AsyncRead + Send + Unpin>),
}

impl RunState {
    fn lock_registries(&self) -> MutexGuard<'_, Registries> {
        self.registries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically insert `id` into the seen set; false if it was already there.
    fn mark_seen(&self, id: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string())
    }

    fn root_url(&self) -> Result<Url> {
        match self.root.get() {
            Some(root) => Ok(root.clone()),
            None => virtual_root(),
        }
    }

    async fn load(&self, location: &Url, id: &str) -> Result<Value> {
        let by_extension = Format::from_extension(location.path());
        match location.scheme() {
            "http" | "https" => {
                let request = FetchRequest {
                    url: location.clone(),
                    method: self.options.http_method.clone(),
                    headers: self.options.request_headers(),
                };
                let response = self.options.fetch.fetch(request).await?;
                if !response.is_success() {
                    warn!(
                        url = %location,
                        status = response.status,
                        "Schema request returned an error status."
                    );
                    return Err(Error::not_found(
                        location.as_str(),
                        format!("HTTP status {}", response.status),
                    ));
                }
                let format = by_extension
                    .or_else(|| {
                        response
                            .content_type
                            .as_deref()
                            .and_then(Format::from_content_type)
                    })
                    .unwrap_or_else(|| Format::sniff(&response.body));
                debug!(document = %id, format = format.name(), "Parsing remote document.");
                parse_document(&response.body, format, id)
            }
            "file" => {
                let path = location
                    .to_file_path()
                    .map_err(|()| Error::not_found(location.as_str(), "not a local file path"))?;
                check_local_file(&path).await?;
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|err| Error::not_found(path.display().to_string(), err))?;
                let format = by_extension.unwrap_or_else(|| Format::sniff(&text));
                debug!(document = %id, format = format.name(), "Parsing local document.");
                parse_document(&text, format, id)
            }
            scheme => Err(Error::not_found(
                location.as_str(),
                format!("unsupported scheme \"{scheme}\""),
            )),
        }
    }

    /// Walk one document, dispatch loads for the documents it references and
    /// wait for all of them.
    fn process(
        self: Arc<Self>,
        document: DocumentContext,
        mut schema: Value,
    ) -> BoxFuture<'static, Result<()>> {
        async move {
            if !schema.is_object() {
                return Err(Error::invalid_node(
                    &document.id,
                    "(root)",
                    format!("expected object, got {}", value_kind(&schema)),
                ));
            }
            if document.hint == SchemaKind::OpenApi3
                && let Some(Value::Object(components)) = schema.get_mut("components")
            {
                components.shift_remove("examples");
            }

            let mut pending = Vec::new();
            walk_mut(&mut schema, &mut |node, path| {
                self.visit(&document, node, path, &mut pending)
            })?;

            self.lock_registries()
                .documents
                .entry(document.id.clone())
                .or_insert(SchemaDocument {
                    hint: document.hint,
                    schema,
                });

            if !pending.is_empty() {
                debug!(
                    document = %document.id,
                    count = pending.len(),
                    "Waiting on referenced documents."
                );
            }
            try_join_all(pending).await?;
            Ok(())
        }
        .boxed()
    }

    fn visit(
        self: &Arc<Self>,
        document: &DocumentContext,
        node: &mut Map<String, Value>,
        path: &[PathSegment],
        pending: &mut Vec<BoxFuture<'static, Result<()>>>,
    ) -> Result<()> {
        for key in COMPOSITION_KEYS {
            if let Some(Value::Array(members)) = node.get_mut(key) {
                let mut kept = Vec::with_capacity(members.len());
                for member in std::mem::take(members) {
                    let Value::Object(fields) = &member else {
                        return Err(Error::invalid_node(
                            &document.id,
                            format!("{}.{key}", render_path(path)),
                            "expected array of objects",
                        ));
                    };
                    if let Some(Value::String(reference)) = fields.get(REF_KEY)
                        && parse_ref(reference, &document.id, path)?.has_extension_segment()
                    {
                        debug!(
                            document = %document.id,
                            reference = %reference,
                            "Dropping vendor-extension composition member."
                        );
                        continue;
                    }
                    kept.push(member);
                }
                *members = kept;
            }
        }

        let Some(Value::String(reference)) = node.get(REF_KEY) else {
            return Ok(());
        };
        let pointer = parse_ref(reference, &document.id, path)?;
        if pointer.is_local() {
            return Ok(());
        }
        if pointer.has_extension_segment() {
            debug!(
                document = %document.id,
                reference = %reference,
                "Removing vendor-extension reference."
            );
            node.shift_remove(REF_KEY);
            return Ok(());
        }

        let hint = if matches!(
            pointer.path.first().map(String::as_str),
            Some("paths" | "components")
        ) {
            SchemaKind::OpenApi3
        } else {
            let mut hint_path = path.to_vec();
            hint_path.push(PathSegment::Key(pointer.document.clone()));
            hint_path.extend(pointer.path.iter().map(|segment| PathSegment::Key(segment.clone())));
            infer_kind(&hint_path, true, Some(document.hint))
        };

        let target = self.target_url(document, &pointer, reference, path)?;
        let target_id = document_id(&self.root_url()?, &target);
        if self.mark_seen(&target_id) {
            debug!(
                from = %document.id,
                document = %target_id,
                %hint,
                "Dispatching referenced document load."
            );
            pending.push(Arc::clone(self).load_child(target, target_id.clone(), hint));
        }

        let rewritten = Pointer {
            document: target_id,
            path: pointer.path,
        }
        .to_reference_string();
        node.insert(REF_KEY.to_string(), Value::String(rewritten));
        Ok(())
    }

    fn load_child(
        self: Arc<Self>,
        location: Url,
        id: DocumentId,
        hint: SchemaKind,
    ) -> BoxFuture<'static, Result<()>> {
        async move {
            let schema = self.load(&location, &id).await?;
            self.process(DocumentContext { id, location, hint }, schema)
                .await
        }
        .boxed()
    }

    fn target_url(
        &self,
        document: &DocumentContext,
        pointer: &Pointer,
        reference: &str,
        path: &[PathSegment],
    ) -> Result<Url> {
        let unresolved = |detail: String| Error::UnresolvedReference {
            document: document.id.clone(),
            path: render_path(path),
            reference: reference.to_string(),
            detail,
        };

        if pointer.document.starts_with("//") {
            return parse_remote_url(&pointer.document);
        }
        if !document.is_virtual() {
            return document
                .location
                .join(&pointer.document)
                .map_err(|err| unresolved(format!(": {err}")));
        }
        if is_remote_url(&pointer.document) {
            return parse_remote_url(&pointer.document);
        }
        if is_file_path(&pointer.document) {
            return if pointer.document.starts_with("file://") {
                Url::parse(&pointer.document).map_err(|err| unresolved(format!(": {err}")))
            } else {
                Url::from_file_path(&pointer.document)
                    .map_err(|()| unresolved(": not an absolute path".to_string()))
            };
        }
        Err(unresolved(
            " from dynamic JSON. Load this schema from a URL instead".to_string(),
        ))
    }

    /// Root-level pass: flatten references and collect registries.
    fn finish(&self) -> Result<()> {
        let mut registries = self.lock_registries();
        let references = flatten_references(&mut registries.documents)?;
        registries.references.extend(references);
        collect_parameters(&mut registries);
        collect_discriminators(&mut registries);
        collect_tagged(&mut registries);
        info!(
            documents = registries.documents.len(),
            parameters = registries.parameters.len(),
            discriminators = registries.discriminators.len(),
            "Schema resolution complete."
        );
        Ok(())
    }
}

/// Rewrite every reference in every document into a canonical index string.
///
/// References into the root document become a direct index of their path;
/// references into any other document are prefixed with `external.<id>`.
/// Already-flattened references are left untouched, so the pass is idempotent.
///
/// Returns the target of every index produced by this pass.
pub fn flatten_references(
    documents: &mut BTreeMap<DocumentId, SchemaDocument>,
) -> Result<ReferenceRegistry> {
    let mut references = ReferenceRegistry::new();
    for (id, document) in documents.iter_mut() {
        walk_mut(&mut document.schema, &mut |node, path| {
            let target = match node.get(REF_KEY) {
                Some(Value::String(reference)) if !is_canonical_index(reference) => {
                    let pointer = parse_ref(reference, id, path)?;
                    Pointer {
                        document: if pointer.is_local() {
                            id.clone()
                        } else {
                            pointer.document
                        },
                        path: pointer.path,
                    }
                }
                _ => return Ok(()),
            };
            let index = document_index(&target.document, &target.path);
            node.insert(REF_KEY.to_string(), Value::String(index.clone()));
            references.entry(index).or_insert(target);
            Ok(())
        })?;
    }
    Ok(references)
}

fn collect_parameters(registries: &mut Registries) {
    let Registries {
        documents,
        parameters,
        ..
    } = registries;
    for (id, document) in documents.iter() {
        for (node, path) in walk(&document.schema) {
            if node.contains_key("in") {
                parameters
                    .entry(document_index(id, &path))
                    .or_insert_with(|| Value::Object(node.clone()));
            }
        }
    }
}

fn collect_discriminators(registries: &mut Registries) {
    let Registries {
        documents,
        discriminators,
        ..
    } = registries;
    for (id, document) in documents.iter() {
        let may_declare = serde_json::to_string(&document.schema)
            .is_ok_and(|text| text.contains("\"discriminator\""));
        if !may_declare {
            continue;
        }
        for (node, path) in walk(&document.schema) {
            let Some(raw @ Value::Object(_)) = node.get("discriminator") else {
                continue;
            };
            match serde_json::from_value::<Discriminator>(raw.clone()) {
                Ok(discriminator) => {
                    discriminators
                        .entry(document_index(id, &path))
                        .or_insert(discriminator);
                }
                Err(err) => {
                    debug!(
                        document = %id,
                        path = %render_path(&path),
                        error = %err,
                        "Skipping non-discriminator object."
                    );
                }
            }
        }
    }
}

fn collect_tagged(registries: &mut Registries) {
    let Registries {
        documents,
        discriminators,
        tagged,
        ..
    } = registries;
    if discriminators.is_empty() {
        return;
    }
    for (id, document) in documents.iter() {
        for (node, path) in walk(&document.schema) {
            let composes_base = COMPOSITION_KEYS.iter().any(|key| {
                node.get(*key)
                    .and_then(Value::as_array)
                    .is_some_and(|members| {
                        members.iter().any(|member| {
                            member
                                .get(REF_KEY)
                                .and_then(Value::as_str)
                                .is_some_and(|reference| discriminators.contains_key(reference))
                        })
                    })
            });
            if composes_base {
                tagged.insert(document_index(id, &path));
            }
        }
    }
}

fn parse_ref(reference: &str, document: &str, path: &[PathSegment]) -> Result<Pointer> {
    Pointer::parse(reference).map_err(|err| match err {
        Error::MalformedReference { reference, reason } => Error::MalformedReference {
            reference,
            reason: format!("{reason} (in {document} at {})", render_path(path)),
        },
        other => other,
    })
}

/// Identity of `target` relative to the run's root location.
fn document_id(root: &Url, target: &Url) -> DocumentId {
    if target == root {
        return ROOT_DOCUMENT.to_string();
    }
    let is_http = |url: &Url| matches!(url.scheme(), "http" | "https");
    let same_origin = is_http(root) && is_http(target) && root.origin() == target.origin();
    let same_disk = root.scheme() == "file" && target.scheme() == "file";
    if (same_origin || same_disk)
        && let Some(relative) = root.make_relative(target)
        && !relative.is_empty()
    {
        return relative;
    }
    target.to_string()
}

/// Streamed bodies must be UTF-8; anything else is a malformed document.
fn decode_stream(bytes: Vec<u8>, id: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|err| {
        let lossy = String::from_utf8_lossy(err.as_bytes());
        Error::Parse {
            document: id.to_string(),
            format: Format::sniff(lossy.trim()).name(),
            message: err.utf8_error().to_string(),
        }
    })
}

fn virtual_root() -> Result<Url> {
    Url::parse(VIRTUAL_JSON_URL).map_err(|err| Error::not_found(VIRTUAL_JSON_URL, err))
}

async fn local_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)
        .map_err(|err| Error::not_found(path.display().to_string(), err))?;
    check_local_file(&absolute).await?;
    Url::from_file_path(&absolute)
        .map_err(|()| Error::not_found(absolute.display().to_string(), "not an absolute path"))
}

async fn check_local_file(path: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|err| Error::not_found(path.display().to_string(), err))?;
    if metadata.is_dir() {
        return Err(Error::NotAFile {
            location: path.display().to_string(),
        });
    }
    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
