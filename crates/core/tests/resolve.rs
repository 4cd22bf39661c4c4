//! End-to-end resolution over local files, remote servers, streams and
//! in-memory documents.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use openapi_ts_core::{
    Error, Fetch, FetchRequest, FetchResponse, Registries, ResolveOptions, Resolver, SchemaKind,
    SchemaSource, flatten_references,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let file = dir.path().join(name);
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&file, contents).unwrap();
    file
}

async fn resolve_path(file: &Path) -> Result<Registries, Error> {
    resolve_source(SchemaSource::Path(file.to_path_buf())).await
}

async fn resolve_value(schema: Value) -> Result<Registries, Error> {
    resolve_source(SchemaSource::Value(schema)).await
}

async fn resolve_bytes(body: &[u8]) -> Result<Registries, Error> {
    resolve_source(SchemaSource::Stream(Box::new(std::io::Cursor::new(body.to_vec())))).await
}

async fn resolve_source(source: SchemaSource) -> Result<Registries, Error> {
    openapi_ts_core::resolve::resolve(source, ResolveOptions::default()).await
}

fn keys(registries: &Registries) -> Vec<&str> {
    registries.documents.keys().map(String::as_str).collect()
}

const ROOT: &str = r##"
openapi: 3.1.0
components:
  examples:
    PetExample:
      value: { name: Rex }
  schemas:
    Pet:
      $ref: "./pets.yaml#/Pet"
    Owner:
      type: object
      properties:
        name: { type: string }
"##;

const PETS: &str = r##"
Pet:
  type: object
  properties:
    owner:
      $ref: "openapi.yaml#/components/schemas/Owner"
    siblings:
      type: array
      items:
        $ref: "#/Pet"
"##;

#[tokio::test]
async fn mutually_referencing_documents_load_once() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(&dir, "openapi.yaml", ROOT);
    write(&dir, "pets.yaml", PETS);

    let registries = resolve_path(&root).await.unwrap();
    assert_eq!(keys(&registries), [".", "pets.yaml"]);

    let root_doc = &registries.root().unwrap().schema;
    assert_eq!(root_doc["components"]["schemas"]["Pet"]["$ref"], "external.pets$2eyaml.Pet");
    assert!(root_doc["components"].get("examples").is_none());

    let pets = &registries.documents["pets.yaml"];
    assert_eq!(pets.hint, SchemaKind::SchemaMap);
    assert_eq!(pets.schema["Pet"]["properties"]["owner"]["$ref"], "components.schemas.Owner");
    assert_eq!(
        pets.schema["Pet"]["properties"]["siblings"]["items"]["$ref"],
        "external.pets$2eyaml.Pet"
    );
}

#[tokio::test]
async fn cycle_terminates_from_either_entry_point() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir, "openapi.yaml", ROOT);
    let pets = write(&dir, "pets.yaml", PETS);

    let registries = resolve_path(&pets).await.unwrap();
    assert_eq!(keys(&registries), [".", "openapi.yaml"]);
    let api = &registries.documents["openapi.yaml"].schema;
    assert_eq!(api["components"]["schemas"]["Pet"]["$ref"], "Pet");
    assert_eq!(
        registries.root().unwrap().schema["Pet"]["properties"]["owner"]["$ref"],
        "external.openapi$2eyaml.components.schemas.Owner"
    );
}

#[tokio::test]
async fn flattening_twice_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(&dir, "openapi.yaml", ROOT);
    write(&dir, "pets.yaml", PETS);

    let mut registries = resolve_path(&root).await.unwrap();
    let before = registries.documents.clone();
    flatten_references(&mut registries.documents).unwrap();
    assert_eq!(before, registries.documents);
}

#[tokio::test]
async fn nested_directories_get_relative_ids() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        &dir,
        "api/openapi.yaml",
        r##"
components:
  schemas:
    Tag:
      $ref: "../shared/common.yaml#/Tag"
"##,
    );
    write(&dir, "shared/common.yaml", "Tag:\n  type: string\n");

    let registries = resolve_path(&root).await.unwrap();
    assert_eq!(keys(&registries), [".", "../shared/common.yaml"]);
    assert_eq!(
        registries.root().unwrap().schema["components"]["schemas"]["Tag"]["$ref"],
        "external.$2e$2e$2fshared$2fcommon$2eyaml.Tag"
    );
}

#[tokio::test]
async fn missing_and_directory_inputs_fail() {
    let dir = tempfile::tempdir().unwrap();
    let err = resolve_path(&dir.path().join("nope.yaml")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err}");

    let err = resolve_path(dir.path()).await.unwrap_err();
    assert!(matches!(err, Error::NotAFile { .. }), "{err}");

    let root = write(
        &dir,
        "openapi.yaml",
        "components:\n  schemas:\n    A:\n      $ref: \"gone.yaml#/A\"\n",
    );
    let err = resolve_path(&root).await.unwrap_err();
    assert!(
        matches!(err, Error::NotFound { ref location, .. } if location.ends_with("gone.yaml")),
        "{err}"
    );
}

#[tokio::test]
async fn parse_failure_names_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        &dir,
        "openapi.yaml",
        "components:\n  schemas:\n    A:\n      $ref: \"broken.json#/A\"\n",
    );
    write(&dir, "broken.json", "{ \"A\": ");

    let err = resolve_path(&root).await.unwrap_err();
    match err {
        Error::Parse { document, format, .. } => {
            assert_eq!(document, "broken.json");
            assert_eq!(format, "JSON");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn vendor_extension_references_are_stripped() {
    let schema = json!({
        "components": { "schemas": {
            "Pet": { "oneOf": [
                { "$ref": "#/components/x-internal/Legacy" },
                { "$ref": "#/components/schemas/Dog" }
            ] },
            "Dog": { "type": "object" },
            "Ext": { "$ref": "missing.yaml#/x-vendor/Thing", "description": "vendor" }
        } }
    });
    let registries = resolve_value(schema).await.unwrap();

    let schemas = &registries.root().unwrap().schema["components"]["schemas"];
    assert_eq!(schemas["Pet"]["oneOf"], json!([{ "$ref": "components.schemas.Dog" }]));
    assert!(schemas["Ext"].get("$ref").is_none());
    assert_eq!(schemas["Ext"]["description"], "vendor");
}

#[tokio::test]
async fn in_memory_root_cannot_follow_relative_references() {
    let schema = json!({
        "components": { "schemas": { "Pet": { "$ref": "pets.yaml#/Pet" } } }
    });
    let err = resolve_value(schema).await.unwrap_err();
    match &err {
        Error::UnresolvedReference { document, path, reference, .. } => {
            assert_eq!(document, ".");
            assert_eq!(path, "components.schemas.Pet");
            assert_eq!(reference, "pets.yaml#/Pet");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("from dynamic JSON"));
}

#[tokio::test]
async fn in_memory_root_follows_absolute_paths() {
    let dir = tempfile::tempdir().unwrap();
    let pets = write(&dir, "pets.yaml", "Pet:\n  type: string\n");
    let schema = json!({
        "components": { "schemas": {
            "Pet": { "$ref": format!("{}#/Pet", pets.display()) }
        } }
    });
    let registries = resolve_value(schema).await.unwrap();
    assert_eq!(registries.documents.len(), 2);
    let reference = registries.root().unwrap().schema["components"]["schemas"]["Pet"]["$ref"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(reference.starts_with("external."));
    assert!(reference.ends_with("pets$2eyaml.Pet"));
}

#[tokio::test]
async fn malformed_composition_member_is_rejected() {
    let schema = json!({
        "components": { "schemas": { "Pet": { "allOf": ["not-an-object"] } } }
    });
    let err = resolve_value(schema).await.unwrap_err();
    match err {
        Error::InvalidSchemaNode { path, .. } => assert_eq!(path, "components.schemas.Pet.allOf"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn streamed_payloads_are_sniffed() {
    let registries =
        resolve_bytes(b"  {\"components\": {\"schemas\": {\"Id\": {\"type\": \"string\"}}}}")
            .await
            .unwrap();
    let schemas = &registries.root().unwrap().schema["components"]["schemas"];
    assert_eq!(schemas["Id"]["type"], "string");

    let registries = resolve_bytes(b"components:\n  schemas:\n    Id: { type: integer }\n")
        .await
        .unwrap();
    let schemas = &registries.root().unwrap().schema["components"]["schemas"];
    assert_eq!(schemas["Id"]["type"], "integer");

    let err = resolve_bytes(b"- a\n- b\n").await.unwrap_err();
    assert!(
        matches!(err, Error::InvalidSchemaNode { ref path, .. } if path == "(root)"),
        "{err}"
    );
}

#[tokio::test]
async fn streamed_payload_that_is_not_utf8_is_a_parse_error() {
    let err = resolve_bytes(&[b'{', 0xff, b'}']).await.unwrap_err();
    match err {
        Error::Parse {
            document, format, ..
        } => {
            assert_eq!(document, ".");
            assert_eq!(format, "JSON");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn parameters_and_discriminators_are_collected() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        &dir,
        "openapi.yaml",
        r##"
paths:
  /pets:
    get:
      parameters:
        - name: page
          in: query
        - $ref: "params.yaml#/limit"
components:
  schemas:
    Pet:
      type: object
      discriminator:
        propertyName: petType
        mapping:
          dog: "#/components/schemas/Dog"
      properties:
        petType: { type: string }
    Dog:
      allOf:
        - $ref: "#/components/schemas/Pet"
"##,
    );
    write(&dir, "params.yaml", "limit:\n  name: limit\n  in: query\n");

    let registries = resolve_path(&root).await.unwrap();
    assert!(registries.parameters.contains_key("paths.$2fpets.get.parameters.$30"));
    assert!(registries.parameters.contains_key("external.params$2eyaml.limit"));
    assert_eq!(registries.parameters.len(), 2);

    let discriminator = &registries.discriminators["components.schemas.Pet"];
    assert_eq!(discriminator.property_name, "petType");
    assert_eq!(discriminator.tag_for("Dog"), "dog");
    assert_eq!(registries.discriminators.len(), 1);
}

const ROOT_JSON: &str = r#"{"components":{"schemas":{"Pet":{"$ref":"schemas/pet#/Pet"}}}}"#;

#[tokio::test]
async fn remote_documents_are_fetched_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/spec"))
        .and(header("authorization", "Bearer token"))
        .and(header("x-tenant", "acme"))
        .and(header("user-agent", "openapi-ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ROOT_JSON)
                .insert_header("content-type", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/schemas/pet"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Pet:\n  type: object\n"))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/api/spec", server.uri())).unwrap();
    let options = ResolveOptions::default()
        .with_auth("Bearer token")
        .with_header("X-Tenant", "acme");
    let registries = openapi_ts_core::resolve::resolve(SchemaSource::Url(url), options)
        .await
        .unwrap();

    assert_eq!(keys(&registries), [".", "schemas/pet"]);
    assert_eq!(registries.documents["schemas/pet"].schema["Pet"]["type"], "object");
    assert_eq!(
        registries.root().unwrap().schema["components"]["schemas"]["Pet"]["$ref"],
        "external.schemas$2fpet.Pet"
    );
}

#[tokio::test]
async fn remote_error_status_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/openapi.json", server.uri())).unwrap();
    let err = resolve_source(SchemaSource::Url(url)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref reason, .. } if reason.contains("404")), "{err}");
}

/// In-memory fetcher that counts requests per URL.
#[derive(Debug, Default)]
struct CountingFetch {
    documents: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
}

impl CountingFetch {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.to_string());
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl Fetch for CountingFetch {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> BoxFuture<'_, openapi_ts_core::Result<FetchResponse>> {
        async move {
            let url = request.url.to_string();
            *self.hits.lock().unwrap().entry(url.clone()).or_default() += 1;
            tokio::task::yield_now().await;
            Ok(match self.documents.get(&url) {
                Some(body) => FetchResponse {
                    status: 200,
                    content_type: None,
                    body: body.clone(),
                },
                None => FetchResponse {
                    status: 404,
                    content_type: None,
                    body: String::new(),
                },
            })
        }
        .boxed()
    }
}

#[tokio::test]
async fn diamond_graph_loads_shared_document_once() {
    let base = "https://schemas.test";
    let fetch = Arc::new(
        CountingFetch::default()
            .with(
                &format!("{base}/openapi.yaml"),
                concat!(
                    "components:\n  schemas:\n",
                    "    A: { $ref: 'a.yaml#/A' }\n",
                    "    B: { $ref: 'b.yaml#/B' }\n",
                ),
            )
            .with(&format!("{base}/a.yaml"), "A:\n  properties:\n    c: { $ref: 'c.yaml#/C' }\n")
            .with(&format!("{base}/b.yaml"), "B:\n  properties:\n    c: { $ref: 'c.yaml#/C' }\n")
            .with(&format!("{base}/c.yaml"), "C:\n  type: string\n"),
    );

    let resolver = Resolver::new(ResolveOptions::default().with_fetch(fetch.clone()));
    let url = Url::parse(&format!("{base}/openapi.yaml")).unwrap();
    resolver.resolve(SchemaSource::Url(url.clone())).await.unwrap();
    resolver.resolve(SchemaSource::Url(url)).await.unwrap();
    let registries = resolver.into_registries();

    assert_eq!(keys(&registries), [".", "a.yaml", "b.yaml", "c.yaml"]);
    for name in ["openapi.yaml", "a.yaml", "b.yaml", "c.yaml"] {
        assert_eq!(fetch.hits(&format!("{base}/{name}")), 1, "{name}");
    }
    assert_eq!(
        registries.documents["a.yaml"].schema["A"]["properties"]["c"]["$ref"],
        "external.c$2eyaml.C"
    );
}
