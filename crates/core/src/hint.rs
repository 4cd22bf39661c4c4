//! Schema-kind inference from structural paths.
//!
//! A raw pointer does not say whether its target is a schema, an operation or
//! a response. The kind is recovered from where the reference sits: the root
//! rule dispatches on `paths` / `components` and each object kind recognizes
//! its own child keys.

use std::fmt;

use serde::Deserialize;

use crate::walk::PathSegment;

/// What kind of OpenAPI object a document (or node) represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum SchemaKind {
    /// A complete API document.
    #[default]
    #[serde(rename = "OpenAPI3")]
    OpenApi3,
    /// An operation object.
    OperationObject,
    /// A single parameter object.
    ParameterObject,
    /// A list of parameter objects.
    #[serde(rename = "ParameterObject[]")]
    ParameterList,
    /// A request body object.
    RequestBodyObject,
    /// A response object.
    ResponseObject,
    /// A media type object.
    MediaTypeObject,
    /// A single schema.
    SchemaObject,
    /// A map of named schemas.
    SchemaMap,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenApi3 => "OpenAPI3",
            Self::OperationObject => "OperationObject",
            Self::ParameterObject => "ParameterObject",
            Self::ParameterList => "ParameterObject[]",
            Self::RequestBodyObject => "RequestBodyObject",
            Self::ResponseObject => "ResponseObject",
            Self::MediaTypeObject => "MediaTypeObject",
            Self::SchemaObject => "SchemaObject",
            Self::SchemaMap => "SchemaMap",
        })
    }
}

/// Infer the kind of the node at `path`.
///
/// With a non-root `start`, inference begins at that kind's own rule instead of
/// the root rule. Kinds without a rule of their own are returned as-is.
pub fn infer_kind(path: &[PathSegment], external: bool, start: Option<SchemaKind>) -> SchemaKind {
    match start {
        None | Some(SchemaKind::OpenApi3) => from_root(path, external),
        Some(SchemaKind::OperationObject) => from_operation(path, external),
        Some(SchemaKind::RequestBodyObject) => from_request_body(path, external),
        Some(SchemaKind::ResponseObject) => from_response(path, external),
        Some(kind) => kind,
    }
}

fn key(path: &[PathSegment], index: usize) -> Option<&str> {
    path.get(index).and_then(PathSegment::as_key)
}

fn skip(path: &[PathSegment], n: usize) -> &[PathSegment] {
    path.get(n..).unwrap_or(&[])
}

fn from_root(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("paths") => from_path_item(skip(path, 2), external),
        Some("components") => from_components(skip(path, 1), external),
        _ => SchemaKind::SchemaObject,
    }
}

fn from_components(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("schemas" | "headers") => from_schema(skip(path, 2), external),
        Some("parameters") => from_parameter(skip(path, 2), external),
        Some("responses") => from_response(skip(path, 2), external),
        Some("requestBodies") => from_request_body(skip(path, 2), external),
        Some("pathItems") => from_path_item(skip(path, 2), external),
        _ => SchemaKind::SchemaObject,
    }
}

fn from_path_item(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("parameters") => {
            if matches!(path.get(1), Some(PathSegment::Index(_))) {
                SchemaKind::ParameterList
            } else {
                from_parameter(skip(path, 1), external)
            }
        }
        _ => from_operation(skip(path, 1), external),
    }
}

fn from_operation(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("parameters") => SchemaKind::ParameterList,
        Some("requestBody") => from_request_body(skip(path, 1), external),
        Some("responses") => from_response(skip(path, 2), external),
        _ => SchemaKind::OperationObject,
    }
}

fn from_parameter(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("content") => from_media_type(skip(path, 2), external),
        Some("schema") => from_schema(skip(path, 1), external),
        _ => SchemaKind::ParameterObject,
    }
}

fn from_request_body(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("content") => from_media_type(skip(path, 2), external),
        _ => SchemaKind::RequestBodyObject,
    }
}

fn from_response(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("headers") => from_schema(skip(path, 2), external),
        Some("content") => from_media_type(skip(path, 2), external),
        _ => SchemaKind::ResponseObject,
    }
}

fn from_media_type(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("schema") => from_schema(skip(path, 1), external),
        _ => SchemaKind::MediaTypeObject,
    }
}

fn from_schema(path: &[PathSegment], external: bool) -> SchemaKind {
    match key(path, 0) {
        Some("allOf" | "anyOf" | "oneOf") => from_schema(skip(path, 2), external),
        _ if path.len() == 2 && external => SchemaKind::SchemaMap,
        _ => SchemaKind::SchemaObject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(path: &[&str]) -> Vec<PathSegment> {
        path.iter().map(|segment| PathSegment::from(*segment)).collect()
    }

    #[test]
    fn test_components_schema_map_vs_schema() {
        let path = keys(&["components", "schemas", "Pet", "pets.yaml", "Pet"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::SchemaMap);

        let path = keys(&["components", "schemas", "Pet", "pet.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::SchemaObject);

        let path = keys(&["components", "schemas", "Pet", "pets.yaml", "Pet"]);
        assert_eq!(infer_kind(&path, false, None), SchemaKind::SchemaObject);
    }

    #[test]
    fn test_paths_dispatch() {
        let path = keys(&["paths", "/pets", "get", "responses", "200", "r.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::ResponseObject);

        let path = keys(&[
            "paths",
            "/pets",
            "post",
            "requestBody",
            "content",
            "application/json",
            "schema",
            "pet.yaml",
        ]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::SchemaObject);

        let path = keys(&["paths", "/pets", "get", "parameters", "p.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::ParameterList);

        let path = keys(&["paths", "/pets", "get", "op.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::OperationObject);
    }

    #[test]
    fn test_path_item_parameter_index() {
        let mut path = keys(&["paths", "/pets", "parameters"]);
        path.push(PathSegment::Index(0));
        path.push(PathSegment::from("p.yaml"));
        assert_eq!(infer_kind(&path, true, None), SchemaKind::ParameterList);
    }

    #[test]
    fn test_components_sub_maps() {
        let path = keys(&["components", "parameters", "limit", "schema", "l.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::SchemaObject);

        let path = keys(&["components", "requestBodies", "Body", "b.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::RequestBodyObject);

        let path = keys(&["components", "parameters", "limit", "l.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::ParameterObject);
    }

    #[test]
    fn test_starting_kind_overrides_root_rule() {
        let path = keys(&["content", "application/json", "schema", "s.yaml", "Pet"]);
        assert_eq!(
            infer_kind(&path, true, Some(SchemaKind::ResponseObject)),
            SchemaKind::SchemaMap
        );
        assert_eq!(infer_kind(&path, true, None), SchemaKind::SchemaObject);

        let path = keys(&["anything", "x.yaml"]);
        assert_eq!(
            infer_kind(&path, true, Some(SchemaKind::ParameterObject)),
            SchemaKind::ParameterObject
        );
    }

    #[test]
    fn test_unknown_root_falls_back_to_schema() {
        let path = keys(&["info", "x.yaml"]);
        assert_eq!(infer_kind(&path, true, None), SchemaKind::SchemaObject);
    }
}
