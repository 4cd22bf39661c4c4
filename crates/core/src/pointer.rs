//! Reference pointers and canonical index strings.
//!
//! A reference string has the shape `document#/a/b/c`. An empty document part
//! targets the document containing the reference. After resolution every
//! reference is rewritten into a canonical index string: `a.b.c` for the root
//! document and `external.<document-id>.a.b.c` for any other document.

use std::collections::HashSet;
use std::fmt::{Display, Write};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// DocumentID of the entry document of a run.
pub const ROOT_DOCUMENT: &str = ".";

/// First index segment of references into non-root documents.
pub const EXTERNAL_MARKER: &str = "external";

/// Reserved prefix of vendor-extension keys.
pub const EXTENSION_PREFIX: &str = "x-";

/// TypeScript reserved words that cannot be used as identifiers.
static TS_RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "break",
        "case",
        "catch",
        "class",
        "const",
        "continue",
        "debugger",
        "default",
        "delete",
        "do",
        "else",
        "enum",
        "export",
        "extends",
        "false",
        "finally",
        "for",
        "function",
        "if",
        "import",
        "in",
        "instanceof",
        "new",
        "null",
        "return",
        "super",
        "switch",
        "this",
        "throw",
        "true",
        "try",
        "typeof",
        "var",
        "void",
        "while",
        "with",
        "yield",
        "let",
        "static",
        "implements",
        "interface",
        "package",
        "private",
        "protected",
        "public",
        "await",
        "async",
    ]
    .into_iter()
    .collect()
});

/// A parsed reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    /// Document part before `#`; empty means "this document".
    pub document: String,
    /// Unescaped JSON-pointer segments after `#`.
    pub path: Vec<String>,
}

impl Pointer {
    /// Parse a reference string, unescaping `~0` and `~1`.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Err(malformed(reference, "empty reference"));
        }

        let Some((document, fragment)) = reference.split_once('#') else {
            return Ok(Self {
                document: reference.to_string(),
                path: Vec::new(),
            });
        };

        let mut path = Vec::new();
        if !fragment.is_empty() {
            let Some(rest) = fragment.strip_prefix('/') else {
                return Err(malformed(reference, "fragment must start with '/'"));
            };
            for part in rest.split('/').filter(|part| !part.is_empty()) {
                let segment = unescape(part)
                    .ok_or_else(|| malformed(reference, format!("invalid escape in \"{part}\"")))?;
                path.push(segment);
            }
        }

        Ok(Self {
            document: document.to_string(),
            path,
        })
    }

    /// True when the reference targets the document that contains it.
    pub fn is_local(&self) -> bool {
        self.document.is_empty()
    }

    /// True when any path segment is a vendor-extension key.
    pub fn has_extension_segment(&self) -> bool {
        self.path.iter().any(|segment| segment.starts_with(EXTENSION_PREFIX))
    }

    /// Final path segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }

    /// Render back to `document#/a/b` form. Always includes the `#`.
    pub fn to_reference_string(&self) -> String {
        let mut out = format!("{}#", self.document);
        for segment in &self.path {
            out.push('/');
            out.push_str(&escape(segment));
        }
        out
    }
}

fn malformed(reference: &str, reason: impl Into<String>) -> Error {
    Error::MalformedReference {
        reference: reference.to_string(),
        reason: reason.into(),
    }
}

fn unescape(part: &str) -> Option<String> {
    let mut out = String::with_capacity(part.len());
    let mut chars = part.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// True when a `$ref` value has already been flattened into a canonical index.
///
/// Unflattened references always carry a `#` once the cross-document pass has
/// rewritten their document part, and canonical indexes never do.
pub fn is_canonical_index(reference: &str) -> bool {
    !reference.contains('#')
}

/// Encode one structural path component for identifier embedding.
///
/// ASCII letters, digits and `_` pass through; every other byte becomes `$xx`.
/// A leading digit, and the first byte of a TypeScript reserved word, are also
/// encoded so the result is always a valid identifier. The encoding is
/// injective, so distinct segments never collide.
pub fn sanitize_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "$".to_string();
    }

    let reserved = TS_RESERVED_WORDS.contains(segment);
    let mut out = String::with_capacity(segment.len());
    for (i, byte) in segment.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric() || byte == b'_';
        let leading = i == 0 && (byte.is_ascii_digit() || reserved);
        if plain && !leading {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "${byte:02x}");
        }
    }
    out
}

/// Join sanitized segments with `.`.
pub fn canonical_index<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Display,
{
    segments
        .into_iter()
        .map(|segment| sanitize_segment(&segment.to_string()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Canonical index of `path` inside the document `document_id`.
pub fn document_index<I, S>(document_id: &str, path: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Display,
{
    let path: Vec<String> = path.into_iter().map(|segment| segment.to_string()).collect();
    if document_id == ROOT_DOCUMENT {
        canonical_index(path)
    } else {
        canonical_index(
            [EXTERNAL_MARKER.to_string(), document_id.to_string()]
                .into_iter()
                .chain(path),
        )
    }
}
