//! Error types for schema resolution and type generation.
//!
//! Every failure is fatal for the current run. Each variant carries the
//! document identity and/or structural path at the point of failure so the
//! schema defect can be located.

use thiserror::Error;

/// Result type for resolution and generation.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions raised while loading, resolving or parsing schema documents.
#[derive(Debug, Error)]
pub enum Error {
    /// A document body is not valid JSON or YAML.
    #[error("{document}: failed to parse {format}: {message}")]
    Parse {
        /// Identity of the offending document.
        document: String,
        /// `JSON` or `YAML`.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// A local file is missing or a remote document is unreachable.
    #[error("could not locate {location}: {reason}")]
    NotFound {
        /// Path or URL that was requested.
        location: String,
        /// Underlying I/O or HTTP failure.
        reason: String,
    },

    /// A local path resolves to a directory.
    #[error("{location} is a directory not a file")]
    NotAFile {
        /// The directory path.
        location: String,
    },

    /// A reference target cannot be located.
    #[error("{document} {path}: can't resolve \"{reference}\"{detail}")]
    UnresolvedReference {
        /// Document containing the reference.
        document: String,
        /// Structural path of the referencing node.
        path: String,
        /// The raw reference string.
        reference: String,
        /// Extra context appended to the message, possibly empty.
        detail: String,
    },

    /// A node where a schema container was expected is not a plain object.
    #[error("{document} {path}: {message}. Is your schema valid?")]
    InvalidSchemaNode {
        /// Document containing the node.
        document: String,
        /// Structural path of the node.
        path: String,
        /// What was expected and what was found.
        message: String,
    },

    /// A reference string does not follow pointer syntax.
    #[error("malformed reference \"{reference}\": {reason}")]
    MalformedReference {
        /// The raw reference string.
        reference: String,
        /// Why parsing failed.
        reason: String,
    },
}

impl Error {
    pub(crate) fn not_found(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::NotFound {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_node(
        document: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidSchemaNode {
            document: document.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_location() {
        let err =
            Error::invalid_node("pets.yaml", "components.schemas.Pet.oneOf", "expected object");
        assert_eq!(
            err.to_string(),
            "pets.yaml components.schemas.Pet.oneOf: expected object. Is your schema valid?"
        );

        let err = Error::UnresolvedReference {
            document: ".".to_string(),
            path: "paths./pets".to_string(),
            reference: "pets.yaml".to_string(),
            detail: String::new(),
        };
        assert_eq!(err.to_string(), ". paths./pets: can't resolve \"pets.yaml\"");

        let err = Error::not_found("/tmp/missing.yaml", "No such file or directory");
        assert!(err.to_string().contains("/tmp/missing.yaml"));
    }
}
