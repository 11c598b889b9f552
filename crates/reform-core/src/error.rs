use thiserror::Error;

/// A tagged schema description could not be turned into a [`Schema`](crate::Schema).
///
/// This is the only hard failure in the crate: building from an already typed
/// `Schema` never fails, and lookups or validation problems are reported as
/// data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown schema variant `{tag}` (expected Field, Group or Array)")]
    UnknownVariant { tag: String },
    #[error("schema object has no `type` tag")]
    MissingVariantTag,
    #[error("{variant} schema is missing `{field}`")]
    MissingField {
        variant: &'static str,
        field: &'static str,
    },
    #[error("{variant} schema field `{field}` must be {expected}")]
    InvalidField {
        variant: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    #[error("no validator named `{name}` is registered")]
    UnknownValidator { name: String },
    #[error("at `{path}`: {source}")]
    At {
        path: String,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    /// Prefix the error location with `segment`.
    pub(crate) fn within(self, segment: &str) -> Self {
        match self {
            SchemaError::At { path, source } => SchemaError::At {
                path: format!("{segment}.{path}"),
                source,
            },
            other => SchemaError::At {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The error with any location wrapping removed.
    pub fn root_cause(&self) -> &SchemaError {
        match self {
            SchemaError::At { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected a {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
