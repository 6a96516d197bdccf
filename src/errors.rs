/// Domain-specific error types for tagscope
///
/// One taxonomy for every surface (MCP tools, CLI, library callers):
/// bad input, missing records, and unavailable dependencies are kept apart so
/// callers can tell "your request was wrong" from "a backend is down".

#[derive(Debug, thiserror::Error)]
pub enum TagscopeError {
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        field: Option<String>,
    },

    #[error("Bookmark not found: {link}")]
    NotFound {
        link: String,
    },

    #[error("{dependency} unavailable: {message}")]
    DependencyUnavailable {
        dependency: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for TagscopeError {
    fn from(e: sqlx::Error) -> Self {
        TagscopeError::store(e.to_string())
    }
}

impl From<crate::embedding::EmbeddingError> for TagscopeError {
    fn from(e: crate::embedding::EmbeddingError) -> Self {
        match e {
            crate::embedding::EmbeddingError::NotConfigured(msg) => TagscopeError::Config(msg),
            other => TagscopeError::DependencyUnavailable {
                dependency: "embedding",
                message: other.to_string(),
            },
        }
    }
}

impl TagscopeError {
    /// Helper to create argument errors with field names
    ///
    /// Example:
    /// ```
    /// use tagscope::errors::TagscopeError;
    /// let err = TagscopeError::invalid("query", "Query cannot be empty");
    /// assert!(err.to_string().contains("Query cannot be empty"));
    /// ```
    pub fn invalid(field: &str, message: &str) -> Self {
        TagscopeError::InvalidArgument {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }

    /// Store (PostgreSQL) failure.
    pub fn store(message: impl Into<String>) -> Self {
        TagscopeError::DependencyUnavailable {
            dependency: "store",
            message: message.into(),
        }
    }

    /// Generative model failure (enrichment, reranking, self-test).
    pub fn model(message: impl Into<String>) -> Self {
        TagscopeError::DependencyUnavailable {
            dependency: "model",
            message: message.into(),
        }
    }

    pub fn is_dependency_unavailable(&self) -> bool {
        matches!(self, TagscopeError::DependencyUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_carries_field() {
        match TagscopeError::invalid("top_n", "must be at least 1") {
            TagscopeError::InvalidArgument { field, message } => {
                assert_eq!(field.as_deref(), Some("top_n"));
                assert_eq!(message, "must be at least 1");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_dependency_display_names_the_dependency() {
        let err = TagscopeError::store("connection refused");
        assert!(err.is_dependency_unavailable());
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }
}
