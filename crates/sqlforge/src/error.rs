//! Error types for sqlforge

use thiserror::Error;

/// Result type alias for query construction and emission
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types for query construction and SQL emission
#[derive(Debug, Error)]
pub enum QueryError {
    /// The expression map is in an internally inconsistent state
    /// (no main alias when one is required, options set that are
    /// meaningless for the active query type, and so on).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A join, predicate or order-by referenced an alias that was
    /// never registered on the map.
    #[error("\"{0}\" alias was not found. Maybe you forgot to join it?")]
    AliasNotFound(String),

    /// An object-form condition or assignment named a property the
    /// entity metadata does not know about.
    #[error("Property \"{property}\" was not found in entity \"{entity}\"")]
    EntityPropertyNotFound { property: String, entity: String },

    /// A raw fragment contained a named placeholder with no bound value.
    #[error("Value for parameter \"{0}\" was not provided")]
    MissingParameter(String),

    /// A requested feature has no translation in the active dialect.
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedByDialect {
        feature: String,
        dialect: &'static str,
    },
}

impl QueryError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an unknown-property error
    pub fn property_not_found(property: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::EntityPropertyNotFound {
            property: property.into(),
            entity: entity.into(),
        }
    }

    /// Create a dialect-capability error
    pub fn unsupported(feature: impl Into<String>, dialect: &'static str) -> Self {
        Self::UnsupportedByDialect {
            feature: feature.into(),
            dialect,
        }
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is an alias resolution error
    pub fn is_alias_not_found(&self) -> bool {
        matches!(self, Self::AliasNotFound(_))
    }

    /// Check if this is an unknown-property error
    pub fn is_property_not_found(&self) -> bool {
        matches!(self, Self::EntityPropertyNotFound { .. })
    }

    /// Check if this is a missing-parameter error
    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, Self::MissingParameter(_))
    }

    /// Check if this is a dialect-capability error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedByDialect { .. })
    }
}
