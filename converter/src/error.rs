//! Error types for the table conversion pipeline.
//!
//! - [`FieldError`] - Dotted-path addressing errors
//! - [`ConfigError`] - Action DSL and structured configuration errors
//! - [`ActionError`] - Fatal errors raised while running actions on a row
//! - [`ConvertError`] - Top-level run errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde_json::Value;
use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Field Addressing Errors
// =============================================================================

/// Errors while reading or writing a dotted path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    /// A key is used both as a leaf and as a parent of other keys.
    #[error("Path conflict at '{path}': a value and a subtree share the same key")]
    PathConflict { path: String },

    /// A path segment cannot index into a sequence.
    #[error("Invalid sequence index '{segment}' in path '{path}'")]
    InvalidIndex { path: String, segment: String },

    /// The path is empty or has an empty segment.
    #[error("Invalid field path: '{0}'")]
    InvalidPath(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building actions from the DSL or a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed action string.
    #[error("Invalid action '{action}': {message}")]
    InvalidAction { action: String, message: String },

    /// Unknown action name.
    #[error("Unsupported action: {0}")]
    UnknownAction(String),

    /// Unknown or unimplemented filter operator.
    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    /// Filter expression without a recognized comparator.
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Unknown value type for `assign-constant` or `parse`.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A constant could not be converted to its declared type.
    #[error("Cannot convert '{value}' to {ty}")]
    InvalidConstant { value: String, ty: String },

    /// A required configuration entry is missing.
    #[error("{key} is required for {section}")]
    MissingField { key: String, section: String },

    /// A configuration entry has the wrong shape.
    #[error("Unsupported value type in {section}: {found}, should be {expected}")]
    InvalidValue {
        section: String,
        expected: String,
        found: String,
    },

    /// Unknown section or key in a configuration document.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// `not-in` filters must compare against a list.
    #[error("Filter '{field}' uses not-in with a non-list value")]
    NotInRequiresList { field: String },

    /// Invalid regular expression in a `=~` filter.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid format template.
    #[error("Invalid format template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    /// Malformed dotted path in the `map` section.
    #[error("Invalid configuration path: {0}")]
    Field(#[from] FieldError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to read the configuration file.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Action Errors
// =============================================================================

/// Fatal errors raised while applying actions to a row.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required source is missing or empty.
    #[error("Required field not found or empty, field: {field}, found: {found}, value: {value}")]
    RequiredField {
        field: String,
        found: bool,
        value: Value,
    },

    /// A string could not be parsed as a literal or as JSON.
    #[error("Failed to parse {kind}: {raw}")]
    Parse { kind: &'static str, raw: String },

    /// Template could not be parsed.
    #[error("Invalid format template '{template}': {message}")]
    Template { template: String, message: String },

    /// Writing into the row failed.
    #[error("Field error: {0}")]
    Field(#[from] FieldError),
}

// =============================================================================
// Run Errors (top-level)
// =============================================================================

/// Top-level conversion errors.
///
/// This is the error type returned by [`crate::convert::Converter`] and the
/// file helpers. It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// CSV reading or writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Action error on a given input record (1-based).
    #[error("Action error on record {record}: {source}")]
    Action {
        record: usize,
        #[source]
        source: ActionError,
    },

    /// Input row could not be turned into a row tree.
    #[error("Field error: {0}")]
    Field(#[from] FieldError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration building.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for action execution.
pub type ActionResult<T> = Result<T, ActionError>;

/// Result type for a conversion run.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // FieldError -> ConfigError
        let field_err = FieldError::InvalidPath("a..b".into());
        let config_err: ConfigError = field_err.into();
        assert!(config_err.to_string().contains("a..b"));

        // ConfigError -> ConvertError
        let convert_err: ConvertError = ConfigError::UnknownAction("explode".into()).into();
        assert!(convert_err.to_string().contains("explode"));
    }

    #[test]
    fn test_action_error_format() {
        let err = ConvertError::Action {
            record: 3,
            source: ActionError::Parse {
                kind: "JSON",
                raw: "{oops".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("record 3"));
        assert!(msg.contains("{oops"));
    }

    #[test]
    fn test_required_field_format() {
        let err = ActionError::RequiredField {
            field: "title".into(),
            found: false,
            value: Value::Null,
        };
        let msg = err.to_string();
        assert!(msg.contains("title"));
        assert!(msg.contains("found: false"));
    }
}
