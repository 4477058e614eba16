//! Action configuration records.
//!
//! Every action is an immutable record of its parameters. The pipeline
//! dispatches on [`ActionConfig`] with a single exhaustive match.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

/// All available row actions
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Copy a (possibly `||`/`??` chained) source into staging
    Assign(AssignConfig),

    /// Write a fixed value into staging
    AssignConstant(AssignConstantConfig),

    /// Render a `{name}` template into staging
    AssignFormat(AssignFormatConfig),

    /// Write the run-scoped sequential id of the primary values
    AssignId(AssignIdConfig),

    /// Write the length of a list, string or map
    AssignLength(AssignLengthConfig),

    /// Collect several fields into a list
    AssignArray(AssignArrayConfig),

    /// Append a value to a staged list
    Push(PushConfig),

    /// Keep or drop the row
    Filter(FilterConfig),

    /// Join a list into a string
    Join(JoinConfig),

    /// Move a field out of the public schema
    Omit(OmitConfig),

    /// Parse a string as a literal or as JSON
    Parse(ParseConfig),

    /// Split a string into a trimmed list
    Split(SplitConfig),
}

impl ActionConfig {
    /// Short action name, as written in the DSL.
    pub fn name(&self) -> &'static str {
        match self {
            ActionConfig::Assign(_) => "assign",
            ActionConfig::AssignConstant(_) => "assign-constant",
            ActionConfig::AssignFormat(_) => "assign-format",
            ActionConfig::AssignId(_) => "assign-id",
            ActionConfig::AssignLength(_) => "assign-length",
            ActionConfig::AssignArray(_) => "assign-array",
            ActionConfig::Push(_) => "push",
            ActionConfig::Filter(_) => "filter",
            ActionConfig::Join(_) => "join",
            ActionConfig::Omit(_) => "omit",
            ActionConfig::Parse(_) => "parse",
            ActionConfig::Split(_) => "split",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignConfig {
    pub target: String,
    pub source: String,
    pub assign_default: bool,
    pub default_value: Value,
    pub required: bool,
}

impl AssignConfig {
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            assign_default: false,
            default_value: Value::Null,
            required: false,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.assign_default = true;
        self.default_value = value;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignConstantConfig {
    pub target: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignFormatConfig {
    pub target: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignIdConfig {
    pub target: String,
    pub primary: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignLengthConfig {
    pub target: String,
    pub source: String,
}

/// One element of an [`AssignArrayConfig`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayItem {
    pub field: String,
    /// Missing optional items are skipped; missing required ones are fatal.
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignArrayConfig {
    pub target: String,
    pub items: Vec<ArrayItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushConfig {
    pub target: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Filter comparators.
///
/// Ordering comparators (`>`, `<`, ...) are not supported and are rejected when a
/// configuration is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "=~")]
    Matches,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "not-empty")]
    NotEmpty,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::Matches => "=~",
            FilterOperator::NotIn => "not-in",
            FilterOperator::Empty => "empty",
            FilterOperator::NotEmpty => "not-empty",
        }
    }

    /// Whether the operator compares against a configured value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterOperator::Empty | FilterOperator::NotEmpty)
    }
}

impl FromStr for FilterOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" => Ok(FilterOperator::Equal),
            "!=" => Ok(FilterOperator::NotEqual),
            "=~" => Ok(FilterOperator::Matches),
            "not-in" => Ok(FilterOperator::NotIn),
            "empty" => Ok(FilterOperator::Empty),
            "not-empty" => Ok(FilterOperator::NotEmpty),
            other => Err(ConfigError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    pub fn empty() -> Self {
        FilterValue::Text(String::new())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterConfig {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
    #[serde(skip)]
    pattern: Option<Regex>,
}

impl FilterConfig {
    /// Build a filter, compiling `=~` patterns and checking that `not-in`
    /// compares against a list.
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> ConfigResult<Self> {
        let field = field.into();
        let pattern = match (operator, &value) {
            (FilterOperator::Matches, FilterValue::Text(pattern)) => Some(Regex::new(pattern)?),
            (FilterOperator::Matches, FilterValue::List(_)) => {
                return Err(ConfigError::InvalidValue {
                    section: format!("filter on '{field}'"),
                    expected: "a pattern string".to_string(),
                    found: "list".to_string(),
                });
            }
            (FilterOperator::NotIn, FilterValue::Text(_)) => {
                return Err(ConfigError::NotInRequiresList { field });
            }
            _ => None,
        };
        Ok(Self {
            field,
            operator,
            value,
            pattern,
        })
    }

    /// Compiled pattern of a `=~` filter.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinConfig {
    pub target: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OmitConfig {
    pub field: String,
}

/// How `parse` reads a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseAs {
    Literal,
    Json,
}

impl FromStr for ParseAs {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "literal" => Ok(ParseAs::Literal),
            "json" => Ok(ParseAs::Json),
            other => Err(ConfigError::UnsupportedType(format!("as type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseConfig {
    pub target: String,
    pub source: String,
    pub as_type: ParseAs,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitConfig {
    pub target: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

/// Output column `target` taken from field `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickConfig {
    pub target: String,
    pub source: String,
}

impl PickConfig {
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("==".parse::<FilterOperator>().unwrap(), FilterOperator::Equal);
        assert_eq!("not-in".parse::<FilterOperator>().unwrap(), FilterOperator::NotIn);
        assert!(matches!(
            ">=".parse::<FilterOperator>(),
            Err(ConfigError::UnsupportedOperator(op)) if op == ">="
        ));
    }

    #[test]
    fn test_not_in_requires_list() {
        let err = FilterConfig::new("kind", FilterOperator::NotIn, FilterValue::Text("a".into()));
        assert!(matches!(err, Err(ConfigError::NotInRequiresList { .. })));

        let ok = FilterConfig::new(
            "kind",
            FilterOperator::NotIn,
            FilterValue::List(vec!["a".into(), "b".into()]),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_pattern_compiled_once() {
        let filter =
            FilterConfig::new("code", FilterOperator::Matches, FilterValue::Text("^T\\d+$".into())).unwrap();
        assert!(filter.pattern().unwrap().is_match("T123"));

        let err = FilterConfig::new("code", FilterOperator::Matches, FilterValue::Text("(".into()));
        assert!(matches!(err, Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_serialize_tagged() {
        let action = ActionConfig::Omit(OmitConfig { field: "x".into() });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json, serde_json::json!({"type": "omit", "field": "x"}));
        assert_eq!(action.name(), "omit");
    }
}
