//! Conversion configuration.
//!
//! A configuration is an ordered list of actions plus the output pick list.
//! It is built from action strings, from a JSON or YAML document, or both:
//!
//! ```json
//! {
//!   "actions": ["assign:title=Titre:required"],
//!   "process": {
//!     "assign_constants": {"source": "catalog"},
//!     "assign_ids": {"work_id": {"primary": "title", "context": "source"}},
//!     "split": {"tags": {"field": "Tags", "delimiter": ";"}}
//!   },
//!   "map": {"work": {"id": "work_id", "title": "title"}}
//! }
//! ```
//!
//! The same document in YAML (`.yaml`/`.yml` files):
//!
//! ```yaml
//! actions:
//!   - "assign:title=Titre:required"
//! process:
//!   assign_constants:
//!     source: catalog
//! map:
//!   work:
//!     title: title
//! ```
//!
//! `actions` run first, then the `process` sections in document order.
//! `map` is flattened into `target -> source` picks.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::actions::dsl::{parse_actions, validate_template};
use crate::actions::types::{
    ActionConfig, ArrayItem, AssignArrayConfig, AssignConstantConfig, AssignFormatConfig, AssignIdConfig,
    AssignLengthConfig, FilterConfig, FilterOperator, FilterValue, OmitConfig, PickConfig, PushConfig, SplitConfig,
};
use crate::actions::DEFAULT_ACTION_DELIMITER;
use crate::error::{ConfigError, ConfigResult};
use crate::row::{join_path, validate_path, value_text};

/// Ordered actions and output picks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub actions: Vec<ActionConfig>,
    /// Output columns; empty means every input column.
    pub picks: Vec<PickConfig>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_value(&document)
    }

    /// Parse a YAML configuration document. Mapping order is kept.
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let document: Value = serde_yaml::from_str(text)?;
        Self::from_value(&document)
    }

    /// Build a configuration from a parsed document.
    pub fn from_value(document: &Value) -> ConfigResult<Self> {
        let root = expect_object(document, "configuration")?;
        let mut config = Self::new();

        for (key, value) in root {
            match key.as_str() {
                "actions" => {
                    let actions = string_list(value, "actions")?;
                    config.add_actions(actions.as_slice(), DEFAULT_ACTION_DELIMITER)?;
                }
                "process" => config.add_process(value)?,
                "map" => config.picks = parse_map(value)?,
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }
        Ok(config)
    }

    /// Append actions written in the action DSL.
    pub fn add_actions<S: AsRef<str>>(&mut self, actions: &[S], delimiter: char) -> ConfigResult<()> {
        self.actions.extend(parse_actions(actions, delimiter)?);
        Ok(())
    }

    /// Append the actions of a `process` section.
    pub fn add_process(&mut self, process: &Value) -> ConfigResult<()> {
        for (key, section) in expect_object(process, "process")? {
            let before = self.actions.len();
            match key.as_str() {
                "assign_constants" => self.add_assign_constants(section)?,
                "assign_formats" => self.add_assign_formats(section)?,
                "assign_ids" => self.add_assign_ids(section)?,
                "assign_length" => self.add_assign_length(section)?,
                "assign_array" => self.add_assign_array(section)?,
                "filter" => self.add_filters(section)?,
                "omit_fields" => {
                    for field in string_list(section, "omit_fields")? {
                        self.actions.push(ActionConfig::Omit(OmitConfig { field }));
                    }
                }
                "push" => self.add_push(section)?,
                "split" => self.add_split(section)?,
                other => return Err(ConfigError::UnknownKey(format!("process.{other}"))),
            }
            debug!(section = %key, count = self.actions.len() - before, "loaded process section");
        }
        Ok(())
    }

    fn add_assign_constants(&mut self, section: &Value) -> ConfigResult<()> {
        expect_object(section, "assign_constants")?;
        for (target, value) in flatten_section(section) {
            self.actions
                .push(ActionConfig::AssignConstant(AssignConstantConfig { target, value }));
        }
        Ok(())
    }

    fn add_assign_formats(&mut self, section: &Value) -> ConfigResult<()> {
        expect_object(section, "assign_formats")?;
        for (target, format) in flatten_section(section) {
            let format = expect_str(&format, "assign_formats")?.to_string();
            validate_template(&format)?;
            self.actions
                .push(ActionConfig::AssignFormat(AssignFormatConfig { target, format }));
        }
        Ok(())
    }

    fn add_assign_ids(&mut self, section: &Value) -> ConfigResult<()> {
        const SECTION: &str = "assign_ids";
        for (target, value) in expect_object(section, SECTION)? {
            let (primary, context) = match value {
                Value::Object(entry) => {
                    let primary = string_list(require(entry, "primary", SECTION)?, SECTION)?;
                    let context = match entry.get("context") {
                        None | Some(Value::Null) => None,
                        Some(context) => Some(string_list(context, SECTION)?),
                    };
                    (primary, context)
                }
                Value::Array(_) | Value::String(_) => (string_list(value, SECTION)?, None),
                other => return Err(invalid_value(SECTION, "object, list or string", other)),
            };
            self.actions.push(ActionConfig::AssignId(AssignIdConfig {
                target: target.clone(),
                primary,
                context,
            }));
        }
        Ok(())
    }

    fn add_assign_length(&mut self, section: &Value) -> ConfigResult<()> {
        expect_object(section, "assign_length")?;
        for (target, source) in flatten_section(section) {
            let source = expect_str(&source, "assign_length")?.to_string();
            self.actions
                .push(ActionConfig::AssignLength(AssignLengthConfig { target, source }));
        }
        Ok(())
    }

    fn add_assign_array(&mut self, section: &Value) -> ConfigResult<()> {
        const SECTION: &str = "assign_array";
        for (target, items) in expect_object(section, SECTION)? {
            let Value::Array(items) = items else {
                return Err(invalid_value(SECTION, "list", items));
            };
            let items = items
                .iter()
                .map(|item| match item {
                    Value::Object(entry) => Ok(ArrayItem {
                        field: expect_str(require(entry, "field", SECTION)?, SECTION)?.to_string(),
                        optional: match entry.get("optional") {
                            None => false,
                            Some(Value::Bool(optional)) => *optional,
                            Some(other) => return Err(invalid_value(SECTION, "bool", other)),
                        },
                    }),
                    Value::String(field) => Ok(ArrayItem {
                        field: field.clone(),
                        optional: true,
                    }),
                    other => Err(invalid_value(SECTION, "object or string", other)),
                })
                .collect::<ConfigResult<Vec<_>>>()?;
            self.actions.push(ActionConfig::AssignArray(AssignArrayConfig {
                target: target.clone(),
                items,
            }));
        }
        Ok(())
    }

    fn add_filters(&mut self, section: &Value) -> ConfigResult<()> {
        const SECTION: &str = "filter";
        for item in expect_array(section, SECTION)? {
            let entry = expect_object(item, SECTION)?;
            let field = expect_str(require(entry, "field", SECTION)?, SECTION)?;
            let operator: FilterOperator = expect_str(require(entry, "operator", SECTION)?, SECTION)?.parse()?;
            let value = if operator.takes_value() {
                match require(entry, "value", SECTION)? {
                    Value::Array(items) => FilterValue::List(items.iter().map(value_text).collect()),
                    Value::Object(_) => {
                        return Err(ConfigError::InvalidValue {
                            section: SECTION.to_string(),
                            expected: "string or list".to_string(),
                            found: "object".to_string(),
                        });
                    }
                    scalar => FilterValue::Text(value_text(scalar)),
                }
            } else {
                FilterValue::empty()
            };
            self.actions
                .push(ActionConfig::Filter(FilterConfig::new(field, operator, value)?));
        }
        Ok(())
    }

    fn add_push(&mut self, section: &Value) -> ConfigResult<()> {
        const SECTION: &str = "push";
        for item in expect_array(section, SECTION)? {
            let entry = expect_object(item, SECTION)?;
            let condition = match entry.get("condition") {
                None | Some(Value::Null) => None,
                Some(condition) => Some(expect_str(condition, SECTION)?.to_string()),
            };
            self.actions.push(ActionConfig::Push(PushConfig {
                target: expect_str(require(entry, "target", SECTION)?, SECTION)?.to_string(),
                source: expect_str(require(entry, "source", SECTION)?, SECTION)?.to_string(),
                condition,
            }));
        }
        Ok(())
    }

    fn add_split(&mut self, section: &Value) -> ConfigResult<()> {
        const SECTION: &str = "split";
        for (target, value) in expect_object(section, SECTION)? {
            let entry = expect_object(value, SECTION)?;
            self.actions.push(ActionConfig::Split(SplitConfig {
                target: target.clone(),
                source: expect_str(require(entry, "field", SECTION)?, SECTION)?.to_string(),
                delimiter: Some(expect_str(require(entry, "delimiter", SECTION)?, SECTION)?.to_string()),
            }));
        }
        Ok(())
    }

    /// Pretty JSON rendering, for `show-config`.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Load a configuration file: YAML for `.yaml`/`.yml`, JSON otherwise.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let config = if is_yaml {
        Config::from_yaml(&text)?
    } else {
        Config::from_json(&text)?
    };
    info!(
        path = %path.display(),
        actions = config.actions.len(),
        picks = config.picks.len(),
        "loaded configuration"
    );
    Ok(config)
}

fn parse_map(map: &Value) -> ConfigResult<Vec<PickConfig>> {
    expect_object(map, "map")?;
    flatten_section(map)
        .into_iter()
        .map(|(target, source)| {
            let source = expect_str(&source, "map")?.to_string();
            validate_path(&target)?;
            Ok(PickConfig { target, source })
        })
        .collect()
}

/// Nested objects flattened to dotted keys. Lists stay whole.
fn flatten_section(section: &Value) -> Map<String, Value> {
    fn walk(value: &Value, prefix: &str, out: &mut Map<String, Value>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    walk(child, &join_path(prefix, key), out);
                }
            }
            leaf => {
                out.insert(prefix.to_string(), leaf.clone());
            }
        }
    }
    let mut out = Map::new();
    walk(section, "", &mut out);
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn invalid_value(section: &str, expected: &str, found: &Value) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        expected: expected.to_string(),
        found: type_name(found).to_string(),
    }
}

fn expect_object<'a>(value: &'a Value, section: &str) -> ConfigResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| invalid_value(section, "object", value))
}

fn expect_array<'a>(value: &'a Value, section: &str) -> ConfigResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| invalid_value(section, "list", value))
}

fn expect_str<'a>(value: &'a Value, section: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| invalid_value(section, "string", value))
}

fn require<'a>(entry: &'a Map<String, Value>, key: &str, section: &str) -> ConfigResult<&'a Value> {
    entry.get(key).ok_or_else(|| ConfigError::MissingField {
        key: key.to_string(),
        section: section.to_string(),
    })
}

/// A string or a list of strings.
fn string_list(value: &Value, section: &str) -> ConfigResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| expect_str(item, section).map(str::to_string))
            .collect(),
        other => Err(invalid_value(section, "string or list of strings", other)),
    }
}
