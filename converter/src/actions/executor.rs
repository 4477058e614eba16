//! Action Executor
//!
//! Applies an ordered list of [`ActionConfig`] to one [`Row`]. Actions write
//! their results into the staging namespace; a failed filter drops the row
//! and stops the pipeline.

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use super::literal::parse_literal;
use super::template::Template;
use super::types::{
    ActionConfig, AssignArrayConfig, AssignConfig, AssignFormatConfig, AssignIdConfig, AssignLengthConfig,
    FilterConfig, FilterOperator, FilterValue, JoinConfig, OmitConfig, ParseAs, ParseConfig, PushConfig,
    SplitConfig,
};
use crate::error::{ActionError, ActionResult};
use crate::ids::{PartitionKey, RunStatus};
use crate::row::{input_prefix, is_truthy, staging_path, staging_prefix, value_text, values_match, Row};

/// First found and truthy operand.
pub const OR_OPERATOR: &str = "||";

/// First found and non-null operand.
pub const NULL_OR_OPERATOR: &str = "??";

/// Default `join` delimiter.
pub const DEFAULT_JOIN_DELIMITER: &str = ";";

/// Outcome of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going with the next action.
    Continue,
    /// A filter rejected the row.
    Drop,
}

/// Run `actions` over `row` in order.
///
/// Returns `Ok(None)` when a filter drops the row.
pub fn apply(status: &mut RunStatus, mut row: Row, actions: &[ActionConfig]) -> ActionResult<Option<Row>> {
    for action in actions {
        if apply_action(status, &mut row, action)? == Flow::Drop {
            debug!(action = action.name(), "row dropped by filter");
            return Ok(None);
        }
    }
    Ok(Some(row))
}

/// Apply a single action in place.
pub fn apply_action(status: &mut RunStatus, row: &mut Row, action: &ActionConfig) -> ActionResult<Flow> {
    trace!(action = ?action, "applying action");
    match action {
        ActionConfig::Assign(config) => assign(row, config)?,
        ActionConfig::AssignConstant(config) => row.set_staging_value(&config.target, config.value.clone())?,
        ActionConfig::AssignFormat(config) => assign_format(row, config)?,
        ActionConfig::AssignId(config) => assign_id(status, row, config)?,
        ActionConfig::AssignLength(config) => assign_length(row, config)?,
        ActionConfig::AssignArray(config) => assign_array(row, config)?,
        ActionConfig::Push(config) => push(row, config)?,
        ActionConfig::Filter(config) => {
            if !filter_row(row, config) {
                return Ok(Flow::Drop);
            }
        }
        ActionConfig::Join(config) => join(row, config)?,
        ActionConfig::Omit(config) => omit(row, config)?,
        ActionConfig::Parse(config) => parse(row, config)?,
        ActionConfig::Split(config) => split(row, config)?,
    }
    Ok(Flow::Continue)
}

/// Resolve a source expression that may chain fields with `||` and `??`.
///
/// The expression is split on the first operator; the left field is looked
/// up and kept when it satisfies the operator, otherwise the rest of the
/// chain is resolved. The last field's lookup is returned as-is.
pub fn resolve_source<'a>(row: &'a Row, source: &str) -> Option<&'a Value> {
    let split = [OR_OPERATOR, NULL_OR_OPERATOR]
        .into_iter()
        .filter_map(|operator| source.find(operator).map(|index| (index, operator)))
        .min_by_key(|(index, _)| *index);

    let Some((index, operator)) = split else {
        return row.search_column(source.trim()).map(|(value, _)| value);
    };

    let left = row.search_column(source[..index].trim()).map(|(value, _)| value);
    let rest = &source[index + operator.len()..];
    match (operator, left) {
        (OR_OPERATOR, Some(value)) if is_truthy(value) => Some(value),
        (NULL_OR_OPERATOR, Some(value)) if !value.is_null() => Some(value),
        _ => resolve_source(row, rest),
    }
}

fn assign(row: &mut Row, config: &AssignConfig) -> ActionResult<()> {
    let value = resolve_source(row, &config.source).cloned();
    if config.required && !value.as_ref().is_some_and(is_truthy) {
        return Err(ActionError::RequiredField {
            field: config.source.clone(),
            found: value.is_some(),
            value: value.unwrap_or(Value::Null),
        });
    }
    match value {
        Some(value) => row.set_staging_value(&config.target, value)?,
        None if config.assign_default => row.set_staging_value(&config.target, config.default_value.clone())?,
        None => {}
    }
    Ok(())
}

/// Template parameters: every flat key with its input or staging prefix
/// stripped, then every raw flat key.
fn format_params(row: &Row) -> Map<String, Value> {
    let prefixes = [input_prefix(), staging_prefix()];
    let mut params = Map::new();
    for (key, value) in &row.flat {
        for prefix in &prefixes {
            if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                params.insert(rest.to_string(), value.clone());
            }
        }
    }
    for (key, value) in &row.flat {
        params.insert(key.clone(), value.clone());
    }
    params
}

fn assign_format(row: &mut Row, config: &AssignFormatConfig) -> ActionResult<()> {
    let template = Template::parse(&config.format).map_err(|e| ActionError::Template {
        template: config.format.clone(),
        message: e.to_string(),
    })?;
    let rendered = template.render(&format_params(row));
    if !rendered.undefined.is_empty() {
        warn!(
            target_field = %config.target,
            undefined = ?rendered.undefined,
            "undefined template fields"
        );
    }
    row.set_staging_value(&config.target, Value::String(rendered.text))?;
    Ok(())
}

fn column_values(row: &Row, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| {
            row.search_column(column)
                .map(|(value, _)| value.clone())
                .unwrap_or(Value::Null)
        })
        .collect()
}

fn assign_id(status: &mut RunStatus, row: &mut Row, config: &AssignIdConfig) -> ActionResult<()> {
    let context_columns = config.context.as_deref().unwrap_or_default();
    let primary_values = column_values(row, &config.primary);
    let context_values = column_values(row, context_columns);

    let key = PartitionKey::new(context_columns, &context_values, &config.primary);
    let id = status.id_context_map.assign(key, &primary_values);
    trace!(target_field = %config.target, id, "assigned id");
    row.set_staging_value(&config.target, Value::from(id))?;
    Ok(())
}

fn assign_length(row: &mut Row, config: &AssignLengthConfig) -> ActionResult<()> {
    let length = match row.search_column(&config.source) {
        Some((Value::Array(items), _)) => items.len(),
        Some((Value::Object(map), _)) => map.len(),
        Some((Value::String(text), _)) => text.chars().count(),
        Some((other, _)) => {
            debug!(source = %config.source, value = %other, "value has no length");
            return Ok(());
        }
        None => return Ok(()),
    };
    row.set_staging_value(&config.target, Value::from(length))?;
    Ok(())
}

fn assign_array(row: &mut Row, config: &AssignArrayConfig) -> ActionResult<()> {
    let mut values = Vec::with_capacity(config.items.len());
    for item in &config.items {
        match row.search_column(&item.field) {
            Some((value, _)) => values.push(value.clone()),
            None if item.optional => {}
            None => {
                return Err(ActionError::RequiredField {
                    field: item.field.clone(),
                    found: false,
                    value: Value::Null,
                });
            }
        }
    }
    row.set_staging_value(&config.target, Value::Array(values))?;
    Ok(())
}

fn push(row: &mut Row, config: &PushConfig) -> ActionResult<()> {
    if let Some(condition) = &config.condition {
        if !resolve_source(row, condition).is_some_and(is_truthy) {
            return Ok(());
        }
    }
    let Some((value, _)) = row.search_column(&config.source) else {
        return Ok(());
    };
    let value = value.clone();

    let list = match row.get(&staging_path(&config.target)).cloned() {
        Some(Value::Array(mut items)) => {
            items.push(value);
            items
        }
        None | Some(Value::Null) => vec![value],
        Some(existing) => vec![existing, value],
    };
    row.set_staging_value(&config.target, Value::Array(list))?;
    Ok(())
}

fn filter_equals(value: &Value, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::Text(text) => values_match(value, text),
        FilterValue::List(items) => *value == Value::from(items.clone()),
    }
}

/// Whether `row` passes the filter.
pub fn filter_row(row: &Row, config: &FilterConfig) -> bool {
    let value = row.search_column(&config.field).map(|(value, _)| value);
    match config.operator {
        FilterOperator::Equal => value.is_some_and(|v| filter_equals(v, &config.value)),
        FilterOperator::NotEqual => !value.is_some_and(|v| filter_equals(v, &config.value)),
        FilterOperator::Matches => match (value, config.pattern()) {
            (Some(v), Some(pattern)) => pattern.is_match(&value_text(v)),
            _ => false,
        },
        // A single text value acts as a one-element list.
        FilterOperator::NotIn => match &config.value {
            FilterValue::List(items) => !value.is_some_and(|v| items.iter().any(|item| values_match(v, item))),
            FilterValue::Text(item) => !value.is_some_and(|v| values_match(v, item)),
        },
        FilterOperator::Empty => !value.is_some_and(is_truthy),
        FilterOperator::NotEmpty => value.is_some_and(is_truthy),
    }
}

/// `\n` and `\t` written in a configuration stand for the real characters.
fn unescape_delimiter(delimiter: &str) -> String {
    match delimiter {
        "\\n" => "\n".to_string(),
        "\\t" => "\t".to_string(),
        other => other.to_string(),
    }
}

fn join(row: &mut Row, config: &JoinConfig) -> ActionResult<()> {
    let Some((value, _)) = row.search_column(&config.source) else {
        return Ok(());
    };
    let joined = match value {
        Value::Array(items) => {
            let delimiter = unescape_delimiter(config.delimiter.as_deref().unwrap_or(DEFAULT_JOIN_DELIMITER));
            let parts: Vec<String> = items.iter().map(value_text).collect();
            Value::String(parts.join(&delimiter))
        }
        other => other.clone(),
    };
    row.set_staging_value(&config.target, joined)?;
    Ok(())
}

fn omit(row: &mut Row, config: &OmitConfig) -> ActionResult<()> {
    let Some(value) = row.pop_value(&config.field) else {
        return Ok(());
    };
    if !row.has_staging_value(&config.field) {
        row.set_staging_value(&config.field, value)?;
    }
    Ok(())
}

fn parse(row: &mut Row, config: &ParseConfig) -> ActionResult<()> {
    let Some((value, _)) = row.search_column(&config.source) else {
        if config.required {
            return Err(ActionError::RequiredField {
                field: config.source.clone(),
                found: false,
                value: Value::Null,
            });
        }
        return Ok(());
    };
    let parsed = match (value, config.as_type) {
        (Value::String(raw), ParseAs::Literal) => parse_literal(raw).map_err(|_| ActionError::Parse {
            kind: "literal",
            raw: raw.clone(),
        })?,
        (Value::String(raw), ParseAs::Json) => {
            serde_json::from_str(raw).map_err(|_| ActionError::Parse {
                kind: "JSON",
                raw: raw.clone(),
            })?
        }
        (other, _) => other.clone(),
    };
    row.set_staging_value(&config.target, parsed)?;
    Ok(())
}

fn split(row: &mut Row, config: &SplitConfig) -> ActionResult<()> {
    let Some((value, _)) = row.search_flat_column(&config.source) else {
        return Ok(());
    };
    let value = match value {
        Value::String(text) => {
            let delimiter = config
                .delimiter
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(unescape_delimiter);
            let parts: Vec<&str> = match &delimiter {
                Some(delimiter) => text.split(delimiter.as_str()).collect(),
                None => text.split_whitespace().collect(),
            };
            Value::Array(
                parts
                    .into_iter()
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            )
        }
        other => other.clone(),
    };
    row.set_staging_value(&config.target, value)?;
    Ok(())
}
