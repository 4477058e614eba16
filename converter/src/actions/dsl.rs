//! Action-string DSL.
//!
//! Each action is written `name:fields[:options]`:
//!
//! - `fields` is a comma-separated list of `target=source` pairs or bare
//!   `field` names (target and source both set to `field`);
//! - `options` is a comma-separated list of `key=value` pairs or bare flags.
//!
//! Two actions take a free-form second part instead:
//! `assign-format:target=template` and `filter:field<op>value`.
//!
//! ```text
//! assign:title=Titre:required
//! assign:year=Year ?? Date:default=none
//! assign-constant:source=catalog
//! assign-constant:count=3:type=int
//! assign-id:work_id=title:context=catalog
//! assign-format:label={title} ({year})
//! filter:status==active
//! filter-not-empty:title
//! split:tags=Tags:delimiter=;
//! join:tags_text=tags:delimiter=\n
//! parse:meta=Meta:as=json
//! omit:internal
//! ```

use serde_json::{Map, Number, Value};
use tracing::debug;

use super::template::Template;
use super::types::{
    ActionConfig, AssignConfig, AssignConstantConfig, AssignFormatConfig, AssignIdConfig, FilterConfig,
    FilterOperator, FilterValue, JoinConfig, OmitConfig, ParseAs, ParseConfig, SplitConfig,
};
use crate::error::{ConfigError, ConfigResult};

/// Default separator between the parts of an action string.
pub const DEFAULT_ACTION_DELIMITER: char = ':';

/// Parse a list of action strings into action configurations.
pub fn parse_actions<S: AsRef<str>>(actions: &[S], delimiter: char) -> ConfigResult<Vec<ActionConfig>> {
    let mut parsed = Vec::new();
    for action in actions {
        parsed.extend(parse_action(action.as_ref(), delimiter)?);
    }
    Ok(parsed)
}

/// Parse one action string. Actions with several fields expand to one
/// configuration per field.
pub fn parse_action(action: &str, delimiter: char) -> ConfigResult<Vec<ActionConfig>> {
    let parts: Vec<&str> = action.split(delimiter).collect();
    let name = parts[0].trim();

    match name {
        "assign-format" => return parse_assign_format(action, delimiter).map(|a| vec![a]),
        "filter" => return parse_filter(action, delimiter).map(|a| vec![a]),
        _ => {}
    }

    if !(2..=3).contains(&parts.len()) {
        return Err(ConfigError::InvalidAction {
            action: action.to_string(),
            message: format!("expected 2 or 3 fields separated by '{delimiter}'"),
        });
    }

    let options = parse_options(parts.get(2).copied().unwrap_or(""));
    let mut configs = Vec::new();
    for field in parts[1].split(',') {
        let (target, source) = match field.split_once('=') {
            Some((target, source)) => (target.trim(), source.trim()),
            None => (field.trim(), field.trim()),
        };
        if target.is_empty() {
            return Err(ConfigError::InvalidAction {
                action: action.to_string(),
                message: "empty field name".to_string(),
            });
        }
        configs.push(build_action(name, target, source, &options)?);
    }
    debug!(action, count = configs.len(), "parsed action");
    Ok(configs)
}

fn build_action(name: &str, target: &str, source: &str, options: &Map<String, Value>) -> ConfigResult<ActionConfig> {
    let action = match name {
        "assign" => {
            let mut config = AssignConfig::new(target, source);
            if let Some(default) = option_text(options, "default") {
                config = config.with_default(default_value(default));
            }
            if option_flag(options, "required")? {
                config = config.required();
            }
            ActionConfig::Assign(config)
        }
        "assign-constant" => {
            let ty = option_text(options, "type").unwrap_or("str");
            ActionConfig::AssignConstant(AssignConstantConfig {
                target: target.to_string(),
                value: typed_constant(source, ty)?,
            })
        }
        "assign-id" => ActionConfig::AssignId(AssignIdConfig {
            target: target.to_string(),
            primary: vec![source.to_string()],
            context: option_text(options, "context")
                .map(|context| context.split(',').map(|c| c.trim().to_string()).collect()),
        }),
        "filter-empty" => ActionConfig::Filter(FilterConfig::new(target, FilterOperator::Empty, FilterValue::empty())?),
        "filter-not-empty" => {
            ActionConfig::Filter(FilterConfig::new(target, FilterOperator::NotEmpty, FilterValue::empty())?)
        }
        "join" => ActionConfig::Join(JoinConfig {
            target: target.to_string(),
            source: source.to_string(),
            delimiter: option_text(options, "delimiter").map(str::to_string),
        }),
        "omit" => ActionConfig::Omit(OmitConfig {
            field: target.to_string(),
        }),
        "parse" => ActionConfig::Parse(ParseConfig {
            target: target.to_string(),
            source: source.to_string(),
            as_type: option_text(options, "as").unwrap_or("literal").parse::<ParseAs>()?,
            required: option_flag(options, "required")?,
        }),
        "parse-json" => ActionConfig::Parse(ParseConfig {
            target: target.to_string(),
            source: source.to_string(),
            as_type: ParseAs::Json,
            required: option_flag(options, "required")?,
        }),
        "split" => ActionConfig::Split(SplitConfig {
            target: target.to_string(),
            source: source.to_string(),
            delimiter: option_text(options, "delimiter").map(str::to_string),
        }),
        other => return Err(ConfigError::UnknownAction(other.to_string())),
    };
    Ok(action)
}

fn parse_assign_format(action: &str, delimiter: char) -> ConfigResult<ActionConfig> {
    let Some((_, assignment)) = action.split_once(delimiter) else {
        return Err(ConfigError::InvalidAction {
            action: action.to_string(),
            message: format!("expected 2 fields separated by '{delimiter}'"),
        });
    };
    let Some((target, format)) = assignment.split_once('=') else {
        return Err(ConfigError::InvalidAction {
            action: action.to_string(),
            message: "expected target=format".to_string(),
        });
    };
    let target = target.trim();
    let format = format.trim();
    validate_template(format)?;
    Ok(ActionConfig::AssignFormat(AssignFormatConfig {
        target: target.to_string(),
        format: format.to_string(),
    }))
}

fn parse_filter(action: &str, delimiter: char) -> ConfigResult<ActionConfig> {
    let Some((_, expression)) = action.split_once(delimiter) else {
        return Err(ConfigError::InvalidAction {
            action: action.to_string(),
            message: format!("expected 2 fields separated by '{delimiter}'"),
        });
    };
    let expression = expression.trim();
    for operator in [FilterOperator::Equal, FilterOperator::NotEqual, FilterOperator::Matches] {
        if let Some((field, value)) = expression.split_once(operator.as_str()) {
            let filter = FilterConfig::new(field.trim(), operator, FilterValue::Text(value.trim().to_string()))?;
            return Ok(ActionConfig::Filter(filter));
        }
    }
    Err(ConfigError::UnsupportedFilter(expression.to_string()))
}

/// Check a format template early so syntax errors surface at load time.
pub(crate) fn validate_template(format: &str) -> ConfigResult<()> {
    Template::parse(format)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidTemplate {
            template: format.to_string(),
            message: e.to_string(),
        })
}

fn parse_options(options: &str) -> Map<String, Value> {
    let mut parsed = Map::new();
    for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        match option.split_once('=') {
            Some((key, value)) => {
                parsed.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
            }
            None => {
                parsed.insert(option.to_string(), Value::Bool(true));
            }
        }
    }
    parsed
}

fn option_text<'a>(options: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

fn option_flag(options: &Map<String, Value>, key: &str) -> ConfigResult<bool> {
    match options.get(key) {
        None => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) => parse_bool(text).ok_or_else(|| ConfigError::InvalidConstant {
            value: text.clone(),
            ty: format!("bool (option '{key}')"),
        }),
        Some(other) => Err(ConfigError::InvalidConstant {
            value: other.to_string(),
            ty: "bool".to_string(),
        }),
    }
}

/// `none` and `null` (any case) mean a null default.
fn default_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::String(raw.to_string())
    }
}

/// Convert a constant to the type named by the `type` option.
pub fn typed_constant(raw: &str, ty: &str) -> ConfigResult<Value> {
    let invalid = || ConfigError::InvalidConstant {
        value: raw.to_string(),
        ty: ty.to_string(),
    };
    match ty {
        "str" | "string" => Ok(Value::String(raw.to_string())),
        "int" | "integer" => raw.trim().parse::<i64>().map(Value::from).map_err(|_| invalid()),
        "float" => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        "bool" | "boolean" => parse_bool(raw).map(Value::Bool).ok_or_else(invalid),
        other => Err(ConfigError::UnsupportedType(other.to_string())),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Reference of the action DSL, for the CLI.
pub fn actions_description() -> String {
    r#"Action strings: name:fields[:options]

  fields   comma-separated target=source pairs, or bare field names
  options  comma-separated key=value pairs, or bare flags

| Action | Fields | Options |
|--------|--------|---------|
| assign | target=source (source may chain with || and ??) | default=VALUE, required |
| assign-constant | target=value | type=str|int|float|bool |
| assign-format | target=template with {field} placeholders | - |
| assign-id | target=primary field | context=field |
| filter | field==value, field!=value, field=~regex | - |
| filter-empty | field | - |
| filter-not-empty | field | - |
| join | target=source | delimiter=TEXT (default ";", "\n" for newline) |
| omit | field | - |
| parse | target=source | as=literal|json, required |
| parse-json | target=source | required |
| split | target=source | delimiter=TEXT (default: whitespace) |

Examples:
  assign:title=Titre:required
  assign:label=Name || Alias:default=none
  assign-id:work_id=title:context=catalog
  assign-format:code={catalog}-{work_id:04}
  filter:status==active
  split:tags=Tags:delimiter=;"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(action: &str) -> ActionConfig {
        let mut actions = parse_action(action, DEFAULT_ACTION_DELIMITER).unwrap();
        assert_eq!(actions.len(), 1);
        actions.remove(0)
    }

    #[test]
    fn test_assign_with_options() {
        match one("assign:title=Titre:default=None,required") {
            ActionConfig::Assign(config) => {
                assert_eq!(config.target, "title");
                assert_eq!(config.source, "Titre");
                assert!(config.assign_default);
                assert_eq!(config.default_value, Value::Null);
                assert!(config.required);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_bare_fields_expand() {
        let actions = parse_action("omit:a,b , c", ':').unwrap();
        let fields: Vec<String> = actions
            .into_iter()
            .map(|a| match a {
                ActionConfig::Omit(config) => config.field,
                other => panic!("unexpected action: {other:?}"),
            })
            .collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_assign_constant_types() {
        let value = |action: &str| match one(action) {
            ActionConfig::AssignConstant(config) => config.value,
            other => panic!("unexpected action: {other:?}"),
        };
        assert_eq!(value("assign-constant:a=x"), json!("x"));
        assert_eq!(value("assign-constant:a=12:type=int"), json!(12));
        assert_eq!(value("assign-constant:a=1.5:type=float"), json!(1.5));
        assert_eq!(value("assign-constant:a=yes:type=bool"), json!(true));

        assert!(matches!(
            parse_action("assign-constant:a=x:type=int", ':'),
            Err(ConfigError::InvalidConstant { .. })
        ));
        assert!(matches!(
            parse_action("assign-constant:a=x:type=date", ':'),
            Err(ConfigError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_assign_id_context() {
        match one("assign-id:work_id=title:context=catalog") {
            ActionConfig::AssignId(config) => {
                assert_eq!(config.primary, vec!["title"]);
                assert_eq!(config.context, Some(vec!["catalog".to_string()]));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_assign_format_keeps_delimiters() {
        match one("assign-format:label={a}:{b}") {
            ActionConfig::AssignFormat(config) => {
                assert_eq!(config.target, "label");
                assert_eq!(config.format, "{a}:{b}");
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(matches!(
            parse_action("assign-format:label={a", ':'),
            Err(ConfigError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_assign_format_type_codes() {
        for action in ["assign-format:code={id:03d}", "assign-format:price={x:.2f}", "assign-format:s={x:>5s}"] {
            assert!(parse_action(action, ':').is_ok(), "{action}");
        }
        assert!(matches!(
            parse_action("assign-format:v={x:g}", ':'),
            Err(ConfigError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_filter_operators() {
        let op = |action: &str| match one(action) {
            ActionConfig::Filter(config) => (config.field, config.operator, config.value),
            other => panic!("unexpected action: {other:?}"),
        };
        assert_eq!(
            op("filter:status == active"),
            ("status".into(), FilterOperator::Equal, FilterValue::Text("active".into()))
        );
        assert_eq!(op("filter:a!=b").1, FilterOperator::NotEqual);
        assert_eq!(op("filter:code=~^T\\d+").1, FilterOperator::Matches);
        assert_eq!(op("filter-empty:a").1, FilterOperator::Empty);
        assert_eq!(op("filter-not-empty:a").1, FilterOperator::NotEmpty);
        assert!(matches!(
            parse_action("filter:a>3", ':'),
            Err(ConfigError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn test_parse_options() {
        match one("parse:meta=Meta:as=json,required") {
            ActionConfig::Parse(config) => {
                assert_eq!(config.as_type, ParseAs::Json);
                assert!(config.required);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        match one("parse-json:meta") {
            ActionConfig::Parse(config) => {
                assert_eq!(config.as_type, ParseAs::Json);
                assert!(!config.required);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(parse_action("parse:a:as=xml", ':').is_err());
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            parse_action("assign", ':'),
            Err(ConfigError::InvalidAction { .. })
        ));
        assert!(matches!(
            parse_action("assign:a:b:c", ':'),
            Err(ConfigError::InvalidAction { .. })
        ));
        assert!(matches!(
            parse_action("explode:a", ':'),
            Err(ConfigError::UnknownAction(name)) if name == "explode"
        ));
    }

    #[test]
    fn test_custom_delimiter() {
        let actions = parse_actions(&["split|tags=Tags|delimiter=;", "join|t=tags"], '|').unwrap();
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], ActionConfig::Split(c) if c.delimiter.as_deref() == Some(";")));
    }
}
