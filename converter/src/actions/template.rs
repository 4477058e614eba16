//! `{name}` templates used by `assign-format`.
//!
//! A template is parsed once into literal text and placeholders. Rendering
//! binds every placeholder from a parameter map; names that are not bound get
//! the sentinel `__<name>__undefined__` so rendering never fails on data.
//!
//! Supported syntax:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{name}` | value of `name` as cell text |
//! | `{name!r}` | Python-style repr of `name` (`'ab'`, `None`, `['a', 1]`) |
//! | `{name:>8}` | aligned in a field of width 8 (`<`, `>`, `^`, optional fill char) |
//! | `{name:+}` | sign shown on non-negative numbers (`+` or ` `) |
//! | `{name:08}` | numbers zero-padded to width 8 |
//! | `{name:.2}` | numbers with 2 decimals, strings truncated to 2 chars |
//! | `{name:03d}` | type codes `s d x X o b f F e E %`; numeric strings are formatted as numbers |
//! | `{{` / `}}` | literal braces |

use serde_json::{Map, Value};
use thiserror::Error;

use crate::row::value_text;

/// Template syntax error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct TemplateError(pub String);

/// Sentinel bound to a placeholder without a value.
pub fn undefined_sentinel(name: &str) -> String {
    format!("__{name}__undefined__")
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder {
        name: String,
        repr: bool,
        spec: FormatSpec,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
    sign: Option<char>,
    kind: Option<char>,
}

/// Type codes accepted after the precision.
const FORMAT_TYPES: &str = "sdxXobfFeE%";

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Rendered text plus the placeholder names that had no value.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub undefined: Vec<String>,
}

impl Template {
    /// Parse a template string.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError("single '}' encountered".to_string())),
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError("nested '{' in placeholder".to_string())),
                            c => field.push(c),
                        }
                    }
                    if !closed {
                        return Err(TemplateError("unclosed '{' in template".to_string()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&field)?);
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { name, .. } = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Render with `params`, binding sentinels for unknown names.
    pub fn render(&self, params: &Map<String, Value>) -> Rendered {
        let undefined: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !params.contains_key(*name))
            .map(str::to_string)
            .collect();

        let mut text = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => text.push_str(s),
                Segment::Placeholder { name, repr, spec } => match params.get(name) {
                    Some(value) => text.push_str(&format_value(value, *repr, spec)),
                    None => {
                        let sentinel = Value::String(undefined_sentinel(name));
                        text.push_str(&format_value(&sentinel, false, spec));
                    }
                },
            }
        }
        Rendered { text, undefined }
    }
}

fn parse_placeholder(field: &str) -> Result<Segment, TemplateError> {
    let (head, spec) = match field.split_once(':') {
        Some((head, spec)) => (head, Some(spec)),
        None => (field, None),
    };
    let (name, repr) = match head.split_once('!') {
        Some((name, "s")) => (name, false),
        Some((name, "r")) => (name, true),
        Some((_, conversion)) => {
            return Err(TemplateError(format!("unknown conversion '!{conversion}'")));
        }
        None => (head, false),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(TemplateError("positional placeholders are not supported".to_string()));
    }
    let spec = match spec {
        Some(spec) => parse_spec(spec)?,
        None => FormatSpec::default(),
    };
    Ok(Segment::Placeholder {
        name: name.to_string(),
        repr,
        spec,
    })
}

fn parse_spec(spec: &str) -> Result<FormatSpec, TemplateError> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut pos = 0;

    let align_of = |c: char| match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        _ => None,
    };

    if chars.len() >= 2 && align_of(chars[1]).is_some() {
        parsed.fill = Some(chars[0]);
        parsed.align = align_of(chars[1]);
        pos = 2;
    } else if let Some(align) = chars.first().and_then(|c| align_of(*c)) {
        parsed.align = Some(align);
        pos = 1;
    }

    if let Some(sign @ ('+' | '-' | ' ')) = chars.get(pos).copied() {
        parsed.sign = Some(sign);
        pos += 1;
    }

    if chars.get(pos) == Some(&'0') {
        parsed.zero = true;
        pos += 1;
    }

    let width: String = chars[pos..].iter().take_while(|c| c.is_ascii_digit()).collect();
    pos += width.len();
    if !width.is_empty() {
        parsed.width = width.parse().ok();
    }

    if chars.get(pos) == Some(&'.') {
        pos += 1;
        let precision: String = chars[pos..].iter().take_while(|c| c.is_ascii_digit()).collect();
        if precision.is_empty() {
            return Err(TemplateError(format!("missing precision in format spec '{spec}'")));
        }
        pos += precision.len();
        parsed.precision = precision.parse().ok();
    }

    if let Some(&kind) = chars.get(pos) {
        if pos + 1 == chars.len() && (kind.is_ascii_alphabetic() || kind == '%') {
            if !FORMAT_TYPES.contains(kind) {
                return Err(TemplateError(format!("unsupported format type '{kind}' in '{spec}'")));
            }
            parsed.kind = Some(kind);
            pos += 1;
        }
    }

    if pos != chars.len() {
        return Err(TemplateError(format!("invalid format spec '{spec}'")));
    }
    Ok(parsed)
}

/// Numeric view of a value for typed format specs. Numeric strings count.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from))
                .map(Number::Int)
                .or_else(|| n.as_f64().map(Number::Float)),
            Value::Bool(b) => Some(Number::Int(i128::from(*b))),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i128>()
                    .map(Number::Int)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(Number::Float))
            }
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn as_int(self) -> Option<i128> {
        match self {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i128),
            Number::Float(_) => None,
        }
    }
}

fn fixed(f: f64, precision: usize) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        format!("{f:.precision$}")
    }
}

/// Exponent notation with a signed, two-digit exponent (`1.50e+03`).
fn exponent(f: f64, precision: usize) -> String {
    if !f.is_finite() {
        return fixed(f, precision);
    }
    let text = format!("{f:.precision$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
        }
        None => text,
    }
}

fn radix(i: i128, kind: char) -> String {
    let sign = if i < 0 { "-" } else { "" };
    let abs = i.unsigned_abs();
    match kind {
        'x' => format!("{sign}{abs:x}"),
        'X' => format!("{sign}{abs:X}"),
        'o' => format!("{sign}{abs:o}"),
        _ => format!("{sign}{abs:b}"),
    }
}

/// Typed rendering of a number. `None` when the type does not apply.
fn format_number(number: Number, kind: char, precision: Option<usize>) -> Option<String> {
    let precision = precision.unwrap_or(6);
    let text = match kind {
        'd' => number.as_int()?.to_string(),
        'x' | 'X' | 'o' | 'b' => radix(number.as_int()?, kind),
        'f' => fixed(number.as_f64(), precision),
        'F' => fixed(number.as_f64(), precision).to_uppercase(),
        'e' => exponent(number.as_f64(), precision),
        'E' => exponent(number.as_f64(), precision).to_uppercase(),
        '%' => format!("{}%", fixed(number.as_f64() * 100.0, precision)),
        _ => return None,
    };
    Some(text)
}

/// Body of a placeholder before padding, and whether it is numeric.
fn render_body(value: &Value, spec: &FormatSpec) -> (String, bool) {
    match spec.kind {
        None => {
            let text = match (value, spec.precision) {
                (Value::Number(n), Some(precision)) => match n.as_f64() {
                    Some(f) => fixed(f, precision),
                    None => n.to_string(),
                },
                (Value::String(s), Some(precision)) => s.chars().take(precision).collect(),
                _ => value_text(value),
            };
            (text, value.is_number())
        }
        Some('s') => {
            let text = value_text(value);
            match spec.precision {
                Some(precision) => (text.chars().take(precision).collect(), false),
                None => (text, false),
            }
        }
        Some(kind) => match Number::of(value).and_then(|n| format_number(n, kind, spec.precision)) {
            Some(text) => (text, true),
            None => (value_text(value), false),
        },
    }
}

/// Python `repr` of a value: quoted strings, `None`, `True`/`False`.
fn python_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(python_repr).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{}: {}", quote(key), python_repr(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

// Single quotes unless the text holds a single quote and no double quote.
fn quote(s: &str) -> String {
    let q = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == q => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(q);
    out
}

fn format_value(value: &Value, repr: bool, spec: &FormatSpec) -> String {
    let (mut text, numeric) = if repr {
        (python_repr(value), false)
    } else {
        render_body(value, spec)
    };
    if numeric && !text.starts_with('-') {
        match spec.sign {
            Some('+') => text.insert(0, '+'),
            Some(' ') => text.insert(0, ' '),
            _ => {}
        }
    }

    let Some(width) = spec.width else {
        return text;
    };
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let padding = width - len;

    if spec.zero && numeric && spec.align.is_none() {
        let split = usize::from(text.starts_with(['-', '+', ' ']));
        let (sign, digits) = text.split_at(split);
        return format!("{sign}{}{digits}", "0".repeat(padding));
    }

    let fill = spec.fill.unwrap_or(if spec.zero { '0' } else { ' ' });
    let align = spec
        .align
        .unwrap_or(if numeric { Align::Right } else { Align::Left });
    let pad = |n: usize| fill.to_string().repeat(n);
    match align {
        Align::Left => format!("{text}{}", pad(padding)),
        Align::Right => format!("{}{text}", pad(padding)),
        Align::Center => {
            let left = padding / 2;
            format!("{}{text}{}", pad(left), pad(padding - left))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_undefined_placeholder_gets_sentinel() {
        let template = Template::parse("{a}-{b}").unwrap();
        let rendered = template.render(&params(json!({"a": "1"})));
        assert_eq!(rendered.text, "1-__b__undefined__");
        assert_eq!(rendered.undefined, vec!["b"]);
    }

    #[test]
    fn test_placeholders_unique_in_order() {
        let template = Template::parse("{b}{a}{b}").unwrap();
        assert_eq!(template.placeholders(), vec!["b", "a"]);
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::parse("{{{x}}}").unwrap();
        assert_eq!(template.render(&params(json!({"x": 5}))).text, "{5}");
    }

    #[test]
    fn test_dotted_names() {
        let template = Template::parse("{work.title}").unwrap();
        assert_eq!(template.render(&params(json!({"work.title": "Song"}))).text, "Song");
    }

    #[test]
    fn test_format_specs() {
        let p = params(json!({"n": 42, "s": "ab", "f": 3.14159, "neg": -7}));
        let render = |t: &str| Template::parse(t).unwrap().render(&p).text;
        assert_eq!(render("{n:5}"), "   42");
        assert_eq!(render("{n:05}"), "00042");
        assert_eq!(render("{neg:04}"), "-007");
        assert_eq!(render("{s:5}"), "ab   ");
        assert_eq!(render("{s:*^6}"), "**ab**");
        assert_eq!(render("{s:>4}"), "  ab");
        assert_eq!(render("{f:.2}"), "3.14");
        assert_eq!(render("{s!r}"), "'ab'");
    }

    #[test]
    fn test_type_codes() {
        let p = params(json!({"n": 42, "id": "7", "f": 3.14159, "neg": -7, "big": 255, "s": "ab"}));
        let render = |t: &str| Template::parse(t).unwrap().render(&p).text;
        assert_eq!(render("{n:03d}"), "042");
        assert_eq!(render("{id:03d}"), "007");
        assert_eq!(render("{f:.2f}"), "3.14");
        assert_eq!(render("{n:f}"), "42.000000");
        assert_eq!(render("{f:.1%}"), "314.2%");
        assert_eq!(render("{f:.2e}"), "3.14e+00");
        assert_eq!(render("{n:E}"), "4.200000E+01");
        assert_eq!(render("{big:x}"), "ff");
        assert_eq!(render("{big:X}"), "FF");
        assert_eq!(render("{big:o}"), "377");
        assert_eq!(render("{big:b}"), "11111111");
        assert_eq!(render("{neg:x}"), "-7");
        assert_eq!(render("{s:5s}"), "ab   ");
        assert_eq!(render("{s:.1s}"), "a");
    }

    #[test]
    fn test_sign_option() {
        let p = params(json!({"n": 42, "neg": -7}));
        let render = |t: &str| Template::parse(t).unwrap().render(&p).text;
        assert_eq!(render("{n:+d}"), "+42");
        assert_eq!(render("{neg:+d}"), "-7");
        assert_eq!(render("{n: d}"), " 42");
        assert_eq!(render("{n:+05d}"), "+0042");
    }

    #[test]
    fn test_typed_spec_on_text_keeps_text() {
        let p = params(json!({"s": "ab", "f": 2.5}));
        let render = |t: &str| Template::parse(t).unwrap().render(&p).text;
        assert_eq!(render("{s:d}"), "ab");
        assert_eq!(render("{f:d}"), "2.5");
        assert_eq!(render("{missing:03d}"), "__missing__undefined__");
    }

    #[test]
    fn test_python_repr() {
        let value = json!(["a", null, true, 1.5, {"k": "it's"}]);
        assert_eq!(python_repr(&value), r#"['a', None, True, 1.5, {'k': "it's"}]"#);
        assert_eq!(python_repr(&json!("a\tb\\")), r"'a\tb\\'");
        assert_eq!(python_repr(&json!("'\"")), r#"'\'"'"#);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(Template::parse("{a").is_err());
        assert!(Template::parse("a}").is_err());
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{a!x}").is_err());
        assert!(Template::parse("{a:zz}").is_err());
        assert!(Template::parse("{a:g}").is_err());
        assert!(Template::parse("{a:03dd}").is_err());
    }
}
