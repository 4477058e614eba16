//! Literal expression parser used by `parse` with `as=literal`.
//!
//! Accepts numbers, quoted strings, booleans, null, sequences (`[..]` or
//! `(..)`) and maps (`{key: value}`). This is a superset of what spreadsheet
//! exports typically hold in a "list" cell, e.g. `['a', 'b']` or `(1, 2.5)`.

use serde_json::{Map, Number, Value};

/// Parse `source` as a single literal expression.
pub fn parse_literal(source: &str) -> Result<Value, String> {
    let mut parser = LiteralParser::new(source);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek() {
        return Err(format!("unexpected '{c}' at offset {}", parser.pos));
    }
    Ok(value)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{expected}', found '{c}' at offset {}", self.pos - 1)),
            None => Err(format!("expected '{expected}', found end of input")),
        }
    }

    fn parse_value(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            None => Err("unexpected end of input".to_string()),
            Some('[') => {
                self.bump();
                let items = self.parse_items(']')?.0;
                Ok(Value::Array(items))
            }
            Some('(') => {
                self.bump();
                let (mut items, trailing_comma) = self.parse_items(')')?;
                // `(x)` is a parenthesized value, `(x,)` a one-element sequence.
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::Array(items))
                }
            }
            Some('{') => {
                self.bump();
                self.parse_map()
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                self.parse_string(quote).map(Value::String)
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some(c) if c.is_alphabetic() => self.parse_keyword(),
            Some(c) => Err(format!("unexpected '{c}' at offset {}", self.pos)),
        }
    }

    /// Comma-separated values up to `close`; also reports whether the last
    /// element was followed by a comma.
    fn parse_items(&mut self, close: char) -> Result<(Vec<Value>, bool), String> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(c) if c == close => return Ok((items, false)),
                Some(c) => return Err(format!("expected ',' or '{close}', found '{c}'")),
                None => return Err(format!("unclosed sequence, expected '{close}'")),
            }
        }
    }

    fn parse_map(&mut self) -> Result<Value, String> {
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }
            let key = match self.parse_value()? {
                Value::String(s) => s,
                key @ (Value::Number(_) | Value::Bool(_)) => key.to_string(),
                other => return Err(format!("unsupported map key: {other}")),
            };
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return Err(format!("expected ',' or '}}', found '{c}'")),
                None => return Err("unclosed map, expected '}'".to_string()),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".to_string()),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err("unterminated string".to_string()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'))
        {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();

        if let Some(value) = parse_radix(&raw)? {
            return Ok(value);
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        if let Ok(int) = raw.parse::<u64>() {
            return Ok(Value::Number(int.into()));
        }
        // Integers past u64 fall through to a float.
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid number '{raw}'"))
    }

    fn parse_keyword(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            other => Err(format!("unknown name '{other}'")),
        }
    }
}

/// `0x`, `0o` and `0b` integers, optionally signed. `Ok(None)` when `raw`
/// has no radix prefix.
fn parse_radix(raw: &str) -> Result<Option<Value>, String> {
    let (negative, body) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let radix = match body.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => 16,
        Some("0o") => 8,
        Some("0b") => 2,
        _ => return Ok(None),
    };
    let magnitude = u64::from_str_radix(&body[2..], radix).map_err(|_| format!("invalid number '{raw}'"))?;
    let value = if negative { -i128::from(magnitude) } else { i128::from(magnitude) };
    let number = match (i64::try_from(value), u64::try_from(value)) {
        (Ok(int), _) => Number::from(int),
        (_, Ok(int)) => Number::from(int),
        _ => Number::from_f64(value as f64).ok_or_else(|| format!("invalid number '{raw}'"))?,
    };
    Ok(Some(Value::Number(number)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_literal("42").unwrap(), json!(42));
        assert_eq!(parse_literal("-3.5").unwrap(), json!(-3.5));
        assert_eq!(parse_literal("1_000").unwrap(), json!(1000));
        assert_eq!(parse_literal("'hi'").unwrap(), json!("hi"));
        assert_eq!(parse_literal(r#""it's""#).unwrap(), json!("it's"));
        assert_eq!(parse_literal(r"'a\'b\n'").unwrap(), json!("a'b\n"));
        assert_eq!(parse_literal("True").unwrap(), json!(true));
        assert_eq!(parse_literal("None").unwrap(), json!(null));
    }

    #[test]
    fn test_sequences() {
        assert_eq!(parse_literal("['a', 'b']").unwrap(), json!(["a", "b"]));
        assert_eq!(parse_literal("[1, [2, 3],]").unwrap(), json!([1, [2, 3]]));
        assert_eq!(parse_literal("(1, 2)").unwrap(), json!([1, 2]));
        assert_eq!(parse_literal("(1,)").unwrap(), json!([1]));
        assert_eq!(parse_literal("(1)").unwrap(), json!(1));
        assert_eq!(parse_literal("[]").unwrap(), json!([]));
    }

    #[test]
    fn test_maps() {
        assert_eq!(
            parse_literal("{'a': 1, 2: [True, None]}").unwrap(),
            json!({"a": 1, "2": [true, null]})
        );
        assert_eq!(parse_literal("{}").unwrap(), json!({}));
    }

    #[test]
    fn test_errors() {
        assert!(parse_literal("").is_err());
        assert!(parse_literal("abc").is_err());
        assert!(parse_literal("[1, 2").is_err());
        assert!(parse_literal("'open").is_err());
        assert!(parse_literal("1 2").is_err());
        assert!(parse_literal("{'a' 1}").is_err());
        assert!(parse_literal("1.2.3").is_err());
        assert!(parse_literal("0xZZ").is_err());
    }

    #[test]
    fn test_radix_and_wide_integers() {
        assert_eq!(parse_literal("0x1F").unwrap(), json!(31));
        assert_eq!(parse_literal("0o17").unwrap(), json!(15));
        assert_eq!(parse_literal("0b101").unwrap(), json!(5));
        assert_eq!(parse_literal("-0X10").unwrap(), json!(-16));
        assert_eq!(parse_literal("[0xff, 1]").unwrap(), json!([255, 1]));
        assert_eq!(parse_literal("18446744073709551615").unwrap(), json!(u64::MAX));
        assert_eq!(parse_literal("0xFFFFFFFFFFFFFFFF").unwrap(), json!(u64::MAX));
    }
}
