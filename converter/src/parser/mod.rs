//! CSV reading and writing with encoding and delimiter auto-detection.
//!
//! Input tables become ordered records of string cells; output rows are
//! written back as CSV with one column per flat key.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::row::{blank_column_name, value_text, Row, STAGING_FIELD};

/// CSV error with position context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(val) => write!(f, "Line {} (value '{}'): {}", self.line, val, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
        CsvError::new(line, err.to_string())
    }
}

/// A decoded input table
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Column headers, in file order
    pub headers: Vec<String>,
    /// One ordered `header -> cell` map per data row
    pub records: Vec<Map<String, Value>>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes. Valid UTF-8 wins, otherwise chardet decides.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the named encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(decoder) => decoder.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn delimiter_byte(delimiter: char) -> Result<u8, CsvError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| CsvError::new(0, "Delimiter must be a single ASCII character").with_value(delimiter))
}

/// Parse CSV text with an explicit delimiter.
///
/// Cells are trimmed; missing trailing cells read as empty strings and
/// extra cells are ignored.
///
/// # Example
/// ```ignore
/// let (headers, records) = parse_csv_str("name;age\nAlice;30", ';')?;
/// assert_eq!(headers, vec!["name", "age"]);
/// assert_eq!(records[0]["age"], "30");
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<Map<String, Value>>), CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    let headers: Vec<String> = headers
        .into_iter()
        .enumerate()
        .map(|(i, header)| if header.is_empty() { blank_column_name(i + 1) } else { header })
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        records.push(row);
    }

    Ok((headers, records))
}

/// Parse CSV bytes, detecting the encoding and, unless given, the delimiter.
pub fn read_csv_bytes(bytes: &[u8], delimiter: Option<char>) -> Result<ParsedTable, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    debug!(%encoding, ?delimiter, "reading CSV");

    let (headers, records) = parse_csv_str(&content, delimiter)?;
    Ok(ParsedTable {
        headers,
        records,
        encoding,
        delimiter,
    })
}

/// Read a CSV file with auto-detection.
///
/// # Example
/// ```ignore
/// let table = read_csv_file("/path/to/file.csv", None)?;
/// println!("Encoding: {}, Delimiter: '{}'", table.encoding, table.delimiter);
/// ```
pub fn read_csv_file<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> Result<ParsedTable, CsvError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {}", path.display(), e)))?;
    read_csv_bytes(&bytes, delimiter)
}

fn is_staging_key(key: &str) -> bool {
    key == STAGING_FIELD
        || key
            .strip_prefix(STAGING_FIELD)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Output columns: every flat key of `rows` in first-seen order.
pub fn output_headers(rows: &[Row], keep_staging: bool) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.flat.keys() {
            if (keep_staging || !is_staging_key(key)) && !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// Write rows as CSV. Returns the number of rows written.
///
/// When no row has an output column nothing is written, but every row
/// still counts.
pub fn write_csv<W: Write>(writer: W, rows: &[Row], delimiter: char, keep_staging: bool) -> Result<usize, CsvError> {
    let headers = output_headers(rows, keep_staging);
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(writer);

    if headers.is_empty() {
        return Ok(rows.len());
    }
    out.write_record(&headers)?;
    for row in rows {
        let cells = headers
            .iter()
            .map(|header| row.flat.get(header).map(value_text).unwrap_or_default());
        out.write_record(cells)?;
    }
    out.flush().map_err(|e| CsvError::new(0, format!("Cannot write output: {}", e)))?;
    Ok(rows.len())
}

/// Write rows to a CSV file.
pub fn write_csv_file<P: AsRef<Path>>(path: P, rows: &[Row], delimiter: char, keep_staging: bool) -> Result<usize, CsvError> {
    let path = path.as_ref();
    let file = fs::File::create(path)
        .map_err(|e| CsvError::new(0, format!("Cannot create file '{}': {}", path.display(), e)))?;
    write_csv(file, rows, delimiter, keep_staging)
}
