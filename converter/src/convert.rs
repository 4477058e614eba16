//! Table-level conversion.
//!
//! A [`Converter`] owns a [`Config`] and the [`RunStatus`] of one run. Each
//! input record is turned into a [`Row`], sent through the action pipeline
//! and projected by the column remap.
//!
//! # Example
//!
//! ```rust,ignore
//! use table_converter::{convert_file, Config, ConvertOptions};
//! use std::path::Path;
//!
//! let mut config = Config::new();
//! config.add_actions(&["assign:title=Titre:required"], ':')?;
//! let summary = convert_file(config, Path::new("in.csv"), Some(Path::new("out.csv")), &ConvertOptions::default())?;
//! println!("{}", summary.message());
//! ```

use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, trace};

use crate::actions::{apply, remap_columns};
use crate::config::Config;
use crate::error::{ConvertError, ConvertResult};
use crate::ids::RunStatus;
use crate::parser::{read_csv_file, write_csv, write_csv_file, ParsedTable};
use crate::row::Row;

/// Options for a file conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConvertOptions {
    /// Input delimiter; detected when `None`
    pub input_delimiter: Option<char>,

    /// Output delimiter
    pub output_delimiter: char,

    /// Write `_staging` columns too
    pub keep_staging: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input_delimiter: None,
            output_delimiter: ',',
            keep_staging: false,
        }
    }
}

/// Rows produced from a batch of records
#[derive(Debug, Clone, Default)]
pub struct ConvertOutput {
    /// Surviving rows, in input order
    pub rows: Vec<Row>,
    /// Rows dropped by a filter
    pub dropped: usize,
    /// Records read
    pub total: usize,
}

/// Input file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Outcome of a file conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConvertSummary {
    pub input: CsvInfo,
    pub written: usize,
    pub dropped: usize,
}

impl ConvertSummary {
    pub fn message(&self) -> String {
        format!(
            "Converted: {} records read, {} written, {} dropped",
            self.input.row_count, self.written, self.dropped
        )
    }
}

/// Runs records through one configuration, sharing id state across rows.
#[derive(Debug, Clone)]
pub struct Converter {
    config: Config,
    status: RunStatus,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            status: RunStatus::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    /// Convert one input record. `Ok(None)` means a filter dropped it.
    ///
    /// `record` is the 1-based position used in error messages.
    pub fn convert_record(&mut self, record: usize, cells: &Map<String, Value>) -> ConvertResult<Option<Row>> {
        let row = Row::from_record(cells)?;
        let action_error = |source| ConvertError::Action { record, source };

        let Some(row) = apply(&mut self.status, row, &self.config.actions).map_err(action_error)? else {
            return Ok(None);
        };
        let row = remap_columns(row, &self.config.picks)?;
        trace!(record, row = ?row.flat, "converted record");
        Ok(Some(row))
    }

    /// Convert records in order; the first fatal error aborts the batch.
    pub fn convert_records(&mut self, records: &[Map<String, Value>]) -> ConvertResult<ConvertOutput> {
        let mut output = ConvertOutput {
            total: records.len(),
            ..Default::default()
        };
        for (index, cells) in records.iter().enumerate() {
            match self.convert_record(index + 1, cells)? {
                Some(row) => output.rows.push(row),
                None => {
                    debug!(record = index + 1, "record dropped");
                    output.dropped += 1;
                }
            }
        }
        Ok(output)
    }

    /// Convert a parsed table.
    pub fn convert_table(&mut self, table: &ParsedTable) -> ConvertResult<ConvertOutput> {
        self.convert_records(&table.records)
    }
}

/// Read `input`, convert it, and write the result to `output` (stdout when
/// `None`).
pub fn convert_file(
    config: Config,
    input: &Path,
    output: Option<&Path>,
    options: &ConvertOptions,
) -> ConvertResult<ConvertSummary> {
    let table = read_csv_file(input, options.input_delimiter)?;
    info!(
        path = %input.display(),
        encoding = %table.encoding,
        delimiter = ?table.delimiter,
        rows = table.records.len(),
        "read input"
    );

    let mut converter = Converter::new(config);
    let converted = converter.convert_table(&table)?;

    let written = match output {
        Some(path) => write_csv_file(path, &converted.rows, options.output_delimiter, options.keep_staging)?,
        None => write_csv(
            io::stdout().lock(),
            &converted.rows,
            options.output_delimiter,
            options.keep_staging,
        )?,
    };

    let summary = ConvertSummary {
        input: CsvInfo {
            encoding: table.encoding,
            delimiter: table.delimiter,
            headers: table.headers,
            row_count: converted.total,
        },
        written,
        dropped: converted.dropped,
    };
    info!(
        read = summary.input.row_count,
        written = summary.written,
        dropped = summary.dropped,
        id_partitions = converter.status().id_context_map.len(),
        "conversion finished"
    );
    Ok(summary)
}
