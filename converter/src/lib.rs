//! # table-converter - row-by-row table transformation
//!
//! Reads a table, runs every record through an ordered list of declarative
//! actions, and writes the projected result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Parser    │────▶│   Actions   │────▶│    Remap    │────▶│  CSV File   │
//! │ (ISO/UTF8)  │     │ (auto-enc)  │     │ (per row)   │     │ (picks)     │     │ (public)    │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                         ┌──────┴──────┐
//!                                         │  RunStatus  │
//!                                         │ (id tables) │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use table_converter::{Config, Converter};
//!
//! let mut config = Config::new();
//! config.add_actions(&["assign:title=Titre:required", "filter-not-empty:title"], ':')?;
//! let mut converter = Converter::new(config);
//! let output = converter.convert_records(&records)?;
//! println!("{} rows, {} dropped", output.rows.len(), output.dropped);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`row`] - Dual flat/nested rows and dotted-path addressing
//! - [`ids`] - Run-scoped sequential ids
//! - [`actions`] - Action records, DSL, executor, templates and remap
//! - [`config`] - JSON and YAML configuration loading
//! - [`parser`] - CSV reading and writing with auto-detection
//! - [`convert`] - Table-level driver
//! - [`logging`] - `tracing` subscriber setup

// Core modules
pub mod error;
pub mod ids;
pub mod row;

// Actions
pub mod actions;
pub mod config;

// I/O
pub mod convert;
pub mod parser;

pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ActionError, ConfigError, ConvertError, FieldError};

// =============================================================================
// Re-exports - Row model
// =============================================================================

pub use ids::{IdContextMap, IdMap, PartitionKey, RunStatus};
pub use row::{Row, INPUT_FIELD, STAGING_FIELD};

// =============================================================================
// Re-exports - Actions
// =============================================================================

pub use actions::{
    actions_description, apply, parse_action, parse_actions, remap_columns, ActionConfig, FilterOperator,
    PickConfig,
};
pub use config::{load_config, Config};

// =============================================================================
// Re-exports - CSV and conversion
// =============================================================================

pub use convert::{convert_file, ConvertOptions, ConvertOutput, ConvertSummary, Converter, CsvInfo};
pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_csv_str, read_csv_bytes, read_csv_file, write_csv,
    write_csv_file, CsvError, ParsedTable,
};
