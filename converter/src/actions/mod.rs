//! Row actions.
//!
//! - [`types`]: one configuration record per action
//! - [`dsl`]: `name:fields[:options]` action strings
//! - [`executor`]: the per-row pipeline
//! - [`template`]: `{name}` templates for `assign-format`
//! - [`literal`]: literal expressions for `parse`
//! - [`remap`]: projection onto the output columns

pub mod dsl;
pub mod executor;
pub mod literal;
pub mod remap;
pub mod template;
pub mod types;

pub use dsl::{actions_description, parse_action, parse_actions, DEFAULT_ACTION_DELIMITER};
pub use executor::{apply, apply_action, filter_row, resolve_source, Flow};
pub use remap::remap_columns;
pub use template::{Rendered, Template, TemplateError};
pub use types::{
    ActionConfig, ArrayItem, AssignArrayConfig, AssignConfig, AssignConstantConfig, AssignFormatConfig,
    AssignIdConfig, AssignLengthConfig, FilterConfig, FilterOperator, FilterValue, JoinConfig, OmitConfig,
    ParseAs, ParseConfig, PickConfig, PushConfig, SplitConfig,
};
