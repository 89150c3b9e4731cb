//! `formatki_xlsx` v1:
//! Streaming row-matching and template-sheet synthesis over a product XLSX table.
//!
//! Module layout:
//! - `conf`       : constants and default presets
//! - `spec`       : specs/models/options and the error type
//! - `util`       : pure helper functions (value normalization, naming)
//! - `schema`     : key and dynamic column detection
//! - `source`     : streaming source table reader
//! - `scan`       : row matching over a row stream
//! - `reshape`    : dynamic header derivation and row reshaping
//! - `sheet_name` : sheet name sanitizing and per-build registry
//! - `writer`     : constant-memory template workbook writer
//! - `build`      : workbook build orchestration
//! - `catalog`    : read-only selection queries
pub mod build;
pub mod catalog;
pub mod conf;
pub mod reshape;
pub mod scan;
pub mod schema;
pub mod sheet_name;
pub mod source;
pub mod spec;
pub mod util;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use build::{EnumBuildPlan, build_workbook, build_workbook_to, plan_build};
pub use catalog::{
    derive_data_structure, inspect_columns, list_groups, list_subgroups, resolve_group_codes,
    sample_matching_rows,
};
pub use conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL, derive_default_build_options};
pub use reshape::{SpecRowShape, derive_dynamic_headers, reshape_row};
pub use scan::{is_row_match, scan_matching_rows};
pub use schema::{derive_table_layout, detect_dynamic_columns, detect_key_columns};
pub use sheet_name::{SheetNameRegistry, sanitize_sheet_name};
pub use source::SourceTable;
pub use spec::{
    DataStructure, EnumDynamicHeadersSource, EnumKeyColumnsRule, FormatkiError, SpecBuildOptions,
    SpecBuildReport, SpecCellFormat, SpecColumnInspection, SpecDynamicColumns, SpecDynamicHeaders,
    SpecInstructionLine, SpecKeyColumns, SpecMatchCriterion, SpecRowSample, SpecSelection,
    SpecSheetOutcome, SpecSheetReport, SpecSourceRow, SpecTableLayout,
};
pub use util::normalize_for_match;
pub use writer::TemplateWriter;
