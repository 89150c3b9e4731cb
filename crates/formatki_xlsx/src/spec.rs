//! Shared template specification models and the error type.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::conf::{
    C_INSTRUCTIONS_SHEET_NAME, C_NO_MATCH_PLACEHOLDER, C_SOURCE_SHEET_DEFAULT,
    TUP_DYNAMIC_COLUMN_PREFIXES, TUP_WHOLE_DEPARTMENT_DROPPED_COLUMNS, TUP_WHOLE_DEPARTMENT_NAMES,
    derive_default_base_labels, derive_default_fallback_labels, derive_default_instructions,
    derive_default_xlsx_formats,
};
use crate::util::normalize_for_match;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification for output sheets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Bold style.
    pub bold: Option<bool>,
    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Text wrap.
    pub text_wrap: Option<bool>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            text_wrap: other.text_wrap.or(self.text_wrap),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SourceSchema

/// How the key column triple was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKeyColumnsRule {
    /// Headers `GT`, `KW` and `PION` were all found.
    Named,
    /// First/second/third physical columns were used.
    Positional,
}

/// Resolved (group, sub-group, department) key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecKeyColumns {
    /// Group (`GT`) column position.
    pub idx_group: usize,
    /// Sub-group (`KW`) column position.
    pub idx_subgroup: usize,
    /// Department (`PION`) column position.
    pub idx_department: usize,
    /// Resolution path taken.
    pub rule: EnumKeyColumnsRule,
}

/// Dynamic attribute column positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecDynamicColumns {
    /// Ordered column positions.
    pub cols_idx: Vec<usize>,
    /// Whether the positional fallback range was used.
    pub if_fallback: bool,
}

/// Header-derived layout of one opened source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTableLayout {
    /// Cleaned header labels (blank for empty header cells).
    pub headers: Vec<String>,
    /// Key column triple.
    pub key_columns: SpecKeyColumns,
    /// Dynamic attribute columns.
    pub dynamic_columns: SpecDynamicColumns,
}

/// One data row of the source table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSourceRow {
    /// Zero-based sheet row index.
    pub n_row: u32,
    /// Cleaned cell texts by absolute column position.
    pub cells: Vec<String>,
}

impl SpecSourceRow {
    /// Create row from cell texts.
    pub fn new(n_row: u32, cells: Vec<String>) -> Self {
        Self { n_row, cells }
    }

    /// Cell text at `idx`, `None` when the row is shorter.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(String::as_str)
    }

    /// Cell text at `idx`, empty when the row is shorter.
    pub fn cell(&self, idx: usize) -> &str {
        self.get(idx).unwrap_or("")
    }

    /// Whether every cell is empty.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c_cell| c_cell.is_empty())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Selection

/// Normalized key values a row must equal to match.
///
/// Keys left as `None` are not compared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecMatchCriterion {
    /// Normalized department.
    pub department: Option<String>,
    /// Normalized group.
    pub group: Option<String>,
    /// Normalized sub-group.
    pub subgroup: Option<String>,
}

impl SpecMatchCriterion {
    /// Criterion on all three keys.
    pub fn new(department: &str, group: &str, subgroup: &str) -> Self {
        Self {
            department: Some(normalize_for_match(department)),
            group: Some(normalize_for_match(group)),
            subgroup: Some(normalize_for_match(subgroup)),
        }
    }

    /// Criterion on the department only.
    pub fn for_department(department: &str) -> Self {
        Self {
            department: Some(normalize_for_match(department)),
            ..Default::default()
        }
    }

    /// Criterion on the group only.
    pub fn for_group(group: &str) -> Self {
        Self {
            group: Some(normalize_for_match(group)),
            ..Default::default()
        }
    }
}

/// Caller request: one department plus the groups and sub-groups to export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSelection {
    /// Department value.
    pub department: String,
    /// Requested groups, in output order.
    pub groups: Vec<String>,
    /// Requested sub-groups, in output order.
    pub subgroups: Vec<String>,
}

impl SpecSelection {
    /// Create selection.
    pub fn new(department: impl Into<String>, groups: Vec<String>, subgroups: Vec<String>) -> Self {
        Self {
            department: department.into(),
            groups,
            subgroups,
        }
    }

    /// Requested `(group, sub-group)` pairs: groups outer, sub-groups inner.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.groups.iter().flat_map(move |group| {
            self.subgroups
                .iter()
                .map(move |subgroup| (group.as_str(), subgroup.as_str()))
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BuildOptions

/// One line of the instructions sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecInstructionLine {
    /// Literal text.
    pub text: String,
    /// Break into lines of a few words when written.
    pub if_wrap: bool,
}

impl SpecInstructionLine {
    /// Create instruction line.
    pub fn new(text: impl Into<String>, if_wrap: bool) -> Self {
        Self {
            text: text.into(),
            if_wrap,
        }
    }
}

/// Options of one workbook build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBuildOptions {
    /// Worksheet read from the source workbook.
    pub sheet_source: String,
    /// Fixed base columns of group sheets.
    pub base_labels: Vec<String>,
    /// Attribute labels used when a group has no dynamic cells.
    pub fallback_labels: Vec<String>,
    /// Normalized header prefixes of dynamic attribute columns.
    pub dynamic_column_prefixes: Vec<String>,
    /// Instructions sheet content.
    pub instructions: Vec<SpecInstructionLine>,
    /// Instructions sheet name.
    pub instructions_sheet_name: String,
    /// Text written in group sheets without matches.
    pub placeholder_text: String,
    /// Departments exported whole when no group is requested.
    pub whole_department_names: Vec<String>,
    /// Source headers left out of whole-department sheets.
    pub whole_department_dropped_columns: Vec<String>,
    /// Derived header row format.
    pub fmt_header: SpecCellFormat,
    /// Department/group/sub-group label row format.
    pub fmt_label: SpecCellFormat,
    /// Data cell format.
    pub fmt_text: SpecCellFormat,
    /// Multi-line cell format.
    pub fmt_wrapped: SpecCellFormat,
}

impl Default for SpecBuildOptions {
    fn default() -> Self {
        let dict_fmt = derive_default_xlsx_formats();
        let derive_fmt = |key: &str| dict_fmt.get(key).cloned().unwrap_or_default();

        Self {
            sheet_source: C_SOURCE_SHEET_DEFAULT.to_string(),
            base_labels: derive_default_base_labels(),
            fallback_labels: derive_default_fallback_labels(),
            dynamic_column_prefixes: TUP_DYNAMIC_COLUMN_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            instructions: derive_default_instructions(),
            instructions_sheet_name: C_INSTRUCTIONS_SHEET_NAME.to_string(),
            placeholder_text: C_NO_MATCH_PLACEHOLDER.to_string(),
            whole_department_names: TUP_WHOLE_DEPARTMENT_NAMES
                .iter()
                .map(ToString::to_string)
                .collect(),
            whole_department_dropped_columns: TUP_WHOLE_DEPARTMENT_DROPPED_COLUMNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            fmt_header: derive_fmt("header"),
            fmt_label: derive_fmt("label"),
            fmt_text: derive_fmt("text"),
            fmt_wrapped: derive_fmt("wrapped"),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Where a group's dynamic header labels came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumDynamicHeadersSource {
    /// Non-empty dynamic cells of the first matching row.
    FirstRow,
    /// Configured fallback label list.
    Fallback,
}

/// Dynamic header labels fixed for one group sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDynamicHeaders {
    /// Ordered, de-duplicated labels.
    pub labels: Vec<String>,
    /// Label origin.
    pub source: EnumDynamicHeadersSource,
}

/// Outcome of one written sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetReport {
    /// Actual sheet name in the workbook.
    pub sheet_name: String,
    /// Requested group (empty for whole-department sheets).
    pub group: String,
    /// Requested sub-group (empty for whole-department sheets).
    pub subgroup: String,
    /// Matching data rows written.
    pub n_rows_matched: usize,
    /// Dynamic header labels (empty when nothing matched).
    pub dynamic_headers: Vec<String>,
    /// Sheet cut short by a read or write fault; rows written before it stay.
    pub if_partial: bool,
}

/// Sheet left in the workbook plus the non-fatal fault that cut it short.
#[derive(Debug)]
pub struct SpecSheetOutcome {
    pub report: SpecSheetReport,
    pub error: Option<FormatkiError>,
}

/// Outcome of one workbook build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecBuildReport {
    /// Persisted workbook path.
    pub path_file_out: PathBuf,
    /// Generated file name (department + timestamp).
    pub file_name: String,
    /// Whether any requested pair produced at least one row.
    pub found_any: bool,
    /// Written sheets in workbook order (instructions sheet excluded).
    pub sheets: Vec<SpecSheetReport>,
    /// Non-fatal per-pair faults.
    pub warnings: Vec<String>,
}

impl SpecBuildReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Total matched rows across sheets.
    pub fn n_rows_matched(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.n_rows_matched).sum()
    }
}

impl fmt::Display for SpecBuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[BUILD] file={} found_any={} sheets={} rows={} warnings={}",
            self.path_file_out.display(),
            self.found_any,
            self.sheets.len(),
            self.n_rows_matched(),
            self.warnings.len()
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CatalogSpecification

/// Department -> group -> sub-groups, all sorted.
pub type DataStructure = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Matching rows of one criterion, for checking a selection by hand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecRowSample {
    /// All matching rows in the table.
    pub n_rows_matched: usize,
    /// First matching rows as `(header, value)` pairs.
    pub rows: Vec<Vec<(String, String)>>,
}

/// Header layout and leading rows of a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnInspection {
    /// Worksheet read.
    pub sheet_name: String,
    /// Detected layout.
    pub layout: SpecTableLayout,
    /// Leading data rows.
    pub rows: Vec<SpecSourceRow>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Engine errors.
#[derive(Debug, Error)]
pub enum FormatkiError {
    /// Source workbook path does not exist.
    #[error("Source workbook not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Source workbook exists but cannot be opened.
    #[error("Failed to open source workbook {}: {message}", .path.display())]
    SourceOpen {
        /// Source workbook path.
        path: PathBuf,
        /// Underlying reader error text.
        message: String,
    },
    /// Source workbook has no sheet or no header row.
    #[error("Source workbook has no header row: {}", .0.display())]
    SourceEmpty(PathBuf),
    /// Reading rows failed mid-scan.
    #[error("Failed to read source rows: {0}")]
    SourceRead(String),
    /// Writing one worksheet failed.
    #[error("Failed to write sheet {sheet_name:?}: {message}")]
    SheetWrite {
        /// Sheet being written.
        sheet_name: String,
        /// Underlying writer error text.
        message: String,
    },
    /// Saving the output workbook failed.
    #[error("Failed to save workbook {}: {message}", .path.display())]
    Persist {
        /// Output path.
        path: PathBuf,
        /// Underlying writer error text.
        message: String,
    },
    /// Request cannot be served.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

impl FormatkiError {
    /// Whether the error aborts a whole build rather than one sheet.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SourceRead(_) | Self::SheetWrite { .. })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
