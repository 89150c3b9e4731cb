//! XLSX writer kernel that appends template sheets in constant-memory mode.

use std::path::PathBuf;

use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use tracing::{debug, info};

use crate::conf::{
    N_ROWS_AUTOFIT_INSPECTED, N_WIDTH_COL_MAX, N_WIDTH_COL_MIN, N_WIDTH_COL_SCALE,
    N_WIDTH_EMPTY_COL, N_WIDTH_INSTRUCTIONS_COL, N_WORDS_PER_WRAPPED_LINE,
};
use crate::reshape::{SpecRowShape, derive_dynamic_headers, plan_department_columns};
use crate::scan::scan_matching_rows;
use crate::sheet_name::SheetNameRegistry;
use crate::source::SourceTable;
use crate::spec::{
    FormatkiError, SpecBuildOptions, SpecCellFormat, SpecMatchCriterion, SpecSheetOutcome,
    SpecSheetReport,
};
use crate::util::{estimate_text_width, wrap_every_n_words};

/// Stateful template workbook writer.
///
/// Sheets are appended in call order and cannot be revisited; the workbook is
/// persisted by [`Self::close`].
pub struct TemplateWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    registry: SheetNameRegistry,
    instructions_sheet_name: String,
    fmt_header: Format,
    fmt_label: Format,
    fmt_text: Format,
    fmt_wrapped: Format,
    if_closed: bool,
}

impl TemplateWriter {
    /// Create writer bound to the output path and the format presets of `options`.
    pub fn new(path_file_out: PathBuf, options: &SpecBuildOptions) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            registry: SheetNameRegistry::with_reserved([options.instructions_sheet_name.as_str()]),
            instructions_sheet_name: options.instructions_sheet_name.clone(),
            fmt_header: derive_rust_xlsx_format(&options.fmt_header),
            fmt_label: derive_rust_xlsx_format(&options.fmt_label),
            fmt_text: derive_rust_xlsx_format(&options.fmt_text),
            fmt_wrapped: derive_rust_xlsx_format(&options.fmt_wrapped),
            if_closed: false,
        }
    }

    /// Append one (group, sub-group) sheet scanned from a freshly opened `table`.
    ///
    /// Layout: `[department, group]`, `[subgroup]`, header row, data rows; a
    /// single placeholder cell replaces header and data when nothing matches.
    /// On a non-fatal mid-scan failure the rows written so far stay in the
    /// sheet and the outcome carries the fault.
    pub fn write_group_sheet(
        &mut self,
        table: &mut SourceTable,
        department: &str,
        group: &str,
        subgroup: &str,
        options: &SpecBuildOptions,
    ) -> Result<SpecSheetOutcome, FormatkiError> {
        if self.if_closed {
            return Err(derive_closed_error(subgroup));
        }

        let sheet_name = self.registry.allocate(subgroup);
        let layout = table.layout().clone();
        let criterion = SpecMatchCriterion::new(department, group, subgroup);

        let worksheet = self.workbook.add_worksheet_with_constant_memory();
        worksheet
            .set_name(&sheet_name)
            .map_err(|err| derive_sheet_error(&sheet_name, err))?;
        let mut sink = SheetRowSink::new(worksheet, &sheet_name);

        let mut n_rows_matched = 0usize;
        let mut n_rows_scanned = 0usize;
        let mut dynamic_labels: Vec<String> = Vec::new();
        let res_body = (|| -> Result<(), FormatkiError> {
            sink.push(vec![department.to_string(), group.to_string()], &self.fmt_label)?;
            sink.push(vec![subgroup.to_string()], &self.fmt_label)?;

            let mut matches = scan_matching_rows(table.rows()?, &layout.key_columns, &criterion);
            let mut shape: Option<SpecRowShape> = None;
            while let Some(res_row) = matches.next() {
                n_rows_scanned = matches.n_rows_scanned();
                let row = res_row?;
                if shape.is_none() {
                    let dynamic = derive_dynamic_headers(
                        &row,
                        &layout.dynamic_columns.cols_idx,
                        &options.fallback_labels,
                    );
                    debug!(
                        sheet = sheet_name.as_str(),
                        source = ?dynamic.source,
                        labels = ?dynamic.labels,
                        "Fixed dynamic headers"
                    );
                    let l_header: Vec<String> = options
                        .base_labels
                        .iter()
                        .chain(dynamic.labels.iter())
                        .cloned()
                        .collect();
                    sink.push(l_header, &self.fmt_header)?;
                    shape = Some(SpecRowShape::new(
                        &options.base_labels,
                        &dynamic.labels,
                        &layout.headers,
                        &layout.dynamic_columns.cols_idx,
                    ));
                    dynamic_labels = dynamic.labels;
                }
                if let Some(shape_row) = &shape {
                    sink.push(shape_row.reshape(&row), &self.fmt_text)?;
                }
                n_rows_matched += 1;
            }
            n_rows_scanned = matches.n_rows_scanned();

            if n_rows_matched == 0 {
                sink.push(vec![options.placeholder_text.clone()], &self.fmt_text)?;
            }
            Ok(())
        })();
        let res_sheet = res_body.and(sink.finish());

        info!(
            sheet = sheet_name.as_str(),
            group,
            subgroup,
            n_rows_scanned,
            n_rows_matched,
            "Wrote group sheet"
        );
        derive_sheet_outcome(
            SpecSheetReport {
                sheet_name,
                group: group.to_string(),
                subgroup: subgroup.to_string(),
                n_rows_matched,
                dynamic_headers: dynamic_labels,
                if_partial: false,
            },
            res_sheet,
        )
    }

    /// Append one sheet holding every row of `department`, minus the
    /// configured dropped columns.
    pub fn write_department_sheet(
        &mut self,
        table: &mut SourceTable,
        department: &str,
        options: &SpecBuildOptions,
    ) -> Result<SpecSheetOutcome, FormatkiError> {
        if self.if_closed {
            return Err(derive_closed_error(department));
        }

        let sheet_name = self.registry.allocate(department);
        let layout = table.layout().clone();
        let criterion = SpecMatchCriterion::for_department(department);
        let cols_idx_kept =
            plan_department_columns(&layout.headers, &options.whole_department_dropped_columns);

        let worksheet = self.workbook.add_worksheet_with_constant_memory();
        worksheet
            .set_name(&sheet_name)
            .map_err(|err| derive_sheet_error(&sheet_name, err))?;
        let mut sink = SheetRowSink::new(worksheet, &sheet_name);

        let mut n_rows_matched = 0usize;
        let res_body = (|| -> Result<(), FormatkiError> {
            let l_header: Vec<String> = cols_idx_kept
                .iter()
                .map(|idx| layout.headers[*idx].clone())
                .collect();
            sink.push(l_header, &self.fmt_header)?;

            let rows = table.rows()?;
            for res_row in scan_matching_rows(rows, &layout.key_columns, &criterion) {
                let row = res_row?;
                let l_cells: Vec<String> = cols_idx_kept
                    .iter()
                    .map(|idx| row.cell(*idx).to_string())
                    .collect();
                sink.push(l_cells, &self.fmt_text)?;
                n_rows_matched += 1;
            }
            Ok(())
        })();
        let res_sheet = res_body.and(sink.finish());

        info!(
            sheet = sheet_name.as_str(),
            department, n_rows_matched, "Wrote whole-department sheet"
        );
        derive_sheet_outcome(
            SpecSheetReport {
                sheet_name,
                group: String::new(),
                subgroup: String::new(),
                n_rows_matched,
                dynamic_headers: Vec::new(),
                if_partial: false,
            },
            res_sheet,
        )
    }

    /// Append the static instructions sheet, one line per row in column A.
    pub fn write_instructions_sheet(
        &mut self,
        options: &SpecBuildOptions,
    ) -> Result<(), FormatkiError> {
        let sheet_name = self.instructions_sheet_name.clone();
        if self.if_closed {
            return Err(derive_closed_error(&sheet_name));
        }

        let worksheet = self.workbook.add_worksheet_with_constant_memory();
        worksheet
            .set_name(&sheet_name)
            .map_err(|err| derive_sheet_error(&sheet_name, err))?;
        worksheet
            .set_column_width(0, N_WIDTH_INSTRUCTIONS_COL)
            .map_err(|err| derive_sheet_error(&sheet_name, err))?;

        for (n_idx_row, line) in options.instructions.iter().enumerate() {
            let n_row = cast_row_num(n_idx_row).map_err(|msg| derive_sheet_error(&sheet_name, msg))?;
            let res_write = if line.if_wrap {
                worksheet.write_string_with_format(
                    n_row,
                    0,
                    wrap_every_n_words(&line.text, N_WORDS_PER_WRAPPED_LINE),
                    &self.fmt_wrapped,
                )
            } else {
                worksheet.write_string_with_format(n_row, 0, &line.text, &self.fmt_text)
            };
            res_write.map_err(|err| derive_sheet_error(&sheet_name, err))?;
        }

        info!(
            sheet = sheet_name.as_str(),
            n_lines = options.instructions.len(),
            "Wrote instructions sheet"
        );
        Ok(())
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), FormatkiError> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(|err| FormatkiError::Persist {
                path: self.path_file_out.clone(),
                message: derive_xlsx_error_text(err),
            })?;
        self.if_closed = true;
        Ok(())
    }
}

/// Append-only row writer that holds back the first rows until column widths
/// are known.
struct SheetRowSink<'a> {
    worksheet: &'a mut Worksheet,
    sheet_name: &'a str,
    l_rows_pending: Vec<(Vec<String>, &'a Format)>,
    l_width_by_col: Vec<usize>,
    n_row_next: usize,
    if_widths_set: bool,
}

impl<'a> SheetRowSink<'a> {
    fn new(worksheet: &'a mut Worksheet, sheet_name: &'a str) -> Self {
        Self {
            worksheet,
            sheet_name,
            l_rows_pending: Vec::new(),
            l_width_by_col: Vec::new(),
            n_row_next: 0,
            if_widths_set: false,
        }
    }

    fn push(&mut self, cells: Vec<String>, format: &'a Format) -> Result<(), FormatkiError> {
        if self.if_widths_set {
            return self.write_row(&cells, format);
        }

        for (n_idx_col, c_value) in cells.iter().enumerate() {
            if self.l_width_by_col.len() <= n_idx_col {
                self.l_width_by_col.resize(n_idx_col + 1, 0);
            }
            self.l_width_by_col[n_idx_col] =
                usize::max(self.l_width_by_col[n_idx_col], estimate_text_width(c_value));
        }
        self.l_rows_pending.push((cells, format));
        if self.l_rows_pending.len() >= N_ROWS_AUTOFIT_INSPECTED {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(), FormatkiError> {
        if !self.if_widths_set {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), FormatkiError> {
        for (n_idx_col, n_width) in self.l_width_by_col.iter().enumerate() {
            let n_col = cast_col_num(n_idx_col).map_err(|msg| derive_sheet_error(self.sheet_name, msg))?;
            self.worksheet
                .set_column_width(n_col, derive_column_width(*n_width))
                .map_err(|err| derive_sheet_error(self.sheet_name, err))?;
        }
        self.if_widths_set = true;

        for (cells, format) in std::mem::take(&mut self.l_rows_pending) {
            self.write_row(&cells, format)?;
        }
        Ok(())
    }

    fn write_row(&mut self, cells: &[String], format: &Format) -> Result<(), FormatkiError> {
        let n_row = cast_row_num(self.n_row_next).map_err(|msg| derive_sheet_error(self.sheet_name, msg))?;
        for (n_idx_col, c_value) in cells.iter().enumerate() {
            if c_value.is_empty() {
                continue;
            }
            let n_col = cast_col_num(n_idx_col).map_err(|msg| derive_sheet_error(self.sheet_name, msg))?;
            self.worksheet
                .write_string_with_format(n_row, n_col, c_value, format)
                .map_err(|err| derive_sheet_error(self.sheet_name, err))?;
        }
        self.n_row_next += 1;
        Ok(())
    }
}

/// Column width for the longest inspected text of a column.
pub fn derive_column_width(n_len_max: usize) -> f64 {
    if n_len_max == 0 {
        return N_WIDTH_EMPTY_COL;
    }
    (n_len_max as f64 * N_WIDTH_COL_SCALE).clamp(N_WIDTH_COL_MIN, N_WIDTH_COL_MAX)
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "justify" => Some(FormatAlign::Justify),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

fn derive_sheet_error(sheet_name: &str, message: impl ToString) -> FormatkiError {
    FormatkiError::SheetWrite {
        sheet_name: sheet_name.to_string(),
        message: message.to_string(),
    }
}

fn derive_closed_error(sheet_name: &str) -> FormatkiError {
    derive_sheet_error(sheet_name, "Cannot write after close().")
}

/// Fatal faults propagate; any other fault marks the sheet partial.
fn derive_sheet_outcome(
    mut report: SpecSheetReport,
    res_sheet: Result<(), FormatkiError>,
) -> Result<SpecSheetOutcome, FormatkiError> {
    let error = match res_sheet {
        Ok(()) => None,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => Some(err),
    };
    report.if_partial = error.is_some();
    Ok(SpecSheetOutcome { report, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecInstructionLine;
    use crate::test_support::{read_sheet_names, read_sheet_rows, write_source_workbook};

    fn to_strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn options_small() -> SpecBuildOptions {
        SpecBuildOptions {
            base_labels: to_strings(&["EAN", "Opis"]),
            fallback_labels: to_strings(&["Moc [W]:"]),
            instructions: vec![
                SpecInstructionLine::new("Krótka linia", false),
                SpecInstructionLine::new("jeden dwa trzy cztery pięć sześć siedem", true),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_column_width_clamps() {
        assert_eq!(derive_column_width(0), 8.0);
        assert_eq!(derive_column_width(3), 10.0);
        assert!((derive_column_width(20) - 22.0).abs() < 1e-9);
        assert_eq!(derive_column_width(500), 60.0);
    }

    #[test]
    fn test_group_sheets_layout_placeholder_and_instructions() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_source_workbook(
            &path_source,
            "Arkusz1",
            &[
                vec!["GT", "KW", "PION", "EAN", "Opis", "Punktor 1", "Punktor 2"],
                vec!["1100 Nails", "Nail Sets", "Technika", "123", "Gwoździe", "Power [W]: 500", ""],
                vec!["1100 Nails", "Nail Sets", "Technika", "456", "", "Kolor: czarny", "Power [W]: 500"],
                vec!["1100 Nails", "Screws", "Technika", "789", "", "", ""],
            ],
        );
        let path_out = tmp.path().join("out.xlsx");
        let options = options_small();

        let mut writer = TemplateWriter::new(path_out.clone(), &options);
        let mut table =
            SourceTable::open(&path_source, "Arkusz1", &options.dynamic_column_prefixes)
                .expect("open");
        let outcome = writer
            .write_group_sheet(&mut table, "Technika", "1100 Nails", "Nail Sets", &options)
            .expect("group sheet");
        assert!(outcome.error.is_none());
        let report = outcome.report;
        assert_eq!(report.sheet_name, "Nail Sets");
        assert!(!report.if_partial);
        assert_eq!(report.n_rows_matched, 2);
        assert_eq!(report.dynamic_headers, to_strings(&["Power [W]: 500"]));

        let mut table =
            SourceTable::open(&path_source, "Arkusz1", &options.dynamic_column_prefixes)
                .expect("open");
        let report = writer
            .write_group_sheet(&mut table, "Technika", "1100 Nails", "Hammers", &options)
            .expect("empty sheet")
            .report;
        assert_eq!(report.n_rows_matched, 0);

        writer.write_instructions_sheet(&options).expect("instructions");
        writer.close().expect("close");
        writer.close().expect("close twice");

        assert_eq!(
            read_sheet_names(&path_out),
            to_strings(&["Nail Sets", "Hammers", "Wymagania"])
        );
        assert_eq!(
            read_sheet_rows(&path_out, "Nail Sets"),
            vec![
                to_strings(&["Technika", "1100 Nails"]),
                to_strings(&["Nail Sets"]),
                to_strings(&["EAN", "Opis", "Power [W]: 500"]),
                to_strings(&["123", "Gwoździe", "Power [W]: 500"]),
                to_strings(&["456", "", "Power [W]: 500"]),
            ]
        );
        assert_eq!(
            read_sheet_rows(&path_out, "Hammers"),
            vec![
                to_strings(&["Technika", "1100 Nails"]),
                to_strings(&["Hammers"]),
                to_strings(&["Brak pasujących wierszy"]),
            ]
        );
        assert_eq!(
            read_sheet_rows(&path_out, "Wymagania"),
            vec![
                to_strings(&["Krótka linia"]),
                to_strings(&["jeden dwa trzy cztery pięć\nsześć siedem"]),
            ]
        );
    }

    #[test]
    fn test_department_sheet_drops_key_columns() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_source_workbook(
            &path_source,
            "Arkusz1",
            &[
                vec!["GT", "KW", "PION", "EAN", "Podział", "Opis"],
                vec!["10 Lampy", "LED", "Oświetlenie", "111", "A", "Lampa"],
                vec!["20 Kable", "Kabel", "Technika", "222", "B", "Kabel"],
                vec!["11 Żarówki", "E27", "oświetlenie ", "333", "C", ""],
            ],
        );
        let path_out = tmp.path().join("out.xlsx");
        let options = options_small();

        let mut writer = TemplateWriter::new(path_out.clone(), &options);
        let mut table =
            SourceTable::open(&path_source, "Arkusz1", &options.dynamic_column_prefixes)
                .expect("open");
        let report = writer
            .write_department_sheet(&mut table, "Oświetlenie", &options)
            .expect("department sheet")
            .report;
        writer.close().expect("close");

        assert_eq!(report.n_rows_matched, 2);
        assert_eq!(
            read_sheet_rows(&path_out, "Oświetlenie"),
            vec![
                to_strings(&["EAN", "Opis"]),
                to_strings(&["111", "Lampa"]),
                to_strings(&["333"]),
            ]
        );
    }

    #[test]
    fn test_write_after_close_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let options = options_small();
        let mut writer = TemplateWriter::new(tmp.path().join("out.xlsx"), &options);
        writer.write_instructions_sheet(&options).expect("instructions");
        writer.close().expect("close");

        let result = writer.write_instructions_sheet(&options);
        assert!(matches!(result, Err(FormatkiError::SheetWrite { .. })));
    }
}
