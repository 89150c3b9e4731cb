//! Streaming reader over the source workbook.
//!
//! A [`SourceTable`] is opened fresh for every scan; rows are assembled one at a
//! time from calamine's cell stream so that a scan never holds more than one row.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{DataRef, Reader, Xlsx, XlsxError, open_workbook};
use tracing::{debug, warn};

use crate::spec::{FormatkiError, SpecSourceRow, SpecTableLayout};
use crate::schema::derive_table_layout;
use crate::util::clean_cell_text;

type SourceCell = (u32, u32, String);
type NextCellFn<'a> = Box<dyn FnMut() -> Result<Option<SourceCell>, XlsxError> + 'a>;

/// Read-only handle on one worksheet of the source workbook.
pub struct SourceTable {
    path_source: PathBuf,
    workbook: Xlsx<BufReader<File>>,
    sheet_name: String,
    layout: SpecTableLayout,
}

impl SourceTable {
    /// Open `path_source`, pick `sheet_name` (or the first sheet) and detect its layout.
    pub fn open(
        path_source: &Path,
        sheet_name: &str,
        dynamic_column_prefixes: &[String],
    ) -> Result<Self, FormatkiError> {
        if !path_source.exists() {
            return Err(FormatkiError::SourceNotFound(path_source.to_path_buf()));
        }

        let mut workbook: Xlsx<BufReader<File>> =
            open_workbook(path_source).map_err(|err: XlsxError| FormatkiError::SourceOpen {
                path: path_source.to_path_buf(),
                message: err.to_string(),
            })?;

        let l_sheet_names = workbook.sheet_names();
        let c_sheet_name = if l_sheet_names.iter().any(|c_name| c_name == sheet_name) {
            sheet_name.to_string()
        } else {
            let Some(c_first) = l_sheet_names.first() else {
                return Err(FormatkiError::SourceEmpty(path_source.to_path_buf()));
            };
            warn!(
                requested = sheet_name,
                used = c_first.as_str(),
                "Source sheet not found; using first sheet"
            );
            c_first.clone()
        };

        let headers = {
            let mut rows = stream_rows(&mut workbook, &c_sheet_name, path_source)?;
            loop {
                match rows.next() {
                    Some(Ok(row)) if row.is_blank() => continue,
                    Some(Ok(row)) => break row.cells,
                    Some(Err(err)) => {
                        return Err(FormatkiError::SourceOpen {
                            path: path_source.to_path_buf(),
                            message: err.to_string(),
                        });
                    }
                    None => return Err(FormatkiError::SourceEmpty(path_source.to_path_buf())),
                }
            }
        };

        Ok(Self {
            path_source: path_source.to_path_buf(),
            workbook,
            sheet_name: c_sheet_name,
            layout: derive_table_layout(headers, dynamic_column_prefixes),
        })
    }

    /// Worksheet actually read.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Header layout detected at open time.
    pub fn layout(&self) -> &SpecTableLayout {
        &self.layout
    }

    /// Header labels.
    pub fn headers(&self) -> &[String] {
        &self.layout.headers
    }

    /// Stream data rows (everything after the header row) in sheet order.
    ///
    /// Each call restarts the cell stream from the top of the sheet.
    pub fn rows(&mut self) -> Result<SourceRows<'_>, FormatkiError> {
        let mut rows = stream_rows(&mut self.workbook, &self.sheet_name, &self.path_source)?;
        loop {
            match rows.next() {
                Some(Ok(row)) if row.is_blank() => continue,
                Some(Ok(_)) | None => break,
                Some(Err(err)) => return Err(err),
            }
        }
        Ok(rows)
    }
}

fn stream_rows<'a>(
    workbook: &'a mut Xlsx<BufReader<File>>,
    sheet_name: &'a str,
    path_source: &Path,
) -> Result<SourceRows<'a>, FormatkiError> {
    let mut reader =
        workbook
            .worksheet_cells_reader(sheet_name)
            .map_err(|err| FormatkiError::SourceOpen {
                path: path_source.to_path_buf(),
                message: err.to_string(),
            })?;

    let next_cell: NextCellFn<'a> = Box::new(move || {
        Ok(reader.next_cell()?.map(|cell| {
            let (n_row, n_col) = cell.get_position();
            (n_row, n_col, derive_cell_text(cell.get_value()))
        }))
    });

    Ok(SourceRows {
        next_cell,
        cell_pending: None,
        if_done: false,
    })
}

/// Lazy, single-pass row sequence of one worksheet.
pub struct SourceRows<'a> {
    next_cell: NextCellFn<'a>,
    cell_pending: Option<SourceCell>,
    if_done: bool,
}

impl SourceRows<'_> {
    fn pull_cell(&mut self) -> Result<Option<SourceCell>, FormatkiError> {
        if let Some(cell) = self.cell_pending.take() {
            return Ok(Some(cell));
        }
        match (self.next_cell)() {
            Ok(cell) => Ok(cell),
            Err(err) => {
                self.if_done = true;
                Err(FormatkiError::SourceRead(err.to_string()))
            }
        }
    }
}

impl Iterator for SourceRows<'_> {
    type Item = Result<SpecSourceRow, FormatkiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.if_done {
            return None;
        }

        let (n_row, n_col, c_text) = match self.pull_cell() {
            Ok(Some(cell)) => cell,
            Ok(None) => {
                self.if_done = true;
                return None;
            }
            Err(err) => return Some(Err(err)),
        };

        let mut l_cells = Vec::new();
        place_cell(&mut l_cells, n_col, c_text);
        loop {
            match self.pull_cell() {
                Ok(Some((n_row_next, n_col_next, c_text_next))) if n_row_next == n_row => {
                    place_cell(&mut l_cells, n_col_next, c_text_next);
                }
                Ok(Some(cell)) => {
                    self.cell_pending = Some(cell);
                    break;
                }
                Ok(None) => {
                    self.if_done = true;
                    break;
                }
                Err(err) => return Some(Err(err)),
            }
        }

        debug!(n_row, n_cells = l_cells.len(), "Read source row");
        Some(Ok(SpecSourceRow::new(n_row, l_cells)))
    }
}

fn place_cell(cells: &mut Vec<String>, n_col: u32, text: String) {
    let n_idx = n_col as usize;
    if cells.len() <= n_idx {
        cells.resize(n_idx + 1, String::new());
    }
    cells[n_idx] = text;
}

/// Render one cell as cleaned text.
pub fn derive_cell_text(value: &DataRef<'_>) -> String {
    let c_raw = match value {
        DataRef::Empty => String::new(),
        DataRef::String(val) => val.clone(),
        DataRef::SharedString(val) => (*val).to_string(),
        DataRef::Int(val) => val.to_string(),
        DataRef::Float(val) => derive_float_text(*val),
        DataRef::Bool(val) => if *val { "True" } else { "False" }.to_string(),
        DataRef::DateTime(val) => match val.as_datetime() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => derive_float_text(val.as_f64()),
        },
        DataRef::DateTimeIso(val) | DataRef::DurationIso(val) => val.clone(),
        DataRef::Error(err) => err.to_string(),
        #[allow(unreachable_patterns)]
        _ => String::new(),
    };
    clean_cell_text(&c_raw)
}

fn derive_float_text(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        return format!("{}", x as i64);
    }
    x.to_string()
}
