//! Fixtures shared by unit tests: source workbook generation and output read-back.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use calamine::{Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Workbook;

use crate::conf::TUP_DYNAMIC_COLUMN_PREFIXES;

pub fn default_prefixes() -> Vec<String> {
    TUP_DYNAMIC_COLUMN_PREFIXES
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Write a one-sheet workbook; empty strings leave the cell unwritten.
pub fn write_source_workbook(path: &Path, sheet_name: &str, rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).expect("sheet name");
    for (n_row, row) in rows.iter().enumerate() {
        for (n_col, c_value) in row.iter().enumerate() {
            if c_value.is_empty() {
                continue;
            }
            worksheet
                .write_string(n_row as u32, n_col as u16, *c_value)
                .expect("write cell");
        }
    }
    workbook.save(path).expect("save source workbook");
}

/// Replace the shared-string index of `cell_ref` in the first sheet with a
/// non-numeric value, so streaming readers fail when they reach that cell.
pub fn corrupt_shared_string_cell(path: &Path, cell_ref: &str) {
    let mut archive = zip::ZipArchive::new(File::open(path).expect("open xlsx")).expect("read zip");
    let mut l_entries: Vec<(String, Vec<u8>)> = Vec::new();
    for n_idx in 0..archive.len() {
        let mut entry = archive.by_index(n_idx).expect("zip entry");
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).expect("read entry");
        l_entries.push((entry.name().to_string(), buf));
    }

    let mut if_replaced = false;
    for (c_name, buf) in &mut l_entries {
        if c_name != "xl/worksheets/sheet1.xml" {
            continue;
        }
        let c_xml = String::from_utf8(std::mem::take(buf)).expect("utf8 sheet xml");
        let n_cell = c_xml
            .find(&format!("r=\"{cell_ref}\""))
            .expect("cell present");
        let n_start = n_cell + c_xml[n_cell..].find("<v>").expect("cell value") + "<v>".len();
        let n_end = n_start + c_xml[n_start..].find("</v>").expect("cell value end");
        *buf = format!("{}notanumber{}", &c_xml[..n_start], &c_xml[n_end..]).into_bytes();
        if_replaced = true;
    }
    assert!(if_replaced, "sheet1.xml not found");
    drop(archive);

    fs::remove_file(path).expect("remove original");
    let mut writer = zip::ZipWriter::new(File::create(path).expect("create xlsx"));
    let options = zip::write::SimpleFileOptions::default();
    for (c_name, buf) in l_entries {
        writer.start_file(c_name, options).expect("start entry");
        writer.write_all(&buf).expect("write entry");
    }
    writer.finish().expect("finish zip");
}

/// Sheet names of a workbook in order.
pub fn read_sheet_names(path: &Path) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook(path).expect("open workbook");
    workbook.sheet_names()
}

/// Cell texts of one sheet by absolute position, trailing empty cells dropped.
pub fn read_sheet_rows(path: &Path, sheet_name: &str) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("open workbook");
    let range = workbook.worksheet_range(sheet_name).expect("sheet range");
    let Some((n_row_end, n_col_end)) = range.end() else {
        return Vec::new();
    };

    (0..=n_row_end)
        .map(|n_row| {
            let mut l_cells: Vec<String> = (0..=n_col_end)
                .map(|n_col| {
                    range
                        .get_value((n_row, n_col))
                        .map(ToString::to_string)
                        .unwrap_or_default()
                })
                .collect();
            while l_cells.last().is_some_and(String::is_empty) {
                l_cells.pop();
            }
            l_cells
        })
        .collect()
}
