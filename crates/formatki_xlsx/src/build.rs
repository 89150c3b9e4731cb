//! Top-level workbook build: one sheet per requested pair plus instructions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::source::SourceTable;
use crate::spec::{FormatkiError, SpecBuildOptions, SpecBuildReport, SpecSelection, SpecSheetOutcome};
use crate::util::{derive_output_file_name, normalize_for_match};
use crate::writer::TemplateWriter;

/// What a validated selection asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumBuildPlan {
    /// One sheet per `(group, sub-group)` pair.
    Pairs(SpecSelection),
    /// One sheet with every row of the department.
    WholeDepartment(String),
}

/// Validate `selection` and decide which sheets it produces.
///
/// Blank group and sub-group entries are dropped. A selection without groups
/// is only valid for configured whole-department names.
pub fn plan_build(
    selection: &SpecSelection,
    options: &SpecBuildOptions,
) -> Result<EnumBuildPlan, FormatkiError> {
    let c_department = selection.department.trim();
    if c_department.is_empty() {
        return Err(FormatkiError::InvalidSelection(
            "department must not be empty".to_string(),
        ));
    }

    let derive_non_blank = |values: &[String]| -> Vec<String> {
        values
            .iter()
            .map(|c_value| c_value.trim())
            .filter(|c_value| !c_value.is_empty())
            .map(ToString::to_string)
            .collect()
    };
    let groups = derive_non_blank(&selection.groups);
    let subgroups = derive_non_blank(&selection.subgroups);

    if groups.is_empty() {
        let c_department_norm = normalize_for_match(c_department);
        let if_whole_department = options
            .whole_department_names
            .iter()
            .any(|c_name| normalize_for_match(c_name) == c_department_norm);
        if if_whole_department {
            return Ok(EnumBuildPlan::WholeDepartment(c_department.to_string()));
        }
        return Err(FormatkiError::InvalidSelection(format!(
            "no groups requested for department {c_department:?}"
        )));
    }
    if subgroups.is_empty() {
        return Err(FormatkiError::InvalidSelection(
            "no sub-groups requested".to_string(),
        ));
    }

    Ok(EnumBuildPlan::Pairs(SpecSelection::new(
        c_department,
        groups,
        subgroups,
    )))
}

/// Build the template workbook into `dir_out` under a generated name.
///
/// The name embeds the department and the local time, see
/// [`derive_output_file_name`].
pub fn build_workbook(
    path_source: &Path,
    dir_out: &Path,
    selection: &SpecSelection,
    options: &SpecBuildOptions,
) -> Result<SpecBuildReport, FormatkiError> {
    let file_name = derive_output_file_name(&selection.department, Local::now().naive_local());
    build_workbook_to(path_source, &dir_out.join(file_name), selection, options)
}

/// Build the template workbook at an explicit output path.
///
/// Source-open and persistence failures abort the build; read and write
/// failures inside one sheet are logged and kept as report warnings, the
/// partial sheet stays in the report, and the next sheet is processed.
pub fn build_workbook_to(
    path_source: &Path,
    path_file_out: &Path,
    selection: &SpecSelection,
    options: &SpecBuildOptions,
) -> Result<SpecBuildReport, FormatkiError> {
    let plan = plan_build(selection, options)?;
    if !path_source.exists() {
        return Err(FormatkiError::SourceNotFound(path_source.to_path_buf()));
    }
    if let Some(dir_out) = path_file_out.parent()
        && !dir_out.as_os_str().is_empty()
    {
        fs::create_dir_all(dir_out).map_err(|err| FormatkiError::Persist {
            path: dir_out.to_path_buf(),
            message: err.to_string(),
        })?;
    }

    let mut report = SpecBuildReport {
        path_file_out: path_file_out.to_path_buf(),
        file_name: path_file_out
            .file_name()
            .map(|c_name| c_name.to_string_lossy().to_string())
            .unwrap_or_default(),
        ..Default::default()
    };
    let mut writer = TemplateWriter::new(PathBuf::from(path_file_out), options);

    match &plan {
        EnumBuildPlan::Pairs(selection) => {
            info!(
                department = selection.department.as_str(),
                n_groups = selection.groups.len(),
                n_subgroups = selection.subgroups.len(),
                "Building group sheets"
            );
            for (group, subgroup) in selection.pairs() {
                let mut table = open_source(path_source, options)?;
                let res_sheet = writer.write_group_sheet(
                    &mut table,
                    &selection.department,
                    group,
                    subgroup,
                    options,
                );
                record_sheet(&mut report, res_sheet, &format!("{group} / {subgroup}"))?;
            }
        }
        EnumBuildPlan::WholeDepartment(department) => {
            info!(department = department.as_str(), "Building whole-department sheet");
            let mut table = open_source(path_source, options)?;
            let res_sheet = writer.write_department_sheet(&mut table, department, options);
            record_sheet(&mut report, res_sheet, department)?;
        }
    }

    if let Err(err) = writer.write_instructions_sheet(options) {
        if err.is_fatal() {
            return Err(err);
        }
        warn!(error = %err, "Instructions sheet failed");
        report.warn(format!("[{}] {err}", options.instructions_sheet_name));
    }
    writer.close()?;

    report.found_any = report.sheets.iter().any(|sheet| sheet.n_rows_matched > 0);
    info!(
        file = %report.path_file_out.display(),
        found_any = report.found_any,
        n_sheets = report.sheets.len(),
        n_warnings = report.warnings.len(),
        "Workbook saved"
    );
    Ok(report)
}

fn open_source(path_source: &Path, options: &SpecBuildOptions) -> Result<SourceTable, FormatkiError> {
    SourceTable::open(
        path_source,
        &options.sheet_source,
        &options.dynamic_column_prefixes,
    )
}

fn record_sheet(
    report: &mut SpecBuildReport,
    res_sheet: Result<SpecSheetOutcome, FormatkiError>,
    context: &str,
) -> Result<(), FormatkiError> {
    match res_sheet {
        Ok(SpecSheetOutcome { report: sheet, error }) => {
            if let Some(err) = error {
                warn!(
                    context,
                    sheet = sheet.sheet_name.as_str(),
                    n_rows_matched = sheet.n_rows_matched,
                    error = %err,
                    "Sheet left partial after failure"
                );
                report.warn(format!("[{context}] {err}"));
            }
            report.sheets.push(sheet);
            Ok(())
        }
        Err(err) if !err.is_fatal() => {
            warn!(context, error = %err, "Sheet skipped after failure");
            report.warn(format!("[{context}] {err}"));
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        corrupt_shared_string_cell, read_sheet_names, read_sheet_rows, write_source_workbook,
    };

    fn to_strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn write_base(path: &Path) {
        write_source_workbook(
            path,
            "Arkusz1",
            &[
                vec!["GT", "KW", "PION", "EAN", "Nr. Art dostawcy", "Punktor 1", "Punktor 2"],
                vec!["1100 Nails", "Nail Sets", "Technika", "123", "A-1", "Power [W]: 500", ""],
                vec!["1100 Nails", "A:B", "Technika", "124", "A-2", "", ""],
                vec!["1200 Screws", "Nail Sets", "Technika", "125", "A-3", "Dł. [mm]: 40", "Power [W]: 500"],
                vec!["1200 Screws", "A/B", "Technika", "126", "A-4", "", ""],
                vec!["10 Lampy", "LED", "Oświetlenie", "127", "A-5", "", ""],
            ],
        );
    }

    #[test]
    fn test_plan_build_validates_selection() {
        let options = SpecBuildOptions::default();

        let result = plan_build(&SpecSelection::new("  ", vec![], vec![]), &options);
        assert!(matches!(result, Err(FormatkiError::InvalidSelection(_))));

        let result = plan_build(&SpecSelection::new("Technika", vec![], vec![]), &options);
        assert!(matches!(result, Err(FormatkiError::InvalidSelection(_))));

        let result = plan_build(
            &SpecSelection::new("Technika", to_strings(&["1100 Nails"]), to_strings(&[" "])),
            &options,
        );
        assert!(matches!(result, Err(FormatkiError::InvalidSelection(_))));

        let plan = plan_build(&SpecSelection::new(" oświetlenie", vec![], vec![]), &options)
            .expect("whole department");
        assert_eq!(plan, EnumBuildPlan::WholeDepartment("oświetlenie".to_string()));

        let plan = plan_build(
            &SpecSelection::new("Technika", to_strings(&[" G ", ""]), to_strings(&["K"])),
            &options,
        )
        .expect("pairs");
        assert_eq!(
            plan,
            EnumBuildPlan::Pairs(SpecSelection::new(
                "Technika",
                to_strings(&["G"]),
                to_strings(&["K"])
            ))
        );
    }

    #[test]
    fn test_build_writes_one_sheet_per_pair_in_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_base(&path_source);
        let dir_out = tmp.path().join("tmp");

        let selection = SpecSelection::new(
            "Technika",
            to_strings(&["1100 Nails", "1200 Screws"]),
            to_strings(&["Nail Sets", "A:B"]),
        );
        let report = build_workbook(&path_source, &dir_out, &selection, &SpecBuildOptions::default())
            .expect("build");

        assert!(report.found_any);
        assert!(report.warnings.is_empty());
        assert!(report.file_name.starts_with("Formatki-Technika-"));
        assert!(report.file_name.ends_with(".xlsx"));
        assert_eq!(report.path_file_out, dir_out.join(&report.file_name));
        assert_eq!(
            report
                .sheets
                .iter()
                .map(|sheet| (sheet.sheet_name.as_str(), sheet.n_rows_matched))
                .collect::<Vec<_>>(),
            vec![("Nail Sets", 1), ("A B", 1), ("Nail Sets_1", 1), ("A B_1", 0)]
        );
        assert_eq!(
            read_sheet_names(&report.path_file_out),
            to_strings(&["Nail Sets", "A B", "Nail Sets_1", "A B_1", "Wymagania"])
        );

        let rows = read_sheet_rows(&report.path_file_out, "Nail Sets_1");
        assert_eq!(rows[0], to_strings(&["Technika", "1200 Screws"]));
        assert_eq!(rows[1], to_strings(&["Nail Sets"]));
        assert_eq!(
            rows[2][6..],
            to_strings(&["Dł. [mm]: 40", "Power [W]: 500"])[..]
        );
        assert_eq!(rows[3][..2], to_strings(&["125", "A-3"])[..]);
        assert_eq!(rows.len(), 4);

        let rows = read_sheet_rows(&report.path_file_out, "A B");
        assert_eq!(rows[2][6..], crate::conf::derive_default_fallback_labels()[..]);

        let rows = read_sheet_rows(&report.path_file_out, "A B_1");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], to_strings(&["Brak pasujących wierszy"]));
    }

    #[test]
    fn test_build_without_matches_reports_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_base(&path_source);
        let path_out = tmp.path().join("out").join("formatki.xlsx");

        let selection = SpecSelection::new(
            "Technika",
            to_strings(&["9999 Missing"]),
            to_strings(&["Nothing"]),
        );
        let report =
            build_workbook_to(&path_source, &path_out, &selection, &SpecBuildOptions::default())
                .expect("build");

        assert!(!report.found_any);
        assert_eq!(report.sheets.len(), 1);
        assert_eq!(report.file_name, "formatki.xlsx");
        assert!(path_out.exists());
        assert_eq!(read_sheet_rows(&path_out, "Nothing").len(), 3);
    }

    #[test]
    fn test_build_whole_department_sheet() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_base(&path_source);
        let path_out = tmp.path().join("dept.xlsx");

        let selection = SpecSelection::new("Oświetlenie", vec![], vec![]);
        let report =
            build_workbook_to(&path_source, &path_out, &selection, &SpecBuildOptions::default())
                .expect("build");

        assert!(report.found_any);
        assert_eq!(
            read_sheet_names(&path_out),
            to_strings(&["Oświetlenie", "Wymagania"])
        );
        assert_eq!(
            read_sheet_rows(&path_out, "Oświetlenie"),
            vec![
                to_strings(&["EAN", "Nr. Art dostawcy", "Punktor 1", "Punktor 2"]),
                to_strings(&["127", "A-5"]),
            ]
        );
    }

    #[test]
    fn test_build_missing_source_is_fatal_without_output() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir_out = tmp.path().join("tmp");
        let selection = SpecSelection::new("Technika", to_strings(&["G"]), to_strings(&["K"]));

        let result = build_workbook(
            &tmp.path().join("missing.xlsx"),
            &dir_out,
            &selection,
            &SpecBuildOptions::default(),
        );

        assert!(matches!(result, Err(FormatkiError::SourceNotFound(_))));
        assert!(!dir_out.exists());
    }

    #[test]
    fn test_build_read_fault_keeps_partial_sheets_and_continues() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_source_workbook(
            &path_source,
            "Arkusz1",
            &[
                vec!["GT", "KW", "PION", "EAN"],
                vec!["g", "k", "Technika", "1"],
                vec!["g", "k2", "Technika", "2"],
                vec!["g", "k", "Technika", "3"],
            ],
        );
        corrupt_shared_string_cell(&path_source, "D4");
        let path_out = tmp.path().join("partial.xlsx");

        let selection = SpecSelection::new("Technika", to_strings(&["g"]), to_strings(&["k", "k2"]));
        let report =
            build_workbook_to(&path_source, &path_out, &selection, &SpecBuildOptions::default())
                .expect("build");

        assert!(report.found_any);
        assert_eq!(
            report
                .sheets
                .iter()
                .map(|sheet| (sheet.sheet_name.as_str(), sheet.n_rows_matched, sheet.if_partial))
                .collect::<Vec<_>>(),
            vec![("k", 1, true), ("k2", 1, true)]
        );
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].starts_with("[g / k] "));
        assert!(report.warnings[1].starts_with("[g / k2] "));
        assert_eq!(
            read_sheet_names(&path_out),
            to_strings(&["k", "k2", "Wymagania"])
        );
        assert_eq!(read_sheet_rows(&path_out, "k")[3], to_strings(&["1"]));
        assert_eq!(read_sheet_rows(&path_out, "k2")[3], to_strings(&["2"]));
    }

    #[test]
    fn test_build_persist_failure_is_fatal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path_source = tmp.path().join("baza.xlsx");
        write_base(&path_source);
        let path_out = tmp.path().join("taken.xlsx");
        fs::create_dir_all(&path_out).expect("dir in place of output");

        let selection = SpecSelection::new(
            "Technika",
            to_strings(&["1100 Nails"]),
            to_strings(&["Nail Sets"]),
        );
        let result =
            build_workbook_to(&path_source, &path_out, &selection, &SpecBuildOptions::default());

        match result {
            Err(FormatkiError::Persist { path, .. }) => assert_eq!(path, path_out),
            other => panic!("expected persist failure, got {other:?}"),
        }
    }
}
