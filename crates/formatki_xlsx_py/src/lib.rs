use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use formatki_xlsx::{
    FormatkiError, SourceTable, SpecBuildOptions, SpecBuildReport, SpecMatchCriterion,
    SpecSelection, SpecSheetReport, build_workbook, derive_data_structure, list_groups,
    list_subgroups, resolve_group_codes, sample_matching_rows,
};
use pyo3::exceptions::{PyFileNotFoundError, PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "formatki.xlsx.build.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SheetReport")]
#[derive(Debug, Clone)]
struct PySheetReport {
    #[pyo3(get)]
    sheet_name: String,
    #[pyo3(get)]
    group: String,
    #[pyo3(get)]
    subgroup: String,
    #[pyo3(get)]
    n_rows_matched: usize,
    #[pyo3(get)]
    dynamic_headers: Vec<String>,
    #[pyo3(get)]
    if_partial: bool,
}

impl From<SpecSheetReport> for PySheetReport {
    fn from(sheet: SpecSheetReport) -> Self {
        Self {
            sheet_name: sheet.sheet_name,
            group: sheet.group,
            subgroup: sheet.subgroup,
            n_rows_matched: sheet.n_rows_matched,
            dynamic_headers: sheet.dynamic_headers,
            if_partial: sheet.if_partial,
        }
    }
}

#[pyclass(name = "BuildReport")]
#[derive(Debug, Clone)]
struct PyBuildReport {
    #[pyo3(get)]
    file_out: String,
    #[pyo3(get)]
    file_name: String,
    #[pyo3(get)]
    found_any: bool,
    #[pyo3(get)]
    sheets: Vec<PySheetReport>,
    #[pyo3(get)]
    warnings: Vec<String>,
    summary: String,
}

impl From<SpecBuildReport> for PyBuildReport {
    fn from(report: SpecBuildReport) -> Self {
        Self {
            summary: report.to_string(),
            file_out: report.path_file_out.to_string_lossy().to_string(),
            file_name: report.file_name,
            found_any: report.found_any,
            sheets: report.sheets.into_iter().map(PySheetReport::from).collect(),
            warnings: report.warnings,
        }
    }
}

#[pymethods]
impl PyBuildReport {
    #[getter]
    fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    #[getter]
    fn n_rows_matched(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.n_rows_matched).sum()
    }

    fn __str__(&self) -> String {
        self.summary.clone()
    }
}

fn map_formatki_error(err: FormatkiError) -> PyErr {
    match err {
        FormatkiError::SourceNotFound(_) => PyFileNotFoundError::new_err(err.to_string()),
        FormatkiError::SourceOpen { .. }
        | FormatkiError::SourceRead(_)
        | FormatkiError::Persist { .. } => PyOSError::new_err(err.to_string()),
        FormatkiError::SourceEmpty(_) | FormatkiError::InvalidSelection(_) => {
            PyValueError::new_err(err.to_string())
        }
        FormatkiError::SheetWrite { .. } => PyRuntimeError::new_err(err.to_string()),
    }
}

fn derive_build_options(sheet_source: Option<String>) -> SpecBuildOptions {
    let mut cfg_options = SpecBuildOptions::default();
    if let Some(val) = sheet_source {
        cfg_options.sheet_source = val;
    }
    cfg_options
}

fn open_table(file_source: &Path, options: &SpecBuildOptions) -> Result<SourceTable, FormatkiError> {
    SourceTable::open(
        file_source,
        &options.sheet_source,
        &options.dynamic_column_prefixes,
    )
}

#[pyfunction(name = "build_workbook")]
#[pyo3(signature = (file_source, dir_out, department, groups, subgroups, sheet_source = None))]
fn build_workbook_py(
    py: Python<'_>,
    file_source: String,
    dir_out: String,
    department: String,
    groups: Vec<String>,
    subgroups: Vec<String>,
    sheet_source: Option<String>,
) -> PyResult<PyBuildReport> {
    let cfg_options = derive_build_options(sheet_source);
    let selection = SpecSelection::new(department, groups, subgroups);
    let report = py.allow_threads(|| {
        build_workbook(
            &PathBuf::from(file_source),
            &PathBuf::from(dir_out),
            &selection,
            &cfg_options,
        )
    });
    let report = report.map_err(map_formatki_error)?;
    Ok(PyBuildReport::from(report))
}

#[pyfunction(name = "get_data_structure")]
#[pyo3(signature = (file_source, sheet_source = None))]
fn get_data_structure_py(
    py: Python<'_>,
    file_source: String,
    sheet_source: Option<String>,
) -> PyResult<BTreeMap<String, BTreeMap<String, Vec<String>>>> {
    let cfg_options = derive_build_options(sheet_source);
    let dict_structure = py
        .allow_threads(|| {
            let mut table = open_table(Path::new(&file_source), &cfg_options)?;
            derive_data_structure(&mut table)
        })
        .map_err(map_formatki_error)?;

    Ok(dict_structure
        .into_iter()
        .map(|(c_department, dict_groups)| {
            let dict_groups = dict_groups
                .into_iter()
                .map(|(c_group, set_subgroups)| (c_group, set_subgroups.into_iter().collect()))
                .collect();
            (c_department, dict_groups)
        })
        .collect())
}

#[pyfunction(name = "get_groups")]
#[pyo3(signature = (file_source, department, sheet_source = None))]
fn get_groups_py(
    py: Python<'_>,
    file_source: String,
    department: String,
    sheet_source: Option<String>,
) -> PyResult<Vec<String>> {
    let cfg_options = derive_build_options(sheet_source);
    py.allow_threads(|| {
        let mut table = open_table(Path::new(&file_source), &cfg_options)?;
        list_groups(&mut table, &department)
    })
    .map_err(map_formatki_error)
}

#[pyfunction(name = "get_subgroups")]
#[pyo3(signature = (file_source, groups, sheet_source = None))]
fn get_subgroups_py(
    py: Python<'_>,
    file_source: String,
    groups: Vec<String>,
    sheet_source: Option<String>,
) -> PyResult<Vec<String>> {
    let cfg_options = derive_build_options(sheet_source);
    py.allow_threads(|| {
        let mut table = open_table(Path::new(&file_source), &cfg_options)?;
        list_subgroups(&mut table, &groups)
    })
    .map_err(map_formatki_error)
}

#[pyfunction(name = "resolve_group_codes")]
#[pyo3(signature = (file_source, department, raw, sheet_source = None))]
fn resolve_group_codes_py(
    py: Python<'_>,
    file_source: String,
    department: String,
    raw: String,
    sheet_source: Option<String>,
) -> PyResult<Vec<String>> {
    let cfg_options = derive_build_options(sheet_source);
    py.allow_threads(|| {
        let mut table = open_table(Path::new(&file_source), &cfg_options)?;
        resolve_group_codes(&mut table, &department, &raw)
    })
    .map_err(map_formatki_error)
}

/// Returns `(n_rows_matched, rows)` where each row is a list of `(header, value)`.
#[pyfunction(name = "debug_rows")]
#[pyo3(signature = (file_source, department, group, subgroup, n_rows_max = 10, sheet_source = None))]
#[allow(clippy::too_many_arguments)]
fn debug_rows_py(
    py: Python<'_>,
    file_source: String,
    department: String,
    group: String,
    subgroup: String,
    n_rows_max: usize,
    sheet_source: Option<String>,
) -> PyResult<(usize, Vec<Vec<(String, String)>>)> {
    let cfg_options = derive_build_options(sheet_source);
    let criterion = SpecMatchCriterion::new(&department, &group, &subgroup);
    let sample = py
        .allow_threads(|| {
            let mut table = open_table(Path::new(&file_source), &cfg_options)?;
            sample_matching_rows(&mut table, &criterion, n_rows_max)
        })
        .map_err(map_formatki_error)?;
    Ok((sample.n_rows_matched, sample.rows))
}

#[pymodule]
fn _formatki_xlsx_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySheetReport>()?;
    module.add_class::<PyBuildReport>()?;
    module.add_function(wrap_pyfunction!(build_workbook_py, module)?)?;
    module.add_function(wrap_pyfunction!(get_data_structure_py, module)?)?;
    module.add_function(wrap_pyfunction!(get_groups_py, module)?)?;
    module.add_function(wrap_pyfunction!(get_subgroups_py, module)?)?;
    module.add_function(wrap_pyfunction!(resolve_group_codes_py, module)?)?;
    module.add_function(wrap_pyfunction!(debug_rows_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
