//! Read-only selection queries over the source table.
//!
//! Every query streams the table once from the top; values are returned as
//! cleaned cell text while comparisons go through [`normalize_for_match`].

use std::collections::{BTreeMap, BTreeSet};

use crate::scan::scan_matching_rows;
use crate::source::SourceTable;
use crate::spec::{
    DataStructure, FormatkiError, SpecColumnInspection, SpecMatchCriterion, SpecRowSample,
};
use crate::util::normalize_for_match;

/// Department -> group -> sub-groups of every row carrying all three keys.
pub fn derive_data_structure(table: &mut SourceTable) -> Result<DataStructure, FormatkiError> {
    let key_columns = table.layout().key_columns.clone();
    let mut dict_structure: DataStructure = BTreeMap::new();

    for res_row in table.rows()? {
        let row = res_row?;
        let c_department = row.cell(key_columns.idx_department);
        let c_group = row.cell(key_columns.idx_group);
        let c_subgroup = row.cell(key_columns.idx_subgroup);
        if c_department.is_empty() || c_group.is_empty() || c_subgroup.is_empty() {
            continue;
        }
        dict_structure
            .entry(c_department.to_string())
            .or_default()
            .entry(c_group.to_string())
            .or_default()
            .insert(c_subgroup.to_string());
    }
    Ok(dict_structure)
}

/// Sorted distinct groups of `department`.
pub fn list_groups(table: &mut SourceTable, department: &str) -> Result<Vec<String>, FormatkiError> {
    let key_columns = table.layout().key_columns.clone();
    let criterion = SpecMatchCriterion::for_department(department);

    let mut set_groups = BTreeSet::new();
    for res_row in scan_matching_rows(table.rows()?, &key_columns, &criterion) {
        let row = res_row?;
        let c_group = row.cell(key_columns.idx_group);
        if !c_group.is_empty() {
            set_groups.insert(c_group.to_string());
        }
    }
    Ok(set_groups.into_iter().collect())
}

/// Sorted distinct sub-groups of any of `groups`, across departments.
pub fn list_subgroups(
    table: &mut SourceTable,
    groups: &[String],
) -> Result<Vec<String>, FormatkiError> {
    let key_columns = table.layout().key_columns.clone();
    let set_groups_norm: BTreeSet<String> = groups
        .iter()
        .filter(|c_group| !c_group.trim().is_empty())
        .map(|c_group| normalize_for_match(c_group))
        .collect();
    if set_groups_norm.is_empty() {
        return Ok(Vec::new());
    }

    let mut set_subgroups = BTreeSet::new();
    for res_row in table.rows()? {
        let row = res_row?;
        let Some(c_group) = row.get(key_columns.idx_group) else {
            continue;
        };
        let c_subgroup = row.cell(key_columns.idx_subgroup);
        if !c_subgroup.is_empty() && set_groups_norm.contains(&normalize_for_match(c_group)) {
            set_subgroups.insert(c_subgroup.to_string());
        }
    }
    Ok(set_subgroups.into_iter().collect())
}

/// Expand comma-separated group code prefixes into full group values of
/// `department`.
///
/// `"11, 12"` resolves to every group of the department starting with `11`
/// or `12`, case-insensitively.
pub fn resolve_group_codes(
    table: &mut SourceTable,
    department: &str,
    raw: &str,
) -> Result<Vec<String>, FormatkiError> {
    let l_codes: Vec<String> = raw
        .split(',')
        .map(|c_code| c_code.trim().to_lowercase())
        .filter(|c_code| !c_code.is_empty())
        .collect();
    if l_codes.is_empty() {
        return Ok(Vec::new());
    }

    let l_groups = list_groups(table, department)?;
    Ok(l_groups
        .into_iter()
        .filter(|c_group| {
            let c_group_lower = c_group.to_lowercase();
            l_codes.iter().any(|c_code| c_group_lower.starts_with(c_code.as_str()))
        })
        .collect())
}

/// Count rows matching `criterion` and keep the first `n_max` of them.
pub fn sample_matching_rows(
    table: &mut SourceTable,
    criterion: &SpecMatchCriterion,
    n_max: usize,
) -> Result<SpecRowSample, FormatkiError> {
    let layout = table.layout().clone();
    let mut sample = SpecRowSample::default();

    for res_row in scan_matching_rows(table.rows()?, &layout.key_columns, criterion) {
        let row = res_row?;
        sample.n_rows_matched += 1;
        if sample.rows.len() < n_max {
            sample.rows.push(
                layout
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(n_idx, c_header)| (c_header.clone(), row.cell(n_idx).to_string()))
                    .collect(),
            );
        }
    }
    Ok(sample)
}

/// Detected layout plus the first `n_rows` data rows.
pub fn inspect_columns(
    table: &mut SourceTable,
    n_rows: usize,
) -> Result<SpecColumnInspection, FormatkiError> {
    let rows = table
        .rows()?
        .take(n_rows)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SpecColumnInspection {
        sheet_name: table.sheet_name().to_string(),
        layout: table.layout().clone(),
        rows,
    })
}
