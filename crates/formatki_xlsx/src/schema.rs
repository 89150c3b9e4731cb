//! Header-only schema detection: key columns and dynamic attribute columns.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::conf::{
    N_IDX_DYNAMIC_FALLBACK_END, N_IDX_DYNAMIC_FALLBACK_START, TUP_KEY_COLUMN_LABELS,
};
use crate::spec::{EnumKeyColumnsRule, SpecDynamicColumns, SpecKeyColumns, SpecTableLayout};
use crate::util::normalize_for_match;

/// Resolve the (group, sub-group, department) columns.
///
/// Headers `GT`, `KW` and `PION` (case-insensitive, trimmed) win when all three
/// exist; otherwise the first three physical columns are used, repeating the
/// last available one for narrower tables.
pub fn detect_key_columns(headers: &[String]) -> SpecKeyColumns {
    let mut dict_label_idx: BTreeMap<String, usize> = BTreeMap::new();
    for (n_idx, c_header) in headers.iter().enumerate() {
        dict_label_idx
            .entry(c_header.trim().to_lowercase())
            .or_insert(n_idx);
    }

    let [c_group, c_subgroup, c_department] = TUP_KEY_COLUMN_LABELS;
    if let (Some(idx_group), Some(idx_subgroup), Some(idx_department)) = (
        dict_label_idx.get(c_group),
        dict_label_idx.get(c_subgroup),
        dict_label_idx.get(c_department),
    ) {
        return SpecKeyColumns {
            idx_group: *idx_group,
            idx_subgroup: *idx_subgroup,
            idx_department: *idx_department,
            rule: EnumKeyColumnsRule::Named,
        };
    }

    let n_idx_last = headers.len().saturating_sub(1);
    SpecKeyColumns {
        idx_group: 0,
        idx_subgroup: usize::min(1, n_idx_last),
        idx_department: usize::min(2, n_idx_last),
        rule: EnumKeyColumnsRule::Positional,
    }
}

/// Resolve dynamic attribute column positions.
///
/// Every header whose normalized label starts with one of `prefixes` is taken;
/// when none does, positions `10..=25` clipped to the header width are used.
pub fn detect_dynamic_columns(headers: &[String], prefixes: &[String]) -> SpecDynamicColumns {
    let l_prefixes: Vec<String> = prefixes.iter().map(|c| normalize_for_match(c)).collect();
    let cols_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, c_header)| {
            let c_norm = normalize_for_match(c_header);
            l_prefixes
                .iter()
                .any(|c_prefix| !c_prefix.is_empty() && c_norm.starts_with(c_prefix.as_str()))
        })
        .map(|(n_idx, _)| n_idx)
        .collect();

    if !cols_idx.is_empty() {
        return SpecDynamicColumns {
            cols_idx,
            if_fallback: false,
        };
    }

    SpecDynamicColumns {
        cols_idx: (N_IDX_DYNAMIC_FALLBACK_START..=N_IDX_DYNAMIC_FALLBACK_END)
            .take_while(|n_idx| *n_idx < headers.len())
            .collect(),
        if_fallback: true,
    }
}

/// Detect key and dynamic columns of one opened table.
pub fn derive_table_layout(headers: Vec<String>, prefixes: &[String]) -> SpecTableLayout {
    let key_columns = detect_key_columns(&headers);
    let dynamic_columns = detect_dynamic_columns(&headers, prefixes);

    let derive_label = |idx: usize| headers.get(idx).map(String::as_str).unwrap_or("");
    match key_columns.rule {
        EnumKeyColumnsRule::Named => info!(
            group = derive_label(key_columns.idx_group),
            subgroup = derive_label(key_columns.idx_subgroup),
            department = derive_label(key_columns.idx_department),
            "Detected key columns by name"
        ),
        EnumKeyColumnsRule::Positional => warn!(
            group = derive_label(key_columns.idx_group),
            subgroup = derive_label(key_columns.idx_subgroup),
            department = derive_label(key_columns.idx_department),
            "Key columns not named GT/KW/PION; using first three columns"
        ),
    }
    let l_sample: Vec<&str> = dynamic_columns
        .cols_idx
        .iter()
        .take(8)
        .map(|idx| derive_label(*idx))
        .collect();
    info!(
        n_cols = dynamic_columns.cols_idx.len(),
        if_fallback = dynamic_columns.if_fallback,
        sample = ?l_sample,
        "Detected dynamic attribute columns"
    );

    SpecTableLayout {
        headers,
        key_columns,
        dynamic_columns,
    }
}
