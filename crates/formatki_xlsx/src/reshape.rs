//! Dynamic header derivation and row reshaping into the output layout.

use std::collections::BTreeSet;

use crate::spec::{EnumDynamicHeadersSource, SpecDynamicHeaders, SpecSourceRow};
use crate::util::find_header_idx;

/// Fix the dynamic header labels of one sheet from its first matching row.
///
/// Non-empty trimmed cells at `cols_idx_dynamic` are kept in row order with
/// duplicates dropped; `fallback_labels` is returned verbatim when none is left.
pub fn derive_dynamic_headers(
    row: &SpecSourceRow,
    cols_idx_dynamic: &[usize],
    fallback_labels: &[String],
) -> SpecDynamicHeaders {
    let mut set_seen: BTreeSet<&str> = BTreeSet::new();
    let labels: Vec<String> = cols_idx_dynamic
        .iter()
        .filter_map(|idx| row.get(*idx))
        .map(str::trim)
        .filter(|c_value| !c_value.is_empty() && set_seen.insert(*c_value))
        .map(ToString::to_string)
        .collect();

    if labels.is_empty() {
        return SpecDynamicHeaders {
            labels: fallback_labels.to_vec(),
            source: EnumDynamicHeadersSource::Fallback,
        };
    }
    SpecDynamicHeaders {
        labels,
        source: EnumDynamicHeadersSource::FirstRow,
    }
}

/// Output layout of one group sheet, resolved once against the source headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRowShape {
    cols_idx_base: Vec<Option<usize>>,
    dynamic_labels: Vec<String>,
    cols_idx_dynamic: Vec<usize>,
}

impl SpecRowShape {
    /// Resolve base label positions case-insensitively against `headers`.
    pub fn new(
        base_labels: &[String],
        dynamic_labels: &[String],
        headers: &[String],
        cols_idx_dynamic: &[usize],
    ) -> Self {
        Self {
            cols_idx_base: base_labels
                .iter()
                .map(|label| find_header_idx(headers, label))
                .collect(),
            dynamic_labels: dynamic_labels.to_vec(),
            cols_idx_dynamic: cols_idx_dynamic.to_vec(),
        }
    }

    /// Output row width.
    pub fn width(&self) -> usize {
        self.cols_idx_base.len() + self.dynamic_labels.len()
    }

    /// Map one source row onto base columns followed by dynamic columns.
    ///
    /// A dynamic value is the first dynamic cell whose trimmed text equals the
    /// label exactly; anything unresolved is an empty string.
    pub fn reshape(&self, row: &SpecSourceRow) -> Vec<String> {
        let mut l_out = Vec::with_capacity(self.width());
        l_out.extend(
            self.cols_idx_base
                .iter()
                .map(|idx| idx.map_or("", |idx| row.cell(idx)).to_string()),
        );
        l_out.extend(self.dynamic_labels.iter().map(|label| {
            self.cols_idx_dynamic
                .iter()
                .filter_map(|idx| row.get(*idx))
                .find(|c_value| c_value.trim() == label.as_str())
                .unwrap_or("")
                .to_string()
        }));
        l_out
    }
}

/// One-off form of [`SpecRowShape::reshape`].
pub fn reshape_row(
    row: &SpecSourceRow,
    base_labels: &[String],
    dynamic_labels: &[String],
    headers: &[String],
    cols_idx_dynamic: &[usize],
) -> Vec<String> {
    SpecRowShape::new(base_labels, dynamic_labels, headers, cols_idx_dynamic).reshape(row)
}

/// Source positions kept in a whole-department sheet: every header not in
/// `dropped_labels` (exact match).
pub fn plan_department_columns(headers: &[String], dropped_labels: &[String]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, c_header)| !dropped_labels.iter().any(|label| label == *c_header))
        .map(|(n_idx, _)| n_idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn to_row(cells: &[&str]) -> SpecSourceRow {
        SpecSourceRow::new(1, to_strings(cells))
    }

    #[test]
    fn test_dynamic_headers_from_first_row_trimmed_and_deduplicated() {
        let row = to_row(&["G", "K", "D", " Moc: 5 ", "", "Kolor: biały", "Moc: 5", "x"]);
        let headers = derive_dynamic_headers(&row, &[3, 4, 5, 6, 20], &to_strings(&["F"]));

        assert_eq!(headers.source, EnumDynamicHeadersSource::FirstRow);
        assert_eq!(headers.labels, to_strings(&["Moc: 5", "Kolor: biały"]));
    }

    #[test]
    fn test_dynamic_headers_fall_back_when_all_empty() {
        let fallback = to_strings(&["Moc [W]:", "Liczba biegów:"]);
        let row = to_row(&["G", "K", "D", "  ", ""]);
        let headers = derive_dynamic_headers(&row, &[3, 4, 9], &fallback);

        assert_eq!(headers.source, EnumDynamicHeadersSource::Fallback);
        assert_eq!(headers.labels, fallback);
    }

    #[test]
    fn test_reshape_copies_self_labelled_dynamic_cell() {
        let headers = to_strings(&["GT", "KW", "PION", "EAN", "Punktor1"]);
        let row = to_row(&["1100 Nails", "Nail Sets", "Technika", "123", "Power [W]: 500"]);
        let dynamic = derive_dynamic_headers(&row, &[4], &[]);
        assert_eq!(dynamic.labels, to_strings(&["Power [W]: 500"]));

        let out = reshape_row(
            &row,
            &to_strings(&["ean", "Nr. Art dostawcy"]),
            &dynamic.labels,
            &headers,
            &[4],
        );
        assert_eq!(out, to_strings(&["123", "", "Power [W]: 500"]));
    }

    #[test]
    fn test_reshape_width_is_stable_across_rows() {
        let headers = to_strings(&["GT", "KW", "PION", "EAN", "P1", "P2"]);
        let shape = SpecRowShape::new(
            &to_strings(&["EAN"]),
            &to_strings(&["A: 1", "B: 2"]),
            &headers,
            &[4, 5],
        );

        let l_rows = [
            to_row(&["g", "k", "d", "1", "B: 2", "A: 1"]),
            to_row(&["g", "k", "d", "2", "C: 3"]),
            to_row(&["g"]),
        ];
        let l_out: Vec<Vec<String>> = l_rows.iter().map(|row| shape.reshape(row)).collect();

        assert!(l_out.iter().all(|out| out.len() == shape.width()));
        assert_eq!(l_out[0], to_strings(&["1", "A: 1", "B: 2"]));
        assert_eq!(l_out[1], to_strings(&["2", "", ""]));
        assert_eq!(l_out[2], to_strings(&["", "", ""]));
    }

    #[test]
    fn test_plan_department_columns_drops_exact_headers() {
        let headers = to_strings(&["GT", "EAN", "KW", "pion", "PION", "Podział", "Opis"]);
        let dropped = to_strings(&["GT", "KW", "PION", "Podział"]);

        assert_eq!(plan_department_columns(&headers, &dropped), vec![1, 3, 6]);
    }
}
