//! Row matching over a streamed source table.

use crate::spec::{FormatkiError, SpecKeyColumns, SpecMatchCriterion, SpecSourceRow};
use crate::util::normalize_for_match;

/// Whether `row` satisfies every key set in `criterion`.
///
/// A key column missing from the row never matches.
pub fn is_row_match(
    row: &SpecSourceRow,
    key_columns: &SpecKeyColumns,
    criterion: &SpecMatchCriterion,
) -> bool {
    let is_key_match = |idx: usize, expected: &Option<String>| match expected {
        None => true,
        Some(c_expected) => row
            .get(idx)
            .is_some_and(|c_value| normalize_for_match(c_value) == *c_expected),
    };

    is_key_match(key_columns.idx_department, &criterion.department)
        && is_key_match(key_columns.idx_group, &criterion.group)
        && is_key_match(key_columns.idx_subgroup, &criterion.subgroup)
}

/// Filter a row stream down to rows matching `criterion`, in source order.
///
/// Read errors are passed through so the caller decides whether to stop.
pub fn scan_matching_rows<'c, I>(
    rows: I,
    key_columns: &'c SpecKeyColumns,
    criterion: &'c SpecMatchCriterion,
) -> ScanMatches<'c, I>
where
    I: Iterator<Item = Result<SpecSourceRow, FormatkiError>>,
{
    ScanMatches {
        rows,
        key_columns,
        criterion,
        n_rows_scanned: 0,
    }
}

/// Lazy iterator returned by [`scan_matching_rows`].
pub struct ScanMatches<'c, I> {
    rows: I,
    key_columns: &'c SpecKeyColumns,
    criterion: &'c SpecMatchCriterion,
    n_rows_scanned: usize,
}

impl<I> ScanMatches<'_, I> {
    /// Number of source rows visited so far.
    pub fn n_rows_scanned(&self) -> usize {
        self.n_rows_scanned
    }
}

impl<I> Iterator for ScanMatches<'_, I>
where
    I: Iterator<Item = Result<SpecSourceRow, FormatkiError>>,
{
    type Item = Result<SpecSourceRow, FormatkiError>;

    fn next(&mut self) -> Option<Self::Item> {
        for res_row in self.rows.by_ref() {
            let row = match res_row {
                Ok(row) => row,
                Err(err) => return Some(Err(err)),
            };
            self.n_rows_scanned += 1;
            if is_row_match(&row, self.key_columns, self.criterion) {
                return Some(Ok(row));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::EnumKeyColumnsRule;

    fn key_columns() -> SpecKeyColumns {
        SpecKeyColumns {
            idx_group: 0,
            idx_subgroup: 1,
            idx_department: 2,
            rule: EnumKeyColumnsRule::Named,
        }
    }

    fn to_row(n_row: u32, cells: &[&str]) -> SpecSourceRow {
        SpecSourceRow::new(n_row, cells.iter().map(ToString::to_string).collect())
    }

    fn to_stream(
        rows: Vec<SpecSourceRow>,
    ) -> impl Iterator<Item = Result<SpecSourceRow, FormatkiError>> {
        rows.into_iter().map(Ok)
    }

    #[test]
    fn test_scan_filters_by_normalized_keys_in_order() {
        let rows = vec![
            to_row(1, &["1100 Nails", "Nail Sets", "Technika", "1"]),
            to_row(2, &["1100 nails", "NAIL  SETS", " technika ", "2"]),
            to_row(3, &["1100 Nails", "Screws", "Technika", "3"]),
            to_row(4, &["'1100 Nails'", "Nail ✕ Sets", "Technika", "4"]),
        ];
        let criterion = SpecMatchCriterion::new("Technika", "1100 Nails", "Nail Sets");
        let key_columns = key_columns();

        let l_matched: Vec<u32> = scan_matching_rows(to_stream(rows), &key_columns, &criterion)
            .map(|res| res.expect("row").n_row)
            .collect();
        assert_eq!(l_matched, vec![1, 2, 4]);
    }

    #[test]
    fn test_scan_short_rows_never_match() {
        let rows = vec![to_row(1, &["", ""]), to_row(2, &[])];
        let criterion = SpecMatchCriterion::new("", "", "");
        let key_columns = key_columns();

        let mut matches = scan_matching_rows(to_stream(rows), &key_columns, &criterion);
        assert!(matches.next().is_none());
        assert_eq!(matches.n_rows_scanned(), 2);
    }

    #[test]
    fn test_scan_reflexive_under_normalization() {
        let l_cells = ["  Oświetlenie  LED ", "Lampy × wiszące", "'Dom'"];
        let row = to_row(1, &[l_cells[0], l_cells[1], l_cells[2]]);
        let criterion = SpecMatchCriterion::new(
            &normalize_for_match(l_cells[2]),
            &normalize_for_match(l_cells[0]),
            &normalize_for_match(l_cells[1]),
        );

        assert!(is_row_match(&row, &key_columns(), &criterion));
    }

    #[test]
    fn test_scan_passes_read_errors_through() {
        let rows: Vec<Result<SpecSourceRow, FormatkiError>> = vec![
            Ok(to_row(1, &["G", "K", "D"])),
            Err(FormatkiError::SourceRead("broken".to_string())),
        ];
        let criterion = SpecMatchCriterion::for_department("D");
        let key_columns = key_columns();

        let l_results: Vec<_> =
            scan_matching_rows(rows.into_iter(), &key_columns, &criterion).collect();
        assert_eq!(l_results.len(), 2);
        assert!(l_results[0].is_ok());
        assert!(matches!(l_results[1], Err(FormatkiError::SourceRead(_))));
    }
}
