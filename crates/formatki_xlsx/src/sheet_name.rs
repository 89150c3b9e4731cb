//! Excel-legal, collision-free worksheet naming scoped to one build.

use std::collections::BTreeSet;

use crate::conf::{
    C_SHEET_NAME_ELLIPSIS, C_SHEET_NAME_PLACEHOLDER, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_LEN_SHEET_NAME_TRUNCATED_KEEP, TUP_EXCEL_ILLEGAL, TUP_EXCEL_RESERVED_SHEET_NAMES,
};

/// Replace illegal characters and bound the length of a sheet name.
///
/// Illegal characters become spaces, whitespace runs collapse and surrounding
/// apostrophes are dropped. Names over the limit keep their head plus `...`.
pub fn sanitize_sheet_name(name: &str) -> String {
    let c_replaced: String = name
        .chars()
        .map(|chr| if TUP_EXCEL_ILLEGAL.contains(&chr) { ' ' } else { chr })
        .collect();
    let c_collapsed = c_replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let c_name = c_collapsed.trim_matches(|chr: char| chr == '\'' || chr.is_whitespace());
    if c_name.is_empty() {
        return C_SHEET_NAME_PLACEHOLDER.to_string();
    }

    if c_name.chars().count() <= N_LEN_EXCEL_SHEET_NAME_MAX {
        return c_name.to_string();
    }
    let c_head: String = c_name.chars().take(N_LEN_SHEET_NAME_TRUNCATED_KEEP).collect();
    format!("{c_head}{C_SHEET_NAME_ELLIPSIS}")
}

/// Create suffixed sheet name (`base_1`, `base_2`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, part_idx_1based: usize) -> String {
    let c_sheet_name_suffix = format!("_{part_idx_1based}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

/// Worksheet names taken in one workbook, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct SheetNameRegistry {
    set_names_folded: BTreeSet<String>,
    l_names: Vec<String>,
}

impl SheetNameRegistry {
    /// Registry with Excel's reserved names already taken.
    pub fn new() -> Self {
        Self::with_reserved(std::iter::empty::<&str>())
    }

    /// Registry with Excel's reserved names plus `names` already taken.
    ///
    /// Reserved names are never reported by [`Self::names`].
    pub fn with_reserved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();
        for c_name in TUP_EXCEL_RESERVED_SHEET_NAMES {
            registry.set_names_folded.insert(c_name.to_lowercase());
        }
        for c_name in names {
            registry.set_names_folded.insert(c_name.as_ref().to_lowercase());
        }
        registry
    }

    /// Whether `name` is already taken.
    pub fn contains(&self, name: &str) -> bool {
        self.set_names_folded.contains(&name.to_lowercase())
    }

    /// Allocate a unique legal name derived from `candidate` and record it.
    pub fn allocate(&mut self, candidate: &str) -> String {
        let c_base = sanitize_sheet_name(candidate);
        let mut c_name = c_base.clone();
        let mut n_idx = 1usize;
        while self.contains(&c_name) {
            c_name = create_sheet_identifier(&c_base, n_idx);
            n_idx += 1;
        }

        self.set_names_folded.insert(c_name.to_lowercase());
        self.l_names.push(c_name.clone());
        c_name
    }

    /// Allocated names in allocation order.
    pub fn names(&self) -> &[String] {
        &self.l_names
    }
}
