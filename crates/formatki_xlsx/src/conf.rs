//! Template constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecBuildOptions, SpecCellFormat, SpecInstructionLine};

////////////////////////////////////////////////////////////////////////////////
// #region ExcelLimits

/// Excel sheet name maximum length (in characters).
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters kept from an over-long sheet name before the ellipsis marker.
pub const N_LEN_SHEET_NAME_TRUNCATED_KEEP: usize = 28;
/// Marker appended to truncated sheet names.
pub const C_SHEET_NAME_ELLIPSIS: &str = "...";
/// Sheet name used when sanitizing leaves nothing.
pub const C_SHEET_NAME_PLACEHOLDER: &str = "Sheet";
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
/// Names Excel refuses regardless of content.
pub const TUP_EXCEL_RESERVED_SHEET_NAMES: [&str; 1] = ["History"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SourceSchema

/// Lower-cased header labels of the (group, sub-group, department) key columns.
pub const TUP_KEY_COLUMN_LABELS: [&str; 3] = ["gt", "kw", "pion"];
/// Header prefixes (normalized) marking dynamic attribute columns.
pub const TUP_DYNAMIC_COLUMN_PREFIXES: [&str; 2] = ["punktor", "bullet"];
/// First position of the dynamic fallback range.
pub const N_IDX_DYNAMIC_FALLBACK_START: usize = 10;
/// Last position (inclusive) of the dynamic fallback range.
pub const N_IDX_DYNAMIC_FALLBACK_END: usize = 25;
/// Decorative cross glyphs removed before comparing values.
pub const TUP_CROSS_GLYPHS: [char; 5] = ['\u{2715}', '\u{00D7}', '\u{2716}', '\u{2717}', '\u{2718}'];
/// Worksheet read from the source workbook.
pub const C_SOURCE_SHEET_DEFAULT: &str = "Arkusz1";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region OutputLayout

/// Instructions sheet name.
pub const C_INSTRUCTIONS_SHEET_NAME: &str = "Wymagania";
/// Text written in a group sheet without matching rows.
pub const C_NO_MATCH_PLACEHOLDER: &str = "Brak pasujących wierszy";
/// Output file name prefix.
pub const C_FILE_OUT_PREFIX: &str = "Formatki";
/// Number of written rows inspected for column widths.
pub const N_ROWS_AUTOFIT_INSPECTED: usize = 20;
/// Words per line in wrapped instruction lines.
pub const N_WORDS_PER_WRAPPED_LINE: usize = 5;
/// Width of a column with no inspected text.
pub const N_WIDTH_EMPTY_COL: f64 = 8.0;
/// Lower bound of an inferred column width.
pub const N_WIDTH_COL_MIN: f64 = 10.0;
/// Upper bound of an inferred column width.
pub const N_WIDTH_COL_MAX: f64 = 60.0;
/// Width units per character of the longest inspected text.
pub const N_WIDTH_COL_SCALE: f64 = 1.1;
/// Instructions column width.
pub const N_WIDTH_INSTRUCTIONS_COL: f64 = 40.0;
/// Departments exported as one whole sheet when no group is requested.
pub const TUP_WHOLE_DEPARTMENT_NAMES: [&str; 1] = ["Oświetlenie"];
/// Source columns left out of whole-department sheets.
pub const TUP_WHOLE_DEPARTMENT_DROPPED_COLUMNS: [&str; 4] = ["GT", "KW", "PION", "Podział"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DefaultFactories

/// Fixed base columns of every group sheet.
pub fn derive_default_base_labels() -> Vec<String> {
    [
        "EAN",
        "Nr. Art dostawcy",
        "Gwarancja: (lata)",
        "Opis artykułu (3997 znaków (3515 bez spacji))",
        "W zestawie:",
        "Dane producenta - GPSR:",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

/// Attribute labels used when the first matching row has no dynamic cells.
pub fn derive_default_fallback_labels() -> Vec<String> {
    [
        "Moc [W]:",
        "Liczba biegów:",
        "Maks. prędkość obrotowa [obr/min]:",
        "Mocowanie mieszadła:",
        "Maksymalna średnica mieszadła [mm]:",
        "Gwarancja: {jeśli powyżej 2 lat}",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

/// Static text of the instructions sheet.
pub fn derive_default_instructions() -> Vec<SpecInstructionLine> {
    let l_short = [
        "📸 Wymagania dotyczące zdjęć:",
        "- Zdjęcia minimum 1500 px na krótszy bok",
        "- Format .JPG",
        "- Packshot",
        "- Aranżacyjne",
        "- Więcej zdjęć = lepiej",
        "- Opisane numerem OBI lub EAN",
        "Wymagania dotyczące opisu i tytułu:",
        "- Tytuł artykułu online ma limit do 80 znaków",
    ];
    let l_long = [
        "- Opis artykułu powinien zawierać najważniejsze informacje opisowe z limitem 3997 znaków (3515 bez spacji), prosimy o podanie opisu artykułu z uwzględnieniem najważniejszych cech/zalet/zastosowań. Celem jest zebranie wszystkich ważnych informacji.",
        "- Dane znajdujące się w nawiasach klamrowych („{}”) stanowią możliwe opcje do wyboru - należy wybrać jedną z nich i wpisać ją w komórkę poniżej",
        "- Dane producenta - GPSR, są to dane, które pokazują się na stronie obi.pl jako dane wytwórcy, dane jakie należy podać to: Pełna nazwa firmy, adres siedziby oraz adres e-mail",
    ];

    l_short
        .into_iter()
        .map(|text| SpecInstructionLine::new(text, false))
        .chain(l_long.into_iter().map(|text| SpecInstructionLine::new(text, true)))
        .collect()
}

/// Build default named format presets used by [`crate::writer::TemplateWriter`].
pub fn derive_default_xlsx_formats() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert("text".to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        "header".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            text_wrap: Some(true),
            bg_color: Some("F47B20".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "label".to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        "wrapped".to_string(),
        SpecCellFormat {
            valign: Some("top".to_string()),
            text_wrap: Some(true),
            ..Default::default()
        },
    );

    dict_fmt
}

/// Build default build options.
pub fn derive_default_build_options() -> SpecBuildOptions {
    SpecBuildOptions::default()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
