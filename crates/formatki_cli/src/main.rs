//! Formatki CLI - product template workbook builder

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use formatki_xlsx::{
    SourceTable, SpecBuildOptions, SpecBuildReport, SpecMatchCriterion, SpecSelection,
    build_workbook, derive_data_structure, inspect_columns, list_groups, list_subgroups,
    resolve_group_codes, sample_matching_rows,
};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "formatki")]
#[command(
    author,
    version,
    about = "Build per-group product template workbooks from a source XLSX table"
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Source workbook
    #[arg(long, global = true, env = "BASE_XLSX", default_value = "baza.xlsx")]
    source: PathBuf,

    /// Worksheet read from the source workbook
    #[arg(long, global = true, env = "FORMATKI_SOURCE_SHEET", default_value = "Arkusz1")]
    sheet: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the template workbook for one department
    Build {
        /// Department (PION)
        #[arg(short, long)]
        department: String,

        /// Group (GT), repeatable
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Sub-group (KW), repeatable
        #[arg(short = 'k', long = "subgroup")]
        subgroups: Vec<String>,

        /// Output directory
        #[arg(short, long, env = "FORMATKI_TMP_DIR", default_value = "tmp")]
        out_dir: PathBuf,
    },

    /// Print department -> group -> sub-groups
    Structure,

    /// List groups of a department
    Groups {
        /// Department (PION)
        #[arg(short, long)]
        department: String,
    },

    /// List sub-groups of the given groups
    Subgroups {
        /// Group (GT), repeatable
        #[arg(short, long = "group")]
        groups: Vec<String>,
    },

    /// Expand comma-separated group code prefixes
    ResolveGroups {
        /// Department (PION)
        #[arg(short, long)]
        department: String,

        /// Codes, e.g. "1100, 12"
        raw: String,
    },

    /// Show rows matching one (department, group, sub-group)
    DebugRows {
        /// Department (PION)
        #[arg(short, long)]
        department: String,

        /// Group (GT)
        #[arg(short, long)]
        group: String,

        /// Sub-group (KW)
        #[arg(short = 'k', long)]
        subgroup: String,

        /// Maximum rows shown
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show header positions, detected key/dynamic columns and leading rows
    InspectColumns {
        /// Leading rows shown
        #[arg(short = 'n', long, default_value = "8")]
        rows: usize,
    },
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _tracing = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();

    let cli = Cli::parse();
    let options = SpecBuildOptions {
        sheet_source: cli.source.sheet.clone(),
        ..Default::default()
    };
    let path_source = cli.source.source.as_path();

    let value = match cli.command {
        Commands::Build {
            department,
            groups,
            subgroups,
            out_dir,
        } => {
            let selection = SpecSelection::new(department, groups, subgroups);
            let report = build_workbook(path_source, &out_dir, &selection, &options)
                .with_context(|| format!("Failed to build workbook from '{}'", path_source.display()))?;
            info!("{report}");
            print_json(&derive_report_json(&report))?;
            if !report.found_any {
                bail!("No rows matched the requested selection");
            }
            return Ok(());
        }
        Commands::Structure => {
            let mut table = open_table(path_source, &options)?;
            json!(derive_data_structure(&mut table)?)
        }
        Commands::Groups { department } => {
            let mut table = open_table(path_source, &options)?;
            json!(list_groups(&mut table, &department)?)
        }
        Commands::Subgroups { groups } => {
            let mut table = open_table(path_source, &options)?;
            json!(list_subgroups(&mut table, &groups)?)
        }
        Commands::ResolveGroups { department, raw } => {
            let mut table = open_table(path_source, &options)?;
            json!(resolve_group_codes(&mut table, &department, &raw)?)
        }
        Commands::DebugRows {
            department,
            group,
            subgroup,
            limit,
        } => {
            let mut table = open_table(path_source, &options)?;
            let criterion = SpecMatchCriterion::new(&department, &group, &subgroup);
            let sample = sample_matching_rows(&mut table, &criterion, limit)?;
            let l_rows: Vec<Value> = sample
                .rows
                .iter()
                .map(|row| {
                    Value::Object(
                        row.iter()
                            .map(|(c_header, c_value)| (c_header.clone(), json!(c_value)))
                            .collect(),
                    )
                })
                .collect();
            json!({
                "criterion": {
                    "department": criterion.department,
                    "group": criterion.group,
                    "subgroup": criterion.subgroup,
                },
                "n_rows_matched": sample.n_rows_matched,
                "rows": l_rows,
            })
        }
        Commands::InspectColumns { rows } => {
            let mut table = open_table(path_source, &options)?;
            let inspection = inspect_columns(&mut table, rows)?;
            let layout = &inspection.layout;
            json!({
                "sheet": inspection.sheet_name,
                "headers": layout
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(n_idx, c_header)| json!([n_idx, c_header]))
                    .collect::<Vec<_>>(),
                "key_columns": {
                    "rule": format!("{:?}", layout.key_columns.rule),
                    "group": layout.key_columns.idx_group,
                    "subgroup": layout.key_columns.idx_subgroup,
                    "department": layout.key_columns.idx_department,
                },
                "dynamic_columns": {
                    "if_fallback": layout.dynamic_columns.if_fallback,
                    "cols_idx": layout.dynamic_columns.cols_idx,
                },
                "rows": inspection
                    .rows
                    .iter()
                    .map(|row| json!({"n_row": row.n_row, "cells": row.cells}))
                    .collect::<Vec<_>>(),
            })
        }
    };

    print_json(&value)
}

fn open_table(path_source: &Path, options: &SpecBuildOptions) -> Result<SourceTable> {
    SourceTable::open(
        path_source,
        &options.sheet_source,
        &options.dynamic_column_prefixes,
    )
    .with_context(|| format!("Failed to open source '{}'", path_source.display()))
}

fn derive_report_json(report: &SpecBuildReport) -> Value {
    json!({
        "file_out": report.path_file_out.to_string_lossy(),
        "file_name": report.file_name,
        "found_any": report.found_any,
        "sheets": report
            .sheets
            .iter()
            .map(|sheet| json!({
                "sheet_name": sheet.sheet_name,
                "group": sheet.group,
                "subgroup": sheet.subgroup,
                "n_rows_matched": sheet.n_rows_matched,
                "dynamic_headers": sheet.dynamic_headers,
                "if_partial": sheet.if_partial,
            }))
            .collect::<Vec<_>>(),
        "warnings": report.warnings,
    })
}

fn print_json(value: &Value) -> Result<()> {
    let c_text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{c_text}");
    Ok(())
}
