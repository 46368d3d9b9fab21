use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use clap::ValueEnum;
use csv::WriterBuilder;
use serde::Serialize;

use crate::aggregate::FinalResult;

/// Output format for the per-cell report.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum ExportFormat {
    #[default]
    Txt,
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Serialize)]
struct ReportRow<'a> {
    cell: &'a str,
    count: u64,
    score: i64,
}

fn rows(result: &FinalResult) -> impl Iterator<Item = ReportRow<'_>> {
    result.iter().map(|(cell, totals)| ReportRow {
        cell,
        count: totals.count,
        score: totals.score_sum,
    })
}

/// Score with an explicit sign, `+0` for zero.
pub fn signed(score: i64) -> String {
    format!("{score:+}")
}

/// Neutralises cells that a spreadsheet would read as a formula by prefixing `'`.
/// Cells that already start with `'` are left alone.
pub fn csv_safe_cell(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell,
    }
}

/// Renders the report, one row per cell in ascending cell id order.
pub fn render(result: &FinalResult, format: ExportFormat) -> io::Result<String> {
    match format {
        ExportFormat::Txt => Ok(render_txt(result)),
        ExportFormat::Csv => render_delimited(result, b','),
        ExportFormat::Tsv => render_delimited(result, b'\t'),
        ExportFormat::Json => {
            let rows: Vec<ReportRow> = rows(result).collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
    }
}

fn render_txt(result: &FinalResult) -> String {
    let width = result
        .iter()
        .map(|(cell, _)| cell.chars().count())
        .max()
        .unwrap_or(0)
        .max("Cell".len());
    let mut out = format!("{:<width$}  {:>10}  {:>12}\n", "Cell", "Records", "Score");
    for row in rows(result) {
        out.push_str(&format!(
            "{:<width$}  {:>10}  {:>12}\n",
            row.cell,
            row.count,
            signed(row.score)
        ));
    }
    out
}

fn render_delimited(result: &FinalResult, delimiter: u8) -> io::Result<String> {
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    wtr.write_record(["cell", "count", "score"])?;
    for row in rows(result) {
        wtr.write_record([
            csv_safe_cell(row.cell.to_string()),
            row.count.to_string(),
            signed(row.score),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Saves `contents` under `dir` as a timestamped report file and returns its path.
pub fn save_report(contents: &str, dir: &Path, format: ExportFormat) -> io::Result<PathBuf> {
    let local: DateTime<Local> = Local::now();
    let filename = local
        .format(&format!(
            "%Y_%m_%d_%H_%M_%S_sentiment_report.{}",
            format.extension()
        ))
        .to_string();
    let path = dir.join(filename);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    file.write_all(contents.as_bytes())?;

    Ok(path)
}
