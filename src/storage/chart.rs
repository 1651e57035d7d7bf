//! Horizontal bar charts of ranked tables.
//!
//! Each table becomes `<out_dir>/charts/<name>.xlsx`: a data sheet holding
//! one label and one metric per row, and a native bar chart over it with
//! rank 1 on top.

use std::io::Write;

use rust_xlsxwriter::{Chart, ChartType, Format, Workbook, XlsxError};
use tracing::{info, warn};

use super::xlsx::is_numeric_column;
use super::{write_atomic, ResultSink, StorageConfig, StorageError};
use crate::calculate::RANK_COLUMN;
use crate::models::{Table, Value};

const DATA_SHEET: &str = "data";
const LABEL_SEPARATOR: &str = " / ";

const BAR_HEIGHT: u32 = 20;
const MIN_CHART_HEIGHT: u32 = 288;
const CHART_WIDTH: u32 = 720;

pub struct ChartSink {
    config: StorageConfig,
}

impl ChartSink {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

/// Column plotted for `table`: `preferred` if numeric, else the first
/// numeric column other than the rank.
fn chart_column(table: &Table, preferred: &str) -> Option<usize> {
    if let Some(idx) = table.column_index(preferred) {
        if is_numeric_column(table, idx) {
            return Some(idx);
        }
    }
    table
        .columns()
        .iter()
        .enumerate()
        .find(|(idx, column)| *column != RANK_COLUMN && is_numeric_column(table, *idx))
        .map(|(idx, _)| idx)
}

/// Columns that name a bar: everything that is not numeric.
fn label_columns(table: &Table) -> Vec<usize> {
    (0..table.columns().len())
        .filter(|&idx| !is_numeric_column(table, idx))
        .collect()
}

fn bar_label(row: &[Value], labels: &[usize]) -> String {
    labels
        .iter()
        .map(|&idx| row[idx].to_string())
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

fn build_chart(name: &str, table: &Table, metric: usize) -> Result<Vec<u8>, XlsxError> {
    let labels = label_columns(table);
    let metric_name = &table.columns()[metric];

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(DATA_SHEET)?;

    let header = Format::new().set_bold();
    let label_header = labels
        .iter()
        .map(|&idx| table.columns()[idx].as_str())
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR);
    sheet.write_string_with_format(0, 0, &label_header, &header)?;
    sheet.write_string_with_format(0, 1, metric_name, &header)?;

    // Excel draws the first category at the bottom
    for (r, row) in table.rows().iter().rev().enumerate() {
        let xl_row = r as u32 + 1;
        sheet.write_string(xl_row, 0, bar_label(row, &labels))?;
        if let Some(v) = row[metric].as_f64() {
            sheet.write_number(xl_row, 1, v)?;
        }
    }

    let last_row = table.len() as u32;
    let mut chart = Chart::new(ChartType::Bar);
    chart
        .add_series()
        .set_name(metric_name.as_str())
        .set_categories((DATA_SHEET, 1, 0, last_row, 0))
        .set_values((DATA_SHEET, 1, 1, last_row, 1));
    chart.title().set_name(name);
    chart.legend().set_hidden();
    chart.set_width(CHART_WIDTH);
    chart.set_height((last_row * BAR_HEIGHT + 80).max(MIN_CHART_HEIGHT));

    sheet.insert_chart(0, 3, &chart)?;
    sheet.autofit();

    workbook.save_to_buffer()
}

impl ResultSink for ChartSink {
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        if table.is_empty() {
            warn!("No rows to chart for {}", name);
            return Ok(());
        }
        let Some(metric) = chart_column(table, &self.config.chart_metric) else {
            warn!("No numeric column to chart for {}", name);
            return Ok(());
        };

        let buffer = build_chart(name, table, metric)?;
        let path = self.config.chart_path(name);
        write_atomic(&path, |out| Ok(out.write_all(&buffer)?))?;

        info!(
            "Charted {} rows of {} by {} to {:?}",
            table.len(),
            name,
            table.columns()[metric],
            path
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn global_kd() -> Table {
        Table::from_rows(
            ["rank", "player", "kills_total", "deaths_total", "kd"],
            vec![
                vec![
                    Value::Int(1),
                    Value::text("Derke"),
                    Value::Int(30),
                    Value::Int(5),
                    Value::Float(6.0),
                ],
                vec![
                    Value::Int(2),
                    Value::text("Boaster"),
                    Value::Int(3),
                    Value::Int(0),
                    Value::Null,
                ],
            ],
        )
        .unwrap()
    }

    fn nemesis() -> Table {
        Table::from_rows(
            ["rank", "player", "enemy", "deaths_from_enemy", "kills_on_enemy"],
            vec![vec![
                Value::Int(1),
                Value::text("Derke"),
                Value::text("aspas"),
                Value::Int(7),
                Value::Int(2),
            ]],
        )
        .unwrap()
    }

    #[test]
    fn test_chart_column_prefers_configured_metric() {
        let table = global_kd();
        assert_eq!(chart_column(&table, "kd"), Some(4));
        assert_eq!(chart_column(&table, "deaths_total"), Some(3));
    }

    #[test]
    fn test_chart_column_falls_back_to_first_metric() {
        assert_eq!(chart_column(&nemesis(), "kd"), Some(3));

        let labels_only = Table::from_rows(
            ["rank", "player"],
            vec![vec![Value::Int(1), Value::text("Derke")]],
        )
        .unwrap();
        assert_eq!(chart_column(&labels_only, "kd"), None);
    }

    #[test]
    fn test_bar_labels_join_text_columns() {
        let table = nemesis();
        let labels = label_columns(&table);
        assert_eq!(labels, vec![1, 2]);
        assert_eq!(bar_label(&table.rows()[0], &labels), "Derke / aspas");
    }

    #[test]
    fn test_chart_written_per_table() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::new(temp_dir.path().to_path_buf());
        let sink = ChartSink::new(config.clone());

        sink.write("global_kd", &global_kd()).unwrap();
        sink.write("nemesis", &nemesis()).unwrap();

        for name in ["global_kd", "nemesis"] {
            let path = config.chart_path(name);
            assert_eq!(path, temp_dir.path().join("charts").join(format!("{name}.xlsx")));
            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(&bytes[..2], b"PK");
        }
    }

    #[test]
    fn test_empty_table_not_charted() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::new(PathBuf::from(temp_dir.path()));
        let sink = ChartSink::new(config.clone());

        sink.write("match_mvp", &Table::new(["rank", "player", "kills_total"]))
            .unwrap();
        assert!(!config.chart_path("match_mvp").exists());
    }
}
