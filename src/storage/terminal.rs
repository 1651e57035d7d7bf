//! Terminal preview sink.

use std::fmt::Write as _;
use std::io::Write;

use super::{ResultSink, StorageError};
use crate::models::{Table, Value};

const NULL_CELL: &str = "-";

/// Prints the first rows of every table, followed by the total row count.
#[derive(Debug, Clone)]
pub struct TerminalSink {
    rows: usize,
}

impl TerminalSink {
    pub fn new(rows: usize) -> Self {
        Self { rows }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => NULL_CELL.to_string(),
        Value::Float(f) => format!("{:.3}", f),
        other => other.to_string(),
    }
}

/// Render a left-aligned text preview of at most `limit` rows.
pub fn render_preview(name: &str, table: &Table, limit: usize) -> String {
    let shown: Vec<Vec<String>> = table
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(cell).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns().iter().map(|c| c.chars().count()).collect();
    for row in &shown {
        for (w, value) in widths.iter_mut().zip(row) {
            *w = (*w).max(value.chars().count());
        }
    }

    let line = |cells: &mut dyn Iterator<Item = &str>| -> String {
        cells
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "\n>>> {}", name);
    let _ = writeln!(out, "{}", line(&mut table.columns().iter().map(String::as_str)));
    for row in &shown {
        let _ = writeln!(out, "{}", line(&mut row.iter().map(String::as_str)));
    }
    let _ = writeln!(out, "Total rows: {}", table.len());
    out
}

impl ResultSink for TerminalSink {
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(render_preview(name, table, self.rows).as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
