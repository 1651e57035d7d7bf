//! Formatted Excel workbook sink.
//!
//! Every table written to the sink becomes one sheet of a single workbook,
//! saved when the sink is finished. Each sheet gets a bold header, frozen
//! panes at B2, an autofilter over the data and a red/yellow/green colour
//! scale on its numeric columns.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use rust_xlsxwriter::{ConditionalFormat3ColorScale, Format, Workbook, Worksheet, XlsxError};
use tracing::{info, warn};

use super::{write_atomic, ResultSink, StorageError};
use crate::calculate::RANK_COLUMN;
use crate::models::{Table, Value};

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

const SCALE_MIN_COLOR: &str = "#AA0000";
const SCALE_MID_COLOR: &str = "#FFFF00";
const SCALE_MAX_COLOR: &str = "#00AA00";

pub struct XlsxSink {
    path: PathBuf,
    sheets: Mutex<Vec<(String, Table)>>,
}

impl XlsxSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            sheets: Mutex::new(Vec::new()),
        }
    }
}

fn sheet_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME)
        .collect()
}

/// A column is numeric when it has at least one number and no text.
pub(super) fn is_numeric_column(table: &Table, idx: usize) -> bool {
    let mut any_number = false;
    for row in table.rows() {
        match &row[idx] {
            Value::Int(_) | Value::Float(_) => any_number = true,
            Value::Text(_) => return false,
            Value::Null => {}
        }
    }
    any_number
}

fn write_sheet(sheet: &mut Worksheet, name: &str, table: &Table) -> Result<(), XlsxError> {
    sheet.set_name(sheet_name(name))?;

    let header = Format::new().set_bold();
    for (col, column) in table.columns().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, column, &header)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let xl_row = r as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            let col = col as u16;
            match value {
                Value::Null => {}
                Value::Int(i) => {
                    sheet.write_number(xl_row, col, *i as f64)?;
                }
                Value::Float(f) => {
                    sheet.write_number(xl_row, col, *f)?;
                }
                Value::Text(s) => {
                    sheet.write_string(xl_row, col, s)?;
                }
            }
        }
    }

    sheet.set_freeze_panes(1, 1)?;

    if table.columns().is_empty() {
        return Ok(());
    }
    let last_row = table.len() as u32;
    let last_col = (table.columns().len() - 1) as u16;
    sheet.autofilter(0, 0, last_row, last_col)?;

    if !table.is_empty() {
        for (idx, column) in table.columns().iter().enumerate() {
            if column == RANK_COLUMN || !is_numeric_column(table, idx) {
                continue;
            }
            let scale = ConditionalFormat3ColorScale::new()
                .set_minimum_color(SCALE_MIN_COLOR)
                .set_midpoint_color(SCALE_MID_COLOR)
                .set_maximum_color(SCALE_MAX_COLOR);
            sheet.add_conditional_format(1, idx as u16, last_row, idx as u16, &scale)?;
        }
    }

    sheet.autofit();
    Ok(())
}

impl ResultSink for XlsxSink {
    fn write(&self, name: &str, table: &Table) -> Result<(), StorageError> {
        let mut sheets = self
            .sheets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sheets.push((name.to_string(), table.clone()));
        Ok(())
    }

    fn finish(&self) -> Result<(), StorageError> {
        let sheets = self
            .sheets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if sheets.is_empty() {
            warn!("No tables collected, skipping workbook {:?}", self.path);
            return Ok(());
        }

        let mut workbook = Workbook::new();
        for (name, table) in sheets.iter() {
            let sheet = workbook.add_worksheet();
            write_sheet(sheet, name, table)?;
        }
        let buffer = workbook.save_to_buffer()?;

        write_atomic(&self.path, |out| Ok(out.write_all(&buffer)?))?;

        info!(
            "Created {:?}, {} sheets, {} rows",
            self.path,
            sheets.len(),
            sheets.iter().map(|(_, t)| t.len()).sum::<usize>()
        );
        Ok(())
    }
}
