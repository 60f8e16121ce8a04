use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};

use crate::error::EngineError;

/// Source of sheet cells as text, row-major, anchored at A1.
pub trait WorkbookReader: Send + Sync {
    fn read_sheet(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, EngineError>;
}

// ════════════════════════════════════════════════════════════════
//  Calamine
// ════════════════════════════════════════════════════════════════

/// Reads xlsx/xlsm/xls/ods workbooks from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineReader;

impl WorkbookReader for CalamineReader {
    fn read_sheet(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, EngineError> {
        let workbook_err = |detail: String| EngineError::Workbook {
            path: path.display().to_string(),
            detail,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_err(e.to_string()))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| workbook_err(format!("sheet '{sheet}': {e}")))?;

        // Re-anchor to A1 so row/column numbers match the spreadsheet.
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
        for (r, cells) in range.rows().enumerate() {
            let mut row = vec![String::new(); col_offset];
            row.reserve(cells.len());
            for (c, cell) in cells.iter().enumerate() {
                let text = cell_text(cell).map_err(|e| {
                    workbook_err(format!(
                        "sheet '{sheet}' row {}, column {}: {e}",
                        row_offset + r + 1,
                        col_offset + c + 1
                    ))
                })?;
                row.push(text);
            }
            rows.push(row);
        }
        tracing::debug!(path = %path.display(), sheet, rows = rows.len(), "read sheet");
        Ok(rows)
    }
}

/// Text form of one cell, as a user would type it.
pub fn cell_text(cell: &Data) -> Result<String, String> {
    Ok(match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::String(s) => s.clone(),
        Data::Bool(true) => "TRUE".into(),
        Data::Bool(false) => "FALSE".into(),
        Data::DateTime(dt) => float_text(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => return Err(format!("cell error {e}")),
        Data::Empty => String::new(),
    })
}

/// Integral floats within i64 range print without a fraction; anything
/// else uses the shortest round-trip form.
pub fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

// ════════════════════════════════════════════════════════════════
//  In-memory
// ════════════════════════════════════════════════════════════════

/// Sheets held in memory, keyed by (workbook path, sheet name).
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: HashMap<(PathBuf, String), Vec<Vec<String>>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet<R, C>(mut self, path: impl Into<PathBuf>, sheet: impl Into<String>, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.sheets.insert((path.into(), sheet.into()), rows);
        self
    }
}

impl WorkbookReader for MemoryWorkbook {
    fn read_sheet(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, EngineError> {
        self.sheets
            .get(&(path.to_path_buf(), sheet.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::Workbook {
                path: path.display().to_string(),
                detail: format!("sheet '{sheet}' not found"),
            })
    }
}
