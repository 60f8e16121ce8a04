use std::sync::Arc;

use protoxls_api::{MessageSchema, Record};

use crate::coerce::{HeaderMap, RowCells, coerce_message};
use crate::error::EngineError;

/// Turns sheet rows into typed records for one top-level message.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    schema: Arc<MessageSchema>,
}

impl RecordBuilder {
    pub fn new(schema: Arc<MessageSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    /// Build one record. `row` is the 1-based sheet row number used in
    /// error messages.
    pub fn build_row(&self, header: &HeaderMap, cells: &[String], row: usize) -> Result<Record, EngineError> {
        let cells = RowCells::new(header, cells, row);
        coerce_message(&self.schema, &cells, "").map_err(|source| EngineError::Row { row, source })
    }

    /// Build every data row of a sheet, each paired with its sheet row
    /// number. The first row is the header.
    ///
    /// Fails fast: the first bad row aborts the whole sheet. Blank rows are
    /// not special; they yield records with no fields set.
    pub fn build_sheet(&self, sheet: &str, rows: &[Vec<String>]) -> Result<Vec<(usize, Record)>, EngineError> {
        let [header, data @ ..] = rows else {
            return Err(EngineError::InsufficientData { sheet: sheet.to_string() });
        };
        if data.is_empty() {
            return Err(EngineError::InsufficientData { sheet: sheet.to_string() });
        }

        let header = HeaderMap::from_row(header);
        data.iter()
            .enumerate()
            .map(|(idx, cells)| {
                // header is row 1
                let row = idx + 2;
                Ok((row, self.build_row(&header, cells, row)?))
            })
            .collect()
    }
}
