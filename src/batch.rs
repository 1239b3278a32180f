//! One page of text-format rows fetched from the cursor.

use std::ops::Range;

use crate::constant::Oid;
use crate::error::{Error, Result};
use crate::protocol::{DataRow, RowDescription};

/// Field metadata reported in a RowDescription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub type_oid: Oid,
    /// `pg_type.typlen`; negative for variable-width types
    pub type_size: i16,
    /// `atttypmod`; `-1` when the type has no modifier
    pub type_modifier: i32,
}

impl Field {
    pub fn new(name: &str, type_oid: Oid, type_size: i16, type_modifier: i32) -> Self {
        Self {
            name: name.to_string(),
            type_oid,
            type_size,
            type_modifier,
        }
    }

    pub fn from_description(desc: RowDescription<'_>) -> Result<Vec<Self>> {
        desc.fields()?
            .into_iter()
            .map(|f| {
                Ok(Field {
                    name: String::from_utf8_lossy(f.name).into_owned(),
                    type_oid: f.tail.type_oid(),
                    type_size: f.tail.type_size(),
                    type_modifier: f.tail.type_modifier(),
                })
            })
            .collect()
    }
}

/// Rows of nullable text cells, indexed by (local row, column)
///
/// All cell bytes live in one buffer; each cell is a range into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    num_columns: usize,
    num_rows: usize,
    data: Vec<u8>,
    cells: Vec<Option<Range<usize>>>,
}

impl Batch {
    pub fn new(num_columns: usize) -> Self {
        Self {
            num_columns,
            ..Default::default()
        }
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Append a DataRow received from the server.
    pub fn push_data_row(&mut self, row: DataRow<'_>) -> Result<()> {
        if row.len() != self.num_columns {
            return Err(Error::InvalidMessage(format!(
                "DataRow has {} columns, expected {}",
                row.len(),
                self.num_columns
            )));
        }
        for cell in row.iter() {
            let cell = cell?;
            self.push_cell(cell);
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Append a row of text cells; `None` is SQL NULL.
    pub fn push_row<S: AsRef<str>>(&mut self, row: &[Option<S>]) -> Result<()> {
        if row.len() != self.num_columns {
            return Err(Error::BadUsageError(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.num_columns
            )));
        }
        for cell in row {
            self.push_cell(cell.as_ref().map(|s| s.as_ref().as_bytes()));
        }
        self.num_rows += 1;
        Ok(())
    }

    fn push_cell(&mut self, cell: Option<&[u8]>) {
        let range = cell.map(|bytes| {
            let start = self.data.len();
            self.data.extend_from_slice(bytes);
            start..self.data.len()
        });
        self.cells.push(range);
    }

    /// Raw text of a cell, or `None` if it is NULL or out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&[u8]> {
        if col >= self.num_columns {
            return None;
        }
        let range = self.cells.get(row * self.num_columns + col)?.clone()?;
        self.data.get(range)
    }
}

/// A fetched page: the result's fields plus its rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub fields: Vec<Field>,
    pub batch: Batch,
}

impl Page {
    pub fn new(fields: Vec<Field>) -> Self {
        let batch = Batch::new(fields.len());
        Self { fields, batch }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// First cell of the first row, as text
    pub fn first_value(&self) -> Option<&str> {
        self.batch
            .cell(0, 0)
            .and_then(|bytes| simdutf8::basic::from_utf8(bytes).ok())
    }
}
