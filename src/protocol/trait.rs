use crate::error::Result;
use crate::protocol::{DataRow, RowDescription};

/// Event callbacks for a simple-query result
///
/// A single query string may produce several result sets; `columns` marks
/// the start of each and `command_complete` its end.
pub trait QueryHandler {
    fn columns(&mut self, desc: RowDescription<'_>) -> Result<()>;
    fn row(&mut self, row: DataRow<'_>) -> Result<()>;
    fn command_complete(&mut self, _tag: &str) -> Result<()> {
        Ok(())
    }
}
