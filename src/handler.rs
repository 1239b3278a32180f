use crate::batch::{Field, Page};
use crate::error::{Error, Result};
use crate::protocol::r#trait::QueryHandler;
use crate::protocol::{DataRow, RowDescription};

/// A handler that ignores all rows but captures the last command tag
///
/// Useful for `query_drop()`: BEGIN, DECLARE, ROLLBACK and friends.
#[derive(Default)]
pub struct DropHandler {
    command_tag: Option<String>,
}

impl DropHandler {
    /// Tag of the last completed command, e.g. `DECLARE CURSOR`
    pub fn command_tag(&self) -> Option<&str> {
        self.command_tag.as_deref()
    }

    /// Row count carried by the last command tag, if any
    pub fn rows_affected(&self) -> Option<u64> {
        self.command_tag
            .as_deref()
            .and_then(|tag| tag.rsplit(' ').next())
            .and_then(|n| n.parse().ok())
    }
}

impl QueryHandler for DropHandler {
    fn columns(&mut self, _: RowDescription<'_>) -> Result<()> {
        Ok(())
    }

    fn row(&mut self, _: DataRow<'_>) -> Result<()> {
        Ok(())
    }

    fn command_complete(&mut self, tag: &str) -> Result<()> {
        self.command_tag = Some(tag.to_string());
        Ok(())
    }
}

/// A handler that collects the first result set into a [`Page`]
#[derive(Default)]
pub struct CollectHandler {
    page: Option<Page>,
    finished: bool,
}

impl CollectHandler {
    /// The collected page; an error if the query produced no result set.
    pub fn into_page(self) -> Result<Page> {
        self.page.ok_or_else(|| {
            Error::BadUsageError("query did not return a result set".to_string())
        })
    }
}

impl QueryHandler for CollectHandler {
    fn columns(&mut self, desc: RowDescription<'_>) -> Result<()> {
        if self.page.is_none() {
            self.page = Some(Page::new(Field::from_description(desc)?));
        }
        Ok(())
    }

    fn row(&mut self, row: DataRow<'_>) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        match self.page.as_mut() {
            Some(page) => page.batch.push_data_row(row),
            None => Err(Error::InvalidMessage(
                "DataRow before RowDescription".to_string(),
            )),
        }
    }

    fn command_complete(&mut self, _tag: &str) -> Result<()> {
        if self.page.is_some() {
            self.finished = true;
        }
        Ok(())
    }
}
