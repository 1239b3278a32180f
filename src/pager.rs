//! A server-side cursor read in bounded pages.

use crate::batch::Page;
use crate::client::Client;
use crate::constant::CURSOR_NAME;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::invocation::Invocation;

pub const BEGIN: &str = "BEGIN TRANSACTION";
pub const COMMIT: &str = "COMMIT TRANSACTION";
pub const ROLLBACK: &str = "ROLLBACK TRANSACTION";

pub fn declare_sql(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    format!("DECLARE {CURSOR_NAME} CURSOR FOR {sql}")
}

pub fn fetch_sql(page_size: usize) -> String {
    format!("FETCH FORWARD {page_size} FROM {CURSOR_NAME}")
}

/// Begin a transaction, declare the cursor and fetch its first page.
///
/// Failures of BEGIN and DECLARE are [`Error::Query`]; a failure of the first
/// fetch, which carries the column metadata, is [`Error::SchemaResolution`].
/// The caller rolls back.
pub fn open<C: Client, H: Host>(
    inv: &mut Invocation<'_, C, H>,
    sql: &str,
    page_size: usize,
) -> Result<Page> {
    inv.execute(BEGIN).map_err(Error::query)?;
    inv.execute(&declare_sql(sql)).map_err(Error::query)?;
    inv.fetch(&fetch_sql(page_size))
        .map_err(|e| Error::SchemaResolution(Box::new(e)))
}

/// Fetch the next page; an empty page means the cursor is exhausted.
pub fn fetch_next<C: Client, H: Host>(
    inv: &mut Invocation<'_, C, H>,
    page_size: usize,
) -> Result<Page> {
    inv.fetch(&fetch_sql(page_size)).map_err(Error::query)
}

/// End the transaction of an exhausted cursor, closing it.
pub fn commit<C: Client, H: Host>(inv: &mut Invocation<'_, C, H>) -> Result<()> {
    inv.execute(COMMIT).map_err(Error::query)
}

pub fn rollback<C: Client, H: Host>(inv: &mut Invocation<'_, C, H>) -> Result<()> {
    inv.execute(ROLLBACK)
}
