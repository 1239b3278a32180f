//! The database side of a session.

use auto_impl::auto_impl;

use crate::batch::Page;
use crate::error::Result;

/// What a [`Session`](crate::session::Session) needs from a live connection
#[auto_impl(&mut, Box)]
pub trait Client {
    /// Run a statement that returns no rows (BEGIN, DECLARE, ROLLBACK, ...).
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run a statement that returns rows and collect its first result set.
    fn fetch(&mut self, sql: &str) -> Result<Page>;

    /// Whether the server reports an open (or failed) transaction block.
    fn in_transaction(&self) -> bool;

    /// Whether the connection can no longer be used.
    fn is_broken(&self) -> bool;
}

/// Opens [`Client`]s from connection info strings
pub trait Connector {
    type Client: Client;

    fn connect(&mut self, conninfo: &str) -> Result<Self::Client>;

    /// Close a connection gracefully. Dropping it must also be safe.
    fn disconnect(&mut self, client: Self::Client) -> Result<()> {
        drop(client);
        Ok(())
    }
}

/// Connects with the crate's own synchronous PostgreSQL client
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

impl Connector for PgConnector {
    type Client = crate::sync::Conn;

    fn connect(&mut self, conninfo: &str) -> Result<Self::Client> {
        crate::sync::Conn::new(conninfo)
    }

    fn disconnect(&mut self, client: Self::Client) -> Result<()> {
        client.close()
    }
}
