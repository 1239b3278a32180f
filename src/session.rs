//! The state shared between host invocations.

use std::mem;

use crate::batch::Page;
use crate::client::{Client, Connector, PgConnector};
use crate::constant::CURSOR_PAGE_ROWS;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::invocation::Invocation;
use crate::materialize::materialize;
use crate::pager;
use crate::schema::{self, ColumnDescriptor, Schema};

/// Outcome of a successful `populate_next`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Another page is buffered
    More,
    /// The cursor is exhausted
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Idle,
    OpenQuery,
}

/// A query between `prepare` and the end of its cursor
#[derive(Debug)]
pub struct OpenQuery {
    schema: Schema,
    page: Page,
    /// Rows already written to the host
    loaded: usize,
    /// Rows fetched so far, including the buffered page
    known: usize,
    /// Set once an empty page has been fetched and the transaction committed
    exhausted: bool,
}

impl OpenQuery {
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.schema.columns
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn known(&self) -> usize {
        self.known
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Write the buffered page and fetch the next one.
    fn advance<C: Client, H: Host>(
        &mut self,
        inv: &mut Invocation<'_, C, H>,
        page_size: usize,
    ) -> Result<Progress> {
        if self.exhausted || self.page.batch.is_empty() {
            self.finish(inv)?;
            return Ok(Progress::Finished);
        }

        let rows = materialize(&self.schema.columns, &self.page.batch, self.loaded, &mut *inv.host)?;
        self.loaded += rows;
        self.page = Page::default();

        self.page = pager::fetch_next(inv, page_size)?;
        self.known += self.page.num_rows();
        inv.save_macro("_obs", &self.known.to_string())?;

        if self.page.batch.is_empty() {
            self.finish(inv)?;
            inv.debug_line("no more data.");
            Ok(Progress::Finished)
        } else {
            inv.debug_line("more data.");
            Ok(Progress::More)
        }
    }

    fn finish<C: Client, H: Host>(&mut self, inv: &mut Invocation<'_, C, H>) -> Result<()> {
        if !self.exhausted {
            pager::commit(inv)?;
            self.exhausted = true;
        }
        Ok(())
    }
}

enum Phase<C> {
    Disconnected,
    Idle(C),
    OpenQuery(C, OpenQuery),
}

impl<C> Default for Phase<C> {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// One connection and at most one open query
///
/// Every operation leaves the session in exactly one of the three phases.
/// Failures clean up before they are returned: an open query is rolled back
/// and dropped, and a broken connection is torn down.
pub struct Session<K: Connector = PgConnector> {
    connector: K,
    phase: Phase<K::Client>,
    page_size: usize,
}

impl Default for Session<PgConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl Session<PgConnector> {
    pub fn new() -> Self {
        Self::with_connector(PgConnector)
    }
}

impl<K: Connector> Session<K> {
    pub fn with_connector(connector: K) -> Self {
        Self {
            connector,
            phase: Phase::Disconnected,
            page_size: CURSOR_PAGE_ROWS,
        }
    }

    /// Rows per cursor fetch
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Disconnected => SessionPhase::Disconnected,
            Phase::Idle(_) => SessionPhase::Idle,
            Phase::OpenQuery(..) => SessionPhase::OpenQuery,
        }
    }

    pub fn open_query(&self) -> Option<&OpenQuery> {
        match &self.phase {
            Phase::OpenQuery(_, query) => Some(query),
            _ => None,
        }
    }

    pub fn client(&self) -> Option<&K::Client> {
        match &self.phase {
            Phase::Disconnected => None,
            Phase::Idle(client) | Phase::OpenQuery(client, _) => Some(client),
        }
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Open the session's connection, replacing any existing one.
    #[tracing::instrument(skip_all)]
    pub fn connect<H: Host>(&mut self, conninfo: &str, host: &mut H, debug: bool) -> Result<()> {
        if !matches!(self.phase, Phase::Disconnected) {
            host.error("already connected: closing existing connection first");
            self.teardown(host, debug);
        }

        let client = self.connector.connect(conninfo).map_err(Error::connection)?;
        self.phase = Phase::Idle(client);
        tracing::debug!("connected");
        if debug {
            host.display("DEBUG: connected successfully");
        }
        Ok(())
    }

    /// Roll back, release everything and close the connection. Never fails.
    #[tracing::instrument(skip_all)]
    pub fn disconnect<H: Host>(&mut self, host: &mut H, debug: bool) {
        self.teardown(host, debug);
    }

    /// Open a cursor for `sql`, resolve its columns and publish them.
    ///
    /// Publishes `_obs`, `_vars`, `_types` and `_fmts` on success.
    #[tracing::instrument(skip_all)]
    pub fn prepare<H: Host>(&mut self, sql: &str, host: &mut H, debug: bool) -> Result<()> {
        self.ensure_connected(host, debug)?;
        if host.nobs() != 0 {
            return Err(Error::DataInMemory);
        }
        if matches!(self.phase, Phase::OpenQuery(..)) {
            tracing::debug!("replacing the open query");
            self.cleanup(host, debug);
        } else if self.client().is_some_and(Client::in_transaction) {
            tracing::debug!("rolling back a transaction left open by an earlier failure");
            self.cleanup(host, debug);
        }

        let page_size = self.page_size;
        let result = match &mut self.phase {
            Phase::Idle(client) => {
                let mut inv = Invocation::new(client, &mut *host, debug);
                open_query(&mut inv, sql, page_size)
            }
            _ => Err(crate::error::eyre!("session is not idle after cleanup").into()),
        };

        match result {
            Ok(query) => {
                self.phase = match mem::take(&mut self.phase) {
                    Phase::Idle(client) => Phase::OpenQuery(client, query),
                    other => other,
                };
                Ok(())
            }
            Err(e) => Err(self.fail(e, host, debug)),
        }
    }

    /// Write the buffered page into the host and fetch the next one.
    #[tracing::instrument(skip_all)]
    pub fn populate_next<H: Host>(&mut self, host: &mut H, debug: bool) -> Result<Progress> {
        self.ensure_connected(host, debug)?;

        let page_size = self.page_size;
        let result = match &mut self.phase {
            Phase::OpenQuery(client, query) => {
                let mut inv = Invocation::new(client, &mut *host, debug);
                query.advance(&mut inv, page_size)
            }
            Phase::Idle(_) => Err(Error::NoPreparedQuery),
            Phase::Disconnected => Err(Error::NotConnected),
        };

        match result {
            Ok(progress) => {
                if let Some(query) = self.open_query() {
                    tracing::debug!(loaded = query.loaded, known = query.known, ?progress);
                }
                Ok(progress)
            }
            Err(Error::NoPreparedQuery) => Err(Error::NoPreparedQuery),
            Err(e) => Err(self.fail(e, host, debug)),
        }
    }

    /// Bring the session back to a usable phase after `err`.
    fn fail<H: Host>(&mut self, err: Error, host: &mut H, debug: bool) -> Error {
        tracing::debug!(error = %err, "cleaning up after failure");
        let broken = err.is_connection_broken() || self.client().is_some_and(Client::is_broken);
        if broken {
            self.teardown(host, debug);
        } else {
            self.cleanup(host, debug);
        }
        err
    }

    fn ensure_connected<H: Host>(&mut self, host: &mut H, debug: bool) -> Result<()> {
        let broken = match self.client() {
            None => return Err(Error::NotConnected),
            Some(client) => client.is_broken(),
        };
        if broken {
            tracing::warn!("connection is broken; tearing it down");
            self.teardown(host, debug);
            return Err(Error::connection(Error::NotConnected));
        }
        Ok(())
    }

    /// Drop the open query and roll back any transaction. Idempotent.
    fn cleanup<H: Host>(&mut self, host: &mut H, debug: bool) {
        self.phase = match mem::take(&mut self.phase) {
            Phase::OpenQuery(client, _) => Phase::Idle(client),
            other => other,
        };

        let Phase::Idle(client) = &mut self.phase else {
            return;
        };
        if client.in_transaction() && !client.is_broken() {
            let mut inv = Invocation::new(client, &mut *host, debug);
            inv.debug_line("cleanup(): rolling back transaction");
            if let Err(e) = pager::rollback(&mut inv) {
                tracing::error!(error = %e, "rollback failed");
                inv.host.error(&format!("rollback failed: {e}"));
            }
        }
    }

    /// Clean up, then close the connection if there is one. Idempotent.
    fn teardown<H: Host>(&mut self, host: &mut H, debug: bool) {
        self.cleanup(host, debug);
        if let Phase::Idle(client) = mem::take(&mut self.phase) {
            tracing::debug!("ending connection");
            if debug {
                host.display("DEBUG: teardown(): ending connection");
            }
            if let Err(e) = self.connector.disconnect(client) {
                tracing::warn!(error = %e, "error while closing the connection");
            }
        }
    }
}

fn open_query<C: Client, H: Host>(
    inv: &mut Invocation<'_, C, H>,
    sql: &str,
    page_size: usize,
) -> Result<OpenQuery> {
    let page = pager::open(inv, sql, page_size)?;
    let schema = schema::resolve(inv, &page);

    let known = page.num_rows();
    inv.save_macro("_obs", &known.to_string())?;
    inv.save_macro("_vars", &schema.vars())?;
    inv.save_macro("_types", &schema.types())?;
    inv.save_macro("_fmts", &schema.fmts())?;

    Ok(OpenQuery {
        schema,
        page,
        loaded: 0,
        known,
        exhausted: false,
    })
}
