use std::fmt::Display;

use crate::batch::Page;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::host::Host;

/// The collaborators of one host invocation
///
/// Every statement goes through here so it is traced, and echoed to the host
/// display when the invocation asked for `debug`.
pub struct Invocation<'a, C, H> {
    pub client: &'a mut C,
    pub host: &'a mut H,
    pub debug: bool,
}

impl<'a, C: Client, H: Host> Invocation<'a, C, H> {
    pub fn new(client: &'a mut C, host: &'a mut H, debug: bool) -> Self {
        Self {
            client,
            host,
            debug,
        }
    }

    pub fn execute(&mut self, sql: &str) -> Result<()> {
        self.trace_statement(sql);
        self.client.execute(sql)
    }

    pub fn fetch(&mut self, sql: &str) -> Result<Page> {
        self.trace_statement(sql);
        self.client.fetch(sql)
    }

    fn trace_statement(&mut self, sql: &str) {
        tracing::debug!(sql, "statement");
        if self.debug {
            self.host.display(sql);
        }
    }

    /// A `DEBUG:` line, shown only in debug mode
    pub fn debug_line(&mut self, msg: impl Display) {
        tracing::debug!("{msg}");
        if self.debug {
            self.host.display(&format!("DEBUG: {msg}"));
        }
    }

    /// A non-fatal diagnostic, always shown
    pub fn warn(&mut self, msg: impl Display) {
        let msg = msg.to_string();
        tracing::warn!("{msg}");
        self.host.error(&msg);
    }

    pub fn save_macro(&mut self, name: &'static str, value: &str) -> Result<()> {
        if self.debug {
            self.host.display(&format!("DEBUG: {name}: {value}"));
        }
        self.host
            .save_macro(name, value)
            .map_err(|source| Error::HostMacro { name, source })
    }
}
