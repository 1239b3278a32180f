pub mod batch;
pub mod buffer;
pub mod client;
pub mod constant;
pub mod date;
pub mod error;
pub mod handler;
pub mod host;
pub mod invocation;
pub mod materialize;
mod opts;
pub mod pager;
pub mod plugin;
pub mod protocol;
pub mod schema;
pub mod session;
pub mod sync;

pub use client::{Client, Connector, PgConnector};
pub use error::{Error, Result, ReturnCode};
pub use host::{Host, HostError, MemoryHost};
pub use opts::Opts;
pub use session::{Progress, Session, SessionPhase};
