pub mod auth;
pub mod backend;
pub mod frontend;
pub mod primitive;
pub mod query;
pub mod r#trait;

pub use backend::{DataRow, RowDescription};
pub use r#trait::QueryHandler;

/// Action returned by state machines indicating what I/O operation is needed next
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// State machine needs the next backend message in the buffer set
    NeedMessage,
    /// State machine has finished processing
    Finished,
}
