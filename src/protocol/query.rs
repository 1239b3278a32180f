use crate::buffer::BufferSet;
use crate::constant::backend;
use crate::error::{Error, Result};
use crate::protocol::Action;
use crate::protocol::backend::{
    DataRow, RowDescription, ServerError, TransactionStatus, read_command_tag,
};
use crate::protocol::frontend::write_query;
use crate::protocol::r#trait::QueryHandler;

/// Internal state of the SimpleQuery state machine
enum QueryState {
    /// Query not yet written
    Start,
    /// Reading responses until ReadyForQuery
    ReadingResponses,
    /// ReadyForQuery seen
    Finished,
}

/// State machine for the simple query protocol with integrated handler
///
/// Server errors and handler errors do not stop the machine: the first one is
/// remembered and returned once ReadyForQuery arrives, so the connection is
/// always left ready for the next query.
pub struct SimpleQuery<'h, H> {
    state: QueryState,
    handler: &'h mut H,
    error: Option<Error>,
    transaction_status: TransactionStatus,
}

impl<'h, H: QueryHandler> SimpleQuery<'h, H> {
    pub fn new(handler: &'h mut H) -> Self {
        Self {
            state: QueryState::Start,
            handler,
            error: None,
            transaction_status: TransactionStatus::Idle,
        }
    }

    /// Write the Query message into the buffer set's write buffer.
    pub fn start(&mut self, sql: &str, buffer_set: &mut BufferSet) -> Result<()> {
        match self.state {
            QueryState::Start => {
                write_query(buffer_set.new_write_buffer(), sql)?;
                self.state = QueryState::ReadingResponses;
                Ok(())
            }
            _ => Err(Error::BadUsageError(
                "simple query already started".to_string(),
            )),
        }
    }

    /// Transaction status from the final ReadyForQuery
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    fn defer<T>(&mut self, result: Result<T>) {
        if self.error.is_none() {
            self.error = result.err();
        }
    }

    /// Drive the state machine with the message held in `buffer_set`
    ///
    /// # Returns
    /// * `Action::NeedMessage` - Read the next backend message and call again
    /// * `Action::Finished` - ReadyForQuery received and no error occurred
    pub fn step(&mut self, buffer_set: &BufferSet) -> Result<Action> {
        if !matches!(self.state, QueryState::ReadingResponses) {
            return Err(Error::BadUsageError(
                "simple query is not reading responses".to_string(),
            ));
        }

        let payload = &buffer_set.read_buffer[..];
        match buffer_set.type_byte {
            backend::ROW_DESCRIPTION => {
                if self.error.is_none() {
                    let result = RowDescription::parse(payload)
                        .and_then(|desc| self.handler.columns(desc));
                    self.defer(result);
                }
            }
            backend::DATA_ROW => {
                if self.error.is_none() {
                    let result = DataRow::parse(payload).and_then(|row| self.handler.row(row));
                    self.defer(result);
                }
            }
            backend::COMMAND_COMPLETE => {
                if self.error.is_none() {
                    let result = read_command_tag(payload)
                        .and_then(|tag| self.handler.command_complete(tag));
                    self.defer(result);
                }
            }
            backend::EMPTY_QUERY => {}
            backend::ERROR_RESPONSE => {
                let err = ServerError::parse(payload)?;
                self.defer::<()>(Err(err.into()));
            }
            backend::NOTICE_RESPONSE => {
                let notice = ServerError::parse(payload)?;
                tracing::warn!(sql_state = %notice.sql_state, "{notice}");
            }
            backend::PARAMETER_STATUS | backend::NOTIFICATION => {}
            backend::COPY_IN_RESPONSE | backend::COPY_OUT_RESPONSE => {
                return Err(Error::InvalidMessage(
                    "COPY is not supported by the simple query client".to_string(),
                ));
            }
            backend::READY_FOR_QUERY => {
                self.transaction_status = TransactionStatus::parse(payload)?;
                self.state = QueryState::Finished;
                return match self.error.take() {
                    Some(err) => Err(err),
                    None => Ok(Action::Finished),
                };
            }
            other => {
                return Err(Error::InvalidMessage(format!(
                    "unexpected message type '{}' during query",
                    char::from(other)
                )));
            }
        }
        Ok(Action::NeedMessage)
    }
}
