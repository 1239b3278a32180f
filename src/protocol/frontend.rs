//! Frontend (client to server) message encoding.

use crate::constant::{PROTOCOL_VERSION, frontend};
use crate::error::Result;
use crate::protocol::primitive::*;

/// Write a StartupMessage with the given run-time parameters
pub fn write_startup(out: &mut Vec<u8>, params: &[(&str, &str)]) -> Result<()> {
    let offset = start_message(out, None);
    write_int_4(out, PROTOCOL_VERSION);
    for (name, value) in params {
        write_string_null(out, name);
        write_string_null(out, value);
    }
    write_int_1(out, 0);
    finish_message(out, offset)
}

/// Write a simple Query message
pub fn write_query(out: &mut Vec<u8>, sql: &str) -> Result<()> {
    let offset = start_message(out, Some(frontend::QUERY));
    write_string_null(out, sql);
    finish_message(out, offset)
}

/// Write a PasswordMessage (cleartext or md5-hashed)
pub fn write_password(out: &mut Vec<u8>, password: &str) -> Result<()> {
    let offset = start_message(out, Some(frontend::PASSWORD));
    write_string_null(out, password);
    finish_message(out, offset)
}

/// Write a SASLInitialResponse
pub fn write_sasl_initial_response(out: &mut Vec<u8>, mechanism: &str, data: &[u8]) -> Result<()> {
    let offset = start_message(out, Some(frontend::PASSWORD));
    write_string_null(out, mechanism);
    let len = i32::try_from(data.len()).unwrap_or(i32::MAX);
    write_int_4(out, len);
    out.extend_from_slice(data);
    finish_message(out, offset)
}

/// Write a SASLResponse
pub fn write_sasl_response(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let offset = start_message(out, Some(frontend::PASSWORD));
    out.extend_from_slice(data);
    finish_message(out, offset)
}

/// Write a Terminate message
pub fn write_terminate(out: &mut Vec<u8>) {
    out.extend_from_slice(&[frontend::TERMINATE, 0, 0, 0, 4]);
}
