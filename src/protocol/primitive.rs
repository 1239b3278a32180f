use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE};

fn eof(what: &str) -> Error {
    Error::InvalidMessage(format!("unexpected end of message reading {what}"))
}

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&byte, rest)) => Ok((byte, rest)),
        None => Err(eof("int8")),
    }
}

/// Read 2-byte big-endian signed integer
pub fn read_int_2(data: &[u8]) -> Result<(i16, &[u8])> {
    let (value, rest) = I16BE::ref_from_prefix(data).map_err(|_| eof("int16"))?;
    Ok((value.get(), rest))
}

/// Read 4-byte big-endian signed integer
pub fn read_int_4(data: &[u8]) -> Result<(i32, &[u8])> {
    let (value, rest) = I32BE::ref_from_prefix(data).map_err(|_| eof("int32"))?;
    Ok((value.get(), rest))
}

/// Read fixed-length bytes
pub fn read_bytes_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(eof("bytes"));
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match data.iter().position(|&b| b == 0) {
        Some(i) => Ok((&data[..i], &data[i + 1..])),
        None => Err(eof("cstring")),
    }
}

pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_int_4(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn write_string_null(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

/// Begin a message whose length is patched in by [`finish_message`].
///
/// Returns the offset of the length field.
pub fn start_message(out: &mut Vec<u8>, type_byte: Option<u8>) -> usize {
    if let Some(type_byte) = type_byte {
        out.push(type_byte);
    }
    let offset = out.len();
    out.extend_from_slice(&[0; 4]);
    offset
}

/// Patch the length field written by [`start_message`].
pub fn finish_message(out: &mut [u8], offset: usize) -> Result<()> {
    let len = i32::try_from(out.len() - offset)
        .map_err(|_| Error::BadUsageError("message exceeds 2 GiB".to_string()))?;
    out[offset..offset + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}
