//! Backend (server to client) message decoding.

use crate::constant::Oid;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U32 as U32BE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// ErrorResponse as sent by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerError {
    pub severity: String,
    pub sql_state: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:  {}", self.severity, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL:  {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT:  {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    /// Parse the field list shared by ErrorResponse and NoticeResponse.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut err = ServerError::default();
        let mut data = payload;
        loop {
            let (code, rest) = read_int_1(data)?;
            if code == 0 {
                break;
            }
            let (value, rest) = read_string_null(rest)?;
            let value = String::from_utf8_lossy(value).into_owned();
            match code {
                // 'V' is the non-localized severity; prefer it when present
                b'S' if err.severity.is_empty() => err.severity = value,
                b'V' => err.severity = value,
                b'C' => err.sql_state = value,
                b'M' => err.message = value,
                b'D' => err.detail = Some(value),
                b'H' => err.hint = Some(value),
                _ => {}
            }
            data = rest;
        }
        Ok(err)
    }
}

/// Transaction status reported by ReadyForQuery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    #[default]
    Idle,
    InTransaction,
    Failed,
}

impl TransactionStatus {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match read_int_1(payload)?.0 {
            b'I' => Ok(Self::Idle),
            b'T' => Ok(Self::InTransaction),
            b'E' => Ok(Self::Failed),
            other => Err(Error::InvalidMessage(format!(
                "unknown transaction status 0x{other:02X}"
            ))),
        }
    }

    /// Both an open and a failed transaction need a ROLLBACK.
    pub fn in_transaction(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Fixed-size tail of a RowDescription field (18 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct FieldDescriptionTail {
    table_oid: U32BE,
    column_attr: I16BE,
    type_oid: U32BE,
    type_size: I16BE,
    type_modifier: I32BE,
    format: I16BE,
}

impl FieldDescriptionTail {
    /// Zero when the field is not a plain table column
    pub fn table_oid(&self) -> u32 {
        self.table_oid.get()
    }

    pub fn column_attr(&self) -> i16 {
        self.column_attr.get()
    }

    pub fn type_oid(&self) -> Oid {
        Oid(self.type_oid.get())
    }

    pub fn type_size(&self) -> i16 {
        self.type_size.get()
    }

    pub fn type_modifier(&self) -> i32 {
        self.type_modifier.get()
    }

    pub fn format(&self) -> i16 {
        self.format.get()
    }
}

/// One field of a RowDescription
#[derive(Debug, Clone, Copy)]
pub struct FieldDescription<'a> {
    pub name: &'a [u8],
    pub tail: &'a FieldDescriptionTail,
}

/// RowDescription message payload
#[derive(Debug, Clone, Copy)]
pub struct RowDescription<'a> {
    num_fields: usize,
    data: &'a [u8],
}

impl<'a> RowDescription<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_fields, data) = read_int_2(payload)?;
        let num_fields = usize::try_from(num_fields)
            .map_err(|_| Error::InvalidMessage(format!("negative field count {num_fields}")))?;
        Ok(Self { num_fields, data })
    }

    pub fn len(&self) -> usize {
        self.num_fields
    }

    pub fn is_empty(&self) -> bool {
        self.num_fields == 0
    }

    pub fn fields(&self) -> Result<Vec<FieldDescription<'a>>> {
        let mut fields = Vec::with_capacity(self.num_fields);
        let mut data = self.data;
        for _ in 0..self.num_fields {
            let (name, rest) = read_string_null(data)?;
            let (tail, rest) = FieldDescriptionTail::ref_from_prefix(rest).map_err(|_| {
                Error::InvalidMessage("field description too short".to_string())
            })?;
            fields.push(FieldDescription { name, tail });
            data = rest;
        }
        Ok(fields)
    }
}

/// DataRow message payload; cells are text-format values
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    num_columns: usize,
    data: &'a [u8],
}

impl<'a> DataRow<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_columns, data) = read_int_2(payload)?;
        let num_columns = usize::try_from(num_columns)
            .map_err(|_| Error::InvalidMessage(format!("negative column count {num_columns}")))?;
        Ok(Self { num_columns, data })
    }

    pub fn len(&self) -> usize {
        self.num_columns
    }

    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Iterate over cells; `None` is SQL NULL.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.num_columns,
            data: self.data,
        }
    }
}

pub struct DataRowIter<'a> {
    remaining: usize,
    data: &'a [u8],
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let cell = read_int_4(self.data).and_then(|(len, rest)| {
            if len < 0 {
                self.data = rest;
                return Ok(None);
            }
            let (value, rest) = read_bytes_fix(rest, len as usize)?;
            self.data = rest;
            Ok(Some(value))
        });
        if cell.is_err() {
            self.remaining = 0;
        }
        Some(cell)
    }
}

/// CommandComplete tag, e.g. `FETCH 10000` or `BEGIN`
pub fn read_command_tag(payload: &[u8]) -> Result<&str> {
    let (tag, _) = read_string_null(payload)?;
    std::str::from_utf8(tag)
        .map_err(|e| Error::InvalidMessage(format!("command tag is not UTF-8: {e}")))
}

/// Authentication request sent during startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest<'a> {
    Ok,
    CleartextPassword,
    Md5Password { salt: [u8; 4] },
    Sasl { mechanisms: Vec<&'a str> },
    SaslContinue { data: &'a [u8] },
    SaslFinal { data: &'a [u8] },
    Other(i32),
}

impl<'a> AuthRequest<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        use crate::constant::auth;

        let (code, rest) = read_int_4(payload)?;
        Ok(match code {
            auth::OK => Self::Ok,
            auth::CLEARTEXT_PASSWORD => Self::CleartextPassword,
            auth::MD5_PASSWORD => {
                let (salt, _) = read_bytes_fix(rest, 4)?;
                let mut buf = [0u8; 4];
                buf.copy_from_slice(salt);
                Self::Md5Password { salt: buf }
            }
            auth::SASL => {
                let mut mechanisms = Vec::new();
                let mut data = rest;
                loop {
                    let (name, tail) = read_string_null(data)?;
                    if name.is_empty() {
                        break;
                    }
                    mechanisms.push(std::str::from_utf8(name).map_err(|e| {
                        Error::InvalidMessage(format!("SASL mechanism is not UTF-8: {e}"))
                    })?);
                    data = tail;
                }
                Self::Sasl { mechanisms }
            }
            auth::SASL_CONTINUE => Self::SaslContinue { data: rest },
            auth::SASL_FINAL => Self::SaslFinal { data: rest },
            other => Self::Other(other),
        })
    }
}
