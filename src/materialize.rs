//! Typed writes of one page into host storage.

use chrono::NaiveDate;

use crate::batch::Batch;
use crate::constant::{MAX_STR_WIDTH, WIRE_DATE_FORMAT};
use crate::date;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::schema::{ColumnDescriptor, HostType};

/// A converted cell, ready to be stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Number(f64),
    Text(&'a str),
    /// Leave the host's missing value in place
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertError {
    Number,
    Date,
}

impl HostType {
    /// Convert the text of a non-null cell for this storage type.
    pub fn convert(self, text: &str) -> std::result::Result<Cell<'_>, ConvertError> {
        match self {
            Self::Byte => {
                let truthy = text
                    .as_bytes()
                    .first()
                    .is_some_and(|b| b.eq_ignore_ascii_case(&b't'));
                Ok(Cell::Number(if truthy { 1.0 } else { 0.0 }))
            }
            Self::Long => text
                .trim()
                .parse::<i64>()
                .map(|n| Cell::Number(n as f64))
                .map_err(|_| ConvertError::Number),
            Self::Double => {
                let value: f64 = text.trim().parse().map_err(|_| ConvertError::Number)?;
                Ok(if value.is_finite() {
                    Cell::Number(value)
                } else {
                    Cell::Missing
                })
            }
            // The server enforces the declared width of varchar(N) and char(N)
            Self::Str(_) => Ok(Cell::Text(text)),
            Self::Str244 => Ok(Cell::Text(truncate(text, MAX_STR_WIDTH))),
            Self::Date => {
                let (date, _time) = NaiveDate::parse_and_remainder(text, WIRE_DATE_FORMAT)
                    .map_err(|_| ConvertError::Date)?;
                Ok(Cell::Number(date::from_naive_date(date) as f64))
            }
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Store every non-null cell of `batch` into the host.
///
/// Local row `i` lands on host row `loaded + i + 1`, column `j` on host
/// column `j + 1`. The first failing cell aborts the batch. Returns the
/// number of rows materialized.
pub fn materialize<H: Host>(
    columns: &[ColumnDescriptor],
    batch: &Batch,
    loaded: usize,
    host: &mut H,
) -> Result<usize> {
    for i in 0..batch.num_rows() {
        let obs = loaded + i + 1;
        for (j, column) in columns.iter().enumerate() {
            let var = j + 1;
            let Some(bytes) = batch.cell(i, j) else {
                continue;
            };
            let text = simdutf8::basic::from_utf8(bytes).map_err(|_| Error::ValueParse {
                obs,
                var,
                value: String::from_utf8_lossy(bytes).into_owned(),
            })?;

            let stored = match column.host_type.convert(text) {
                Ok(Cell::Number(value)) => host.store_number(var, obs, value),
                Ok(Cell::Text(value)) => host.store_str(var, obs, value),
                Ok(Cell::Missing) => Ok(()),
                Err(ConvertError::Date) => {
                    return Err(Error::DateParse {
                        obs,
                        var,
                        value: text.to_string(),
                    });
                }
                Err(ConvertError::Number) => {
                    return Err(Error::ValueParse {
                        obs,
                        var,
                        value: text.to_string(),
                    });
                }
            };
            stored.map_err(|source| Error::HostWrite {
                oid: column.field.type_oid.0,
                obs,
                var,
                source,
            })?;
        }
    }
    Ok(batch.num_rows())
}
