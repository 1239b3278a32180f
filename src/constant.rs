/// Rows requested per `FETCH FORWARD`.
///
/// Throughput over a network link is largely insensitive to this value, but
/// it bounds how many rows a single page keeps in memory.
pub const CURSOR_PAGE_ROWS: usize = 10_000;

/// Name of the server-side cursor declared by `prepare`.
pub const CURSOR_NAME: &str = "pgload_cursor";

/// Savepoint guarding type-name lookups inside the cursor's transaction.
pub const TYPNAME_SAVEPOINT: &str = "pgload_typname";

/// Widest fixed string the host can store.
pub const MAX_STR_WIDTH: usize = 244;

/// Size of the varlena header included in a character type's modifier.
pub const VARHDRSZ: i32 = 4;

/// Text pattern the server uses for dates under `DateStyle=ISO`.
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Protocol version 3.0
pub const PROTOCOL_VERSION: i32 = 196_608;

pub const DEFAULT_PORT: u16 = 5432;

/// Well-known type OIDs from `pg_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid(pub u32);

impl Oid {
    pub const BOOL: Oid = Oid(16);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const MONEY: Oid = Oid(790);
    pub const BPCHAR: Oid = Oid(1042);
    pub const VARCHAR: Oid = Oid(1043);
    pub const DATE: Oid = Oid(1082);
    pub const TIME: Oid = Oid(1083);
    pub const TIMESTAMP: Oid = Oid(1114);
    pub const TIMESTAMPTZ: Oid = Oid(1184);
    pub const INTERVAL: Oid = Oid(1186);
    pub const TIMETZ: Oid = Oid(1266);
    pub const NUMERIC: Oid = Oid(1700);

    /// Name of a type that is recognised but only partially supported.
    pub fn partial_support_name(self) -> Option<&'static str> {
        match self {
            Self::MONEY => Some("money"),
            Self::INTERVAL => Some("interval"),
            Self::TIME => Some("time"),
            Self::TIMETZ => Some("timetz"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Frontend message type bytes
pub mod frontend {
    pub const QUERY: u8 = b'Q';
    pub const PASSWORD: u8 = b'p';
    pub const TERMINATE: u8 = b'X';
}

/// Backend message type bytes
pub mod backend {
    pub const AUTHENTICATION: u8 = b'R';
    pub const BACKEND_KEY_DATA: u8 = b'K';
    pub const COMMAND_COMPLETE: u8 = b'C';
    pub const DATA_ROW: u8 = b'D';
    pub const EMPTY_QUERY: u8 = b'I';
    pub const ERROR_RESPONSE: u8 = b'E';
    pub const NOTICE_RESPONSE: u8 = b'N';
    pub const NOTIFICATION: u8 = b'A';
    pub const PARAMETER_STATUS: u8 = b'S';
    pub const READY_FOR_QUERY: u8 = b'Z';
    pub const ROW_DESCRIPTION: u8 = b'T';
    pub const COPY_IN_RESPONSE: u8 = b'G';
    pub const COPY_OUT_RESPONSE: u8 = b'H';
}

/// Authentication request codes carried by an `R` message
pub mod auth {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SASL: i32 = 10;
    pub const SASL_CONTINUE: i32 = 11;
    pub const SASL_FINAL: i32 = 12;
}
