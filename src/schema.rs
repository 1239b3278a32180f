//! Mapping of wire types onto host storage types, resolved once per query.

use crate::batch::{Field, Page};
use crate::client::Client;
use crate::constant::{MAX_STR_WIDTH, Oid, TYPNAME_SAVEPOINT, VARHDRSZ};
use crate::error::Result;
use crate::host::Host;
use crate::invocation::Invocation;

/// Storage type of a host column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostType {
    /// 0/1 for booleans
    Byte,
    /// Integer values stored in a 4-byte host integer
    Long,
    Double,
    /// Fixed-width string of the declared width
    Str(usize),
    /// Any other text, truncated to [`MAX_STR_WIDTH`]
    Str244,
    /// Days since 1960-01-01
    Date,
}

impl HostType {
    /// Keyword the host script uses to allocate the column
    pub fn keyword(self) -> String {
        match self {
            Self::Byte => "byte".to_string(),
            Self::Long | Self::Date => "long".to_string(),
            Self::Double => "double".to_string(),
            Self::Str(width) => format!("str{width}"),
            Self::Str244 => format!("str{MAX_STR_WIDTH}"),
        }
    }

    /// Display format tag for the column
    pub fn format(self) -> &'static str {
        match self {
            Self::Date => "%d",
            _ => "default",
        }
    }
}

/// How a wire type maps onto the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    Supported(HostType),
    /// Known type read as text; carries the type name for the warning
    Partial(&'static str),
    /// Unknown type read as text; its name has to be looked up
    Unknown,
}

impl Mapping {
    pub fn for_field(field: &Field) -> Self {
        let host_type = match field.type_oid {
            Oid::BOOL => HostType::Byte,
            // A host int is too narrow for the full int2 range plus missing codes.
            Oid::INT2 => HostType::Long,
            Oid::INT4 | Oid::INT8 | Oid::FLOAT4 | Oid::FLOAT8 | Oid::NUMERIC => HostType::Double,
            Oid::BPCHAR | Oid::VARCHAR => declared_width(field.type_modifier)
                .map_or(HostType::Str244, HostType::Str),
            Oid::TEXT => HostType::Str244,
            Oid::DATE | Oid::TIMESTAMP | Oid::TIMESTAMPTZ => HostType::Date,
            oid => {
                return match oid.partial_support_name() {
                    Some(name) => Self::Partial(name),
                    None => Self::Unknown,
                };
            }
        };
        Self::Supported(host_type)
    }
}

/// Width declared by a `char(N)`/`varchar(N)` modifier, if the host can hold it
///
/// Wider or undeclared widths fall back to bounded text.
fn declared_width(type_modifier: i32) -> Option<usize> {
    let width = type_modifier.checked_sub(VARHDRSZ)?;
    match usize::try_from(width) {
        Ok(width) if width > 0 && width <= MAX_STR_WIDTH => Some(width),
        _ => None,
    }
}

/// One column of the open query; fixed for the query's lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field: Field,
    pub host_type: HostType,
}

impl ColumnDescriptor {
    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn format(&self) -> &'static str {
        self.host_type.format()
    }
}

/// The resolved columns and the metadata published to the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnDescriptor>,
}

impl Schema {
    /// Space-separated column names
    pub fn vars(&self) -> String {
        self.join(|c| c.name().to_string())
    }

    /// Space-separated storage type keywords
    pub fn types(&self) -> String {
        self.join(|c| c.host_type.keyword())
    }

    /// Space-separated display format tags
    pub fn fmts(&self) -> String {
        self.join(|c| c.format().to_string())
    }

    fn join(&self, f: impl Fn(&ColumnDescriptor) -> String) -> String {
        self.columns.iter().map(f).collect::<Vec<_>>().join(" ")
    }
}

/// Resolve the columns of the first page.
///
/// Degraded columns produce a warning on the host error stream and never fail
/// the resolution.
pub fn resolve<C: Client, H: Host>(inv: &mut Invocation<'_, C, H>, page: &Page) -> Schema {
    let mut columns = Vec::with_capacity(page.fields.len());
    for field in &page.fields {
        let host_type = match Mapping::for_field(field) {
            Mapping::Supported(host_type) => host_type,
            Mapping::Partial(name) => degrade(inv, field, name),
            Mapping::Unknown => {
                let name = lookup_type_name(inv, field.type_oid);
                degrade(inv, field, &name)
            }
        };
        inv.debug_line(format_args!(
            "name={} size={} oid={} mod={}",
            field.name, field.type_size, field.type_oid, field.type_modifier
        ));
        columns.push(ColumnDescriptor {
            field: field.clone(),
            host_type,
        });
    }
    Schema { columns }
}

fn degrade<C: Client, H: Host>(
    inv: &mut Invocation<'_, C, H>,
    field: &Field,
    type_name: &str,
) -> HostType {
    inv.warn(format_args!(
        "Type \"{type_name}\" (column {}) is only partially supported: treating it as str{MAX_STR_WIDTH}",
        field.name
    ));
    HostType::Str244
}

/// Name of a type from `pg_type`, or `"unknown"` when the lookup fails
///
/// The lookup runs inside a savepoint so a failure leaves the cursor's
/// transaction usable.
pub fn lookup_type_name<C: Client, H: Host>(inv: &mut Invocation<'_, C, H>, oid: Oid) -> String {
    match try_lookup_type_name(inv, oid) {
        Ok(Some(name)) => name,
        Ok(None) => "unknown".to_string(),
        Err(e) => {
            inv.warn(format_args!("Internal error: type-name lookup failed.\n{e}"));
            "unknown".to_string()
        }
    }
}

fn try_lookup_type_name<C: Client, H: Host>(
    inv: &mut Invocation<'_, C, H>,
    oid: Oid,
) -> Result<Option<String>> {
    inv.execute(&format!("SAVEPOINT {TYPNAME_SAVEPOINT}"))?;
    let result = inv.fetch(&format!(
        "SELECT typname FROM pg_type WHERE oid={oid} LIMIT 1"
    ));
    if result.is_err() {
        inv.execute(&format!("ROLLBACK TO SAVEPOINT {TYPNAME_SAVEPOINT}"))?;
    }
    inv.execute(&format!("RELEASE SAVEPOINT {TYPNAME_SAVEPOINT}"))?;
    Ok(result?.first_value().map(ToString::to_string))
}
