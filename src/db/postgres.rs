//! PostgreSQL connection pool via `deadpool-postgres`.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use postgres_types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio_postgres::NoTls;
use tokio_postgres::Row;

use crate::config::DatabaseConfig;
use crate::db::{
    BoundStatement, ConnectionLease, ConnectionPool, Cursor, LeaseTracker, LeaseUsage,
    PlaceholderStyle, PooledConnection, SqlValue,
};
use crate::error::DatabaseError;

/// Bounded pool of PostgreSQL clients.
pub struct PgPool {
    pool: Pool,
    tracker: Arc<LeaseTracker>,
}

impl PgPool {
    /// Build the pool. Connections are opened lazily on first acquire.
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url()
            .ok_or_else(|| DatabaseError::Pool("DATABASE_URL is not set".to_string()))?;

        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.pool_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        tracing::info!(max_size = config.pool_size, "PostgreSQL connection pool ready");
        Ok(Self {
            pool,
            tracker: LeaseTracker::new(),
        })
    }
}

#[async_trait]
impl ConnectionPool for PgPool {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::DollarNumbered
    }

    async fn acquire(&self) -> Result<ConnectionLease, DatabaseError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;
        Ok(self.tracker.lease(Box::new(PgConnection(client))))
    }

    fn usage(&self) -> LeaseUsage {
        self.tracker.usage()
    }

    fn close(&self) {
        tracing::info!("closing PostgreSQL connection pool");
        self.pool.close();
    }
}

struct PgConnection(deadpool_postgres::Object);

#[async_trait]
impl PooledConnection for PgConnection {
    async fn execute(&mut self, statement: &BoundStatement) -> Result<Cursor, DatabaseError> {
        let prepared = self
            .0
            .prepare_cached(statement.sql())
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        // Column names come from the prepared statement so they survive an
        // empty result set.
        let columns = prepared
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let params: Vec<&(dyn ToSql + Sync)> = statement
            .values()
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();

        let rows = self
            .0
            .query(&prepared, &params)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let fetched = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        Ok(Cursor::new(columns, fetched))
    }
}

fn decode_row(row: &Row) -> Result<Vec<SqlValue>, tokio_postgres::Error> {
    (0..row.len())
        .map(|idx| {
            row.try_get::<_, Option<ColumnValue>>(idx)
                .map(|v| v.map_or(SqlValue::Null, |v| v.0))
        })
        .collect()
}

/// A result column of any PostgreSQL type.
///
/// Common types decode to their natural [`SqlValue`]. Types without a scalar
/// counterpart are rendered as text, arrays as JSON array text, and anything
/// unrecognized keeps its raw bytes as a blob.
struct ColumnValue(SqlValue);

type CodecError = Box<dyn std::error::Error + Sync + Send>;

impl<'a> FromSql<'a> for ColumnValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, CodecError> {
        match ty.kind() {
            Kind::Array(_) => {
                let items = Vec::<Option<ColumnValue>>::from_sql(ty, raw)?
                    .into_iter()
                    .map(|item| item.map_or(SqlValue::Null, |v| v.0))
                    .collect::<Vec<_>>();
                return Ok(Self(SqlValue::Text(serde_json::to_string(&items)?)));
            }
            Kind::Enum(_) => return Ok(Self(SqlValue::Text(String::from_sql(&Type::TEXT, raw)?))),
            Kind::Domain(base) => return Self::from_sql(base, raw),
            _ => {}
        }

        let value = match *ty {
            Type::BOOL => SqlValue::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => SqlValue::Integer(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => SqlValue::Integer(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => SqlValue::Integer(i64::from_sql(ty, raw)?),
            Type::OID => SqlValue::Integer(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => SqlValue::Real(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => SqlValue::Real(f64::from_sql(ty, raw)?),
            Type::NUMERIC => SqlValue::Numeric(Decimal::from_sql(ty, raw)?),
            Type::MONEY => SqlValue::Numeric(Decimal::new(i64::from_be_bytes(fixed(raw)?), 2)),
            Type::CHAR => SqlValue::Text(char::from(i8::from_sql(ty, raw)? as u8).to_string()),
            Type::TIMESTAMPTZ => SqlValue::Text(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339()),
            Type::TIMESTAMP => SqlValue::Text(NaiveDateTime::from_sql(ty, raw)?.to_string()),
            Type::DATE => SqlValue::Text(NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => SqlValue::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::INTERVAL => SqlValue::Text(interval_text(raw)?),
            Type::UUID => SqlValue::Text(uuid::Uuid::from_sql(ty, raw)?.to_string()),
            Type::INET | Type::CIDR => SqlValue::Text(IpAddr::from_sql(&Type::INET, raw)?.to_string()),
            Type::JSON | Type::JSONB => {
                SqlValue::Text(serde_json::Value::from_sql(ty, raw)?.to_string())
            }
            Type::BYTEA => SqlValue::Blob(raw.to_vec()),
            _ if <&str as FromSql<'_>>::accepts(ty) => SqlValue::Text(String::from_sql(ty, raw)?),
            _ => SqlValue::Blob(raw.to_vec()),
        };
        Ok(Self(value))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn fixed<const N: usize>(raw: &[u8]) -> Result<[u8; N], CodecError> {
    raw.try_into()
        .map_err(|_| format!("expected {N} bytes, got {}", raw.len()).into())
}

/// Render an INTERVAL the way `psql` prints it, e.g. `1 year 2 mons 3 days 04:05:06`.
fn interval_text(raw: &[u8]) -> Result<String, CodecError> {
    let raw: [u8; 16] = fixed(raw)?;
    let micros = i64::from_be_bytes(fixed(&raw[0..8])?);
    let days = i32::from_be_bytes(fixed(&raw[8..12])?);
    let months = i32::from_be_bytes(fixed(&raw[12..16])?);

    let mut parts = Vec::new();
    let unit = |n: i32, one: &str, many: &str| format!("{n} {}", if n.abs() == 1 { one } else { many });
    if months / 12 != 0 {
        parts.push(unit(months / 12, "year", "years"));
    }
    if months % 12 != 0 {
        parts.push(unit(months % 12, "mon", "mons"));
    }
    if days != 0 {
        parts.push(unit(days, "day", "days"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let mut clock = format!("{sign}{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
        if frac != 0 {
            clock.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    Ok(parts.join(" "))
}

/// True for column types that take a UTF-8 string as is.
fn is_textual(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

fn mismatch(value: impl std::fmt::Display, ty: &Type) -> CodecError {
    format!("cannot bind {value} to a parameter of type {ty}").into()
}

/// Encode text for a non-text column by parsing it into the column's type.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, CodecError> {
    let trimmed = s.trim();
    let invalid = |e: &dyn std::fmt::Display| -> CodecError {
        format!("'{s}' is not a valid {ty} value: {e}").into()
    };

    match *ty {
        Type::INT2 => trimmed.parse::<i16>().map_err(|e| invalid(&e))?.to_sql(ty, out),
        Type::INT4 => trimmed.parse::<i32>().map_err(|e| invalid(&e))?.to_sql(ty, out),
        Type::INT8 => trimmed.parse::<i64>().map_err(|e| invalid(&e))?.to_sql(ty, out),
        Type::FLOAT4 => trimmed.parse::<f32>().map_err(|e| invalid(&e))?.to_sql(ty, out),
        Type::FLOAT8 => trimmed.parse::<f64>().map_err(|e| invalid(&e))?.to_sql(ty, out),
        Type::NUMERIC => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|e| invalid(&e))?
            .to_sql(ty, out),
        Type::BOOL => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => true.to_sql(ty, out),
            "false" | "f" | "no" | "n" | "off" | "0" => false.to_sql(ty, out),
            _ => Err(invalid(&"expected a boolean")),
        },
        Type::DATE => trimmed
            .parse::<NaiveDate>()
            .map_err(|e| invalid(&e))?
            .to_sql(ty, out),
        Type::TIME => trimmed
            .parse::<NaiveTime>()
            .map_err(|e| invalid(&e))?
            .to_sql(ty, out),
        Type::TIMESTAMP => trimmed
            .parse::<NaiveDateTime>()
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|e| invalid(&e))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(trimmed)
            .map_err(|e| invalid(&e))?
            .with_timezone(&Utc)
            .to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(trimmed)
            .map_err(|e| invalid(&e))?
            .to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)
            .map_err(|e| invalid(&e))?
            .to_sql(ty, out),
        _ if is_textual(ty) => s.to_sql(ty, out),
        _ => Err(mismatch(format!("text '{s}'"), ty)),
    }
}

/// Values are encoded for the parameter type the server inferred.
///
/// A value whose kind differs from that type is converted only when the
/// conversion is exact; otherwise encoding fails and the statement becomes a
/// failed outcome instead of running with a misread value.
impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, CodecError> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => SqlValue::Integer(i64::from(*b)).to_sql(ty, out),
                _ if is_textual(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch(b, ty)),
            },
            SqlValue::Integer(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT8 => i.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::BOOL => match i {
                    0 => false.to_sql(ty, out),
                    1 => true.to_sql(ty, out),
                    _ => Err(mismatch(i, ty)),
                },
                _ if is_textual(ty) => i.to_string().to_sql(ty, out),
                _ => Err(mismatch(i, ty)),
            },
            SqlValue::Real(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8
                    if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
                {
                    SqlValue::Integer(*f as i64).to_sql(ty, out)
                }
                _ if is_textual(ty) => f.to_string().to_sql(ty, out),
                _ => Err(mismatch(f, ty)),
            },
            SqlValue::Numeric(d) => match *ty {
                Type::NUMERIC => d.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 | Type::BOOL => match self.as_i64() {
                    Some(i) => SqlValue::Integer(i).to_sql(ty, out),
                    None => Err(format!("{d} is not a whole number, cannot bind as {ty}").into()),
                },
                Type::FLOAT4 | Type::FLOAT8 => match d.to_f64() {
                    Some(f) => SqlValue::Real(f).to_sql(ty, out),
                    None => Err(mismatch(d, ty)),
                },
                _ if is_textual(ty) => d.to_string().to_sql(ty, out),
                _ => Err(mismatch(d, ty)),
            },
            SqlValue::Text(s) => text_to_sql(s, ty, out),
            SqlValue::Blob(b) => match *ty {
                Type::BYTEA => b.to_sql(ty, out),
                _ => Err(mismatch(format!("{} bytes", b.len()), ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
