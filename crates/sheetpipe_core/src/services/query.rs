//! Query execution into tabular results.
//!
//! Each query runs on its own scoped connection, which is released on both
//! the success and the error path.

use crate::error::SheetpipeError;
use crate::models::{CellValue, TabularResult};
use crate::services::connection::ConnectionHandle;

use std::error::Error as StdError;
use std::time::Instant;
use tiberius::{ColumnData, FromSql as MssqlFromSql};
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

/// Service for executing queries.
pub struct QueryService;

impl QueryService {
    /// Execute a query and materialise every row.
    pub async fn fetch(
        handle: &ConnectionHandle,
        sql: &str,
    ) -> Result<TabularResult, SheetpipeError> {
        let query_id = Uuid::new_v4();
        let start = Instant::now();

        tracing::debug!(
            query_id = %query_id,
            handle_id = %handle.id(),
            sql = %truncate_sql(sql, 100),
            "Executing query"
        );

        let result = match handle {
            ConnectionHandle::Postgres(pg) => {
                let conn = pg.acquire().await?;
                let (columns, rows) = conn.query(sql).await?;
                let rows = rows.iter().map(pg_row_to_cells).collect();
                TabularResult::new(columns, rows)?
            }
            ConnectionHandle::SqlServer(ms) => {
                let mut conn = ms.acquire().await?;
                let (columns, rows) = conn.query(sql).await?;
                conn.close().await?;
                let rows = rows.into_iter().map(mssql_row_to_cells).collect();
                TabularResult::new(columns, rows)?
            }
        };

        tracing::debug!(
            query_id = %query_id,
            execution_time_ms = start.elapsed().as_millis() as u64,
            row_count = result.row_count(),
            "Query completed"
        );

        Ok(result)
    }

    /// Execute a query, logging and returning an empty result on any failure.
    ///
    /// A failed query and a query that matched nothing look the same to the
    /// caller; use [`QueryService::fetch`] to tell them apart.
    pub async fn query_to_table(handle: &ConnectionHandle, sql: &str) -> TabularResult {
        match Self::fetch(handle, sql).await {
            Ok(table) => {
                tracing::info!("Query returned {} rows", table.row_count());
                table
            }
            Err(e) => {
                tracing::error!(error = %e, category = e.category(), "Error executing query: {e}");
                TabularResult::empty()
            }
        }
    }
}

/// Truncate SQL for logging.
fn truncate_sql(sql: &str, max_len: usize) -> String {
    match sql.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &sql[..cut]),
        None => sql.to_string(),
    }
}

// ========== PostgreSQL ==========

/// Convert a PostgreSQL row to cells.
fn pg_row_to_cells(row: &tokio_postgres::Row) -> Vec<CellValue> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| pg_cell(row, i, col.type_()))
        .collect()
}

fn pg_cell(row: &tokio_postgres::Row, i: usize, ty: &Type) -> CellValue {
    match *ty {
        Type::BOOL => get::<bool>(row, i).into(),
        Type::INT2 => get::<i16>(row, i).map(i64::from).into(),
        Type::INT4 => get::<i32>(row, i).map(i64::from).into(),
        Type::INT8 => get::<i64>(row, i).into(),
        Type::OID => get::<u32>(row, i).map(i64::from).into(),
        Type::FLOAT4 => get::<f32>(row, i).map(f64::from).into(),
        Type::FLOAT8 => get::<f64>(row, i).into(),
        Type::NUMERIC => match get::<PgNumeric>(row, i) {
            Some(PgNumeric(Some(v))) => CellValue::Float(v),
            _ => CellValue::Null,
        },
        Type::UUID => get::<Uuid>(row, i).map(|v| v.to_string()).into(),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, i).map(|v| v.to_string()).into()
        }
        Type::TIMESTAMPTZ => {
            get::<chrono::DateTime<chrono::Utc>>(row, i).map(|v| v.to_rfc3339()).into()
        }
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, i).map(|v| v.to_string()).into(),
        Type::DATE => get::<chrono::NaiveDate>(row, i).map(|v| v.to_string()).into(),
        Type::TIME => get::<chrono::NaiveTime>(row, i).map(|v| v.to_string()).into(),
        // Text-like types and anything else with a text representation
        _ => match row.try_get::<_, Option<String>>(i) {
            Ok(value) => value.into(),
            Err(e) => {
                if get::<NonNull>(row, i).is_some() {
                    tracing::debug!(
                        column = %row.columns()[i].name(),
                        pg_type = %ty,
                        error = %e,
                        "Unsupported column type, value read as null"
                    );
                }
                CellValue::Null
            }
        },
    }
}

/// Matches any non-null value without decoding it.
struct NonNull;

impl<'a> FromSql<'a> for NonNull {
    fn from_sql(_ty: &Type, _raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(NonNull)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Typed read where NULL and unsupported conversions both become None.
fn get<'a, T: FromSql<'a>>(row: &'a tokio_postgres::Row, i: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(i).ok().flatten()
}

/// PostgreSQL NUMERIC decoded from its binary form. `None` for NaN and
/// the infinities, which have no spreadsheet number.
struct PgNumeric(Option<f64>);

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Decode `ndigits, weight, sign, dscale` followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> Result<Option<f64>, Box<dyn StdError + Sync + Send>> {
    let word = |at: usize| -> Result<u16, Box<dyn StdError + Sync + Send>> {
        raw.get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(2)? as i16;
    let sign = word(4)?;

    match sign {
        NUMERIC_POS | NUMERIC_NEG => {}
        NUMERIC_NAN | NUMERIC_PINF | NUMERIC_NINF => return Ok(None),
        other => return Err(format!("invalid numeric sign word 0x{other:04X}").into()),
    }

    let mut value = 0.0_f64;
    for d in 0..ndigits {
        let digit = word(8 + d * 2)? as f64;
        let exponent = i32::from(weight) - d as i32;
        value += digit * 10_000_f64.powi(exponent);
    }

    Ok(Some(if sign == NUMERIC_NEG { -value } else { value }))
}

// ========== SQL Server ==========

/// Convert a SQL Server row to cells.
fn mssql_row_to_cells(row: tiberius::Row) -> Vec<CellValue> {
    row.into_iter().map(|data| mssql_cell(&data)).collect()
}

fn mssql_cell(data: &ColumnData<'static>) -> CellValue {
    match data {
        ColumnData::Bit(v) => (*v).into(),
        ColumnData::U8(v) => v.map(i64::from).into(),
        ColumnData::I16(v) => v.map(i64::from).into(),
        ColumnData::I32(v) => v.map(i64::from).into(),
        ColumnData::I64(v) => (*v).into(),
        ColumnData::F32(v) => v.map(f64::from).into(),
        ColumnData::F64(v) => (*v).into(),
        ColumnData::Numeric(v) => v
            .map(|n| n.value() as f64 / 10_f64.powi(i32::from(n.scale())))
            .into(),
        ColumnData::String(v) => v.as_ref().map(|s| s.to_string()).into(),
        ColumnData::Guid(v) => v.map(|g| g.to_string()).into(),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|bytes| bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
            .into(),
        _ => mssql_temporal(data),
    }
}

/// Dates, times and anything else: render via chrono where possible.
fn mssql_temporal(data: &ColumnData<'static>) -> CellValue {
    type Zoned = chrono::DateTime<chrono::FixedOffset>;

    if let Ok(Some(v)) = <Zoned as MssqlFromSql>::from_sql(data) {
        return CellValue::String(v.to_rfc3339());
    }
    if let Ok(Some(v)) = <chrono::NaiveDateTime as MssqlFromSql>::from_sql(data) {
        return CellValue::String(v.to_string());
    }
    if let Ok(Some(v)) = <chrono::NaiveDate as MssqlFromSql>::from_sql(data) {
        return CellValue::String(v.to_string());
    }
    if let Ok(Some(v)) = <chrono::NaiveTime as MssqlFromSql>::from_sql(data) {
        return CellValue::String(v.to_string());
    }
    CellValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionDescriptor;
    use crate::services::connection::ConnectionBuilder;
    use std::borrow::Cow;

    fn numeric_bytes(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_decode_numeric() {
        // 12345.678 = [1, 2345, 6780] with weight 1
        let raw = numeric_bytes(1, 0, 3, &[1, 2345, 6780]);
        let value = decode_numeric(&raw).unwrap().unwrap();
        assert!((value - 12345.678).abs() < 1e-9);

        let raw = numeric_bytes(0, NUMERIC_NEG, 0, &[42]);
        assert_eq!(decode_numeric(&raw).unwrap(), Some(-42.0));

        let raw = numeric_bytes(0, 0, 0, &[]);
        assert_eq!(decode_numeric(&raw).unwrap(), Some(0.0));

        let raw = numeric_bytes(0, NUMERIC_NAN, 0, &[]);
        assert_eq!(decode_numeric(&raw).unwrap(), None);
    }

    #[test]
    fn test_decode_numeric_infinities_are_null() {
        assert_eq!(decode_numeric(&[0, 0, 0, 0, 0xD0, 0, 0, 0]).unwrap(), None);
        assert_eq!(decode_numeric(&[0, 0, 0, 0, 0xF0, 0, 0, 0]).unwrap(), None);
    }

    #[test]
    fn test_decode_numeric_rejects_unknown_sign() {
        let raw = numeric_bytes(0, 0x8000, 0, &[1]);
        assert!(decode_numeric(&raw).is_err());
    }

    #[test]
    fn test_decode_numeric_rejects_truncated() {
        let raw = numeric_bytes(0, 0, 0, &[7]);
        assert!(decode_numeric(&raw[..9]).is_err());
    }

    #[test]
    fn test_non_null_matches_any_type() {
        assert!(<NonNull as FromSql>::accepts(&Type::INTERVAL));
        assert!(<NonNull as FromSql>::accepts(&Type::INET));

        let null = <Option<NonNull> as FromSql>::from_sql_nullable(&Type::BYTEA, None).unwrap();
        assert!(null.is_none());
        let raw: &[u8] = &[1, 2];
        let value = <Option<NonNull> as FromSql>::from_sql_nullable(&Type::BYTEA, Some(raw)).unwrap();
        assert!(value.is_some());
    }

    #[test]
    fn test_mssql_cells() {
        assert_eq!(mssql_cell(&ColumnData::I32(Some(7))), CellValue::Int(7));
        assert_eq!(mssql_cell(&ColumnData::I32(None)), CellValue::Null);
        assert_eq!(mssql_cell(&ColumnData::Bit(Some(true))), CellValue::Bool(true));
        assert_eq!(mssql_cell(&ColumnData::F64(Some(1.5))), CellValue::Float(1.5));
        assert_eq!(
            mssql_cell(&ColumnData::String(Some(Cow::Borrowed("widget")))),
            CellValue::from("widget")
        );
        assert_eq!(
            mssql_cell(&ColumnData::Binary(Some(Cow::Borrowed(&[0xde, 0xad][..])))),
            CellValue::from("dead")
        );
    }

    #[test]
    fn test_mssql_numeric_scale() {
        let numeric = tiberius::numeric::Numeric::new_with_scale(12550, 2);
        assert_eq!(mssql_cell(&ColumnData::Numeric(Some(numeric))), CellValue::Float(125.5));
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(truncate_sql("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql("SELECT * FROM sales_data", 8), "SELECT *...");
    }

    #[tokio::test]
    async fn test_query_to_table_returns_empty_on_failure() {
        let descriptor =
            ConnectionDescriptor::postgres("127.0.0.1", "mydb", "postgres", "").with_port(1);
        let handle = ConnectionBuilder::build(&descriptor).unwrap();

        let err = QueryService::fetch(&handle, "SELECT 1").await.unwrap_err();
        assert_eq!(err.category(), "Connection");

        let table = QueryService::query_to_table(&handle, "SELECT 1").await;
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 0);
    }

    #[tokio::test]
    async fn test_sql_server_query_to_table_returns_empty_on_failure() {
        let descriptor = ConnectionDescriptor::sql_server("127.0.0.1", "master")
            .with_credentials("sa", "x")
            .with_port(1);
        let handle = ConnectionBuilder::build(&descriptor).unwrap();
        let table = QueryService::query_to_table(&handle, "SELECT 1").await;
        assert!(table.is_empty());
    }
}
