//! Statement execution against the native handle.
//!
//! Everything here is synchronous and runs on the connection's worker thread. Each
//! call prepares its own statement and the statement is finalized (dropped) before
//! the call returns, on success and on every error path.

use std::ops::ControlFlow;
use std::panic::{AssertUnwindSafe, catch_unwind};

use rusqlite::params_from_iter;

use crate::decode::RowDecoder;
use crate::error::SqliteBridgeError;
use crate::params::Params;
use crate::row::Row;
use crate::types::{DisplayMode, StatementKind, Value};

/// Error type user row callbacks may return to stop iteration.
pub type RowCallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Per-row callback invoked on the worker thread while the cursor is open.
pub(crate) type BoxedRowCallback = Box<dyn FnMut(Row) -> Result<(), RowCallbackError> + Send>;

/// Walk every row `sql` produces, handing decoded rows to `visit`.
///
/// Returns the number of rows handed to `visit`. Rows with no columns are skipped.
fn scan<F>(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
    mode: DisplayMode,
    mut visit: F,
) -> Result<usize, SqliteBridgeError>
where
    F: FnMut(Row) -> Result<ControlFlow<()>, SqliteBridgeError>,
{
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SqliteBridgeError::prepare(&e))?;
    let values = params.to_sqlite_values();
    let mut rows = stmt
        .query(params_from_iter(values.iter()))
        .map_err(|e| SqliteBridgeError::bind(&e))?;

    let mut decoder = RowDecoder::new(mode);
    let mut delivered = 0usize;
    while let Some(row) = rows.next().map_err(|e| SqliteBridgeError::statement(&e))? {
        let Some(decoded) = decoder.decode(conn, row)? else {
            continue;
        };
        delivered += 1;
        if visit(decoded)?.is_break() {
            break;
        }
    }
    Ok(delivered)
}

/// Run a statement to completion without decoding its rows.
fn run_to_completion(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
) -> Result<(), SqliteBridgeError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SqliteBridgeError::prepare(&e))?;
    let values = params.to_sqlite_values();
    let mut rows = stmt
        .query(params_from_iter(values.iter()))
        .map_err(|e| SqliteBridgeError::bind(&e))?;
    while rows
        .next()
        .map_err(|e| SqliteBridgeError::statement(&e))?
        .is_some()
    {}
    Ok(())
}

/// Read a single integer through the decoder in raw mode.
fn scalar_i64(conn: &rusqlite::Connection, sql: &str) -> Result<Option<i64>, SqliteBridgeError> {
    let row = get_one(conn, sql, &Params::none(), DisplayMode::RAW)?;
    Ok(row.and_then(|row| row.get(0).and_then(Value::as_int)))
}

/// Execute one statement.
///
/// Inserts report the last inserted row id, updates and deletes the number of rows
/// changed; anything else reports `None`.
pub(crate) fn exec_sql(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
) -> Result<Option<i64>, SqliteBridgeError> {
    let kind = StatementKind::classify(sql);
    run_to_completion(conn, sql, params)?;
    match kind {
        StatementKind::Insert => scalar_i64(conn, "select last_insert_rowid()"),
        kind if kind.reports_changes() => scalar_i64(conn, "select changes()"),
        _ => Ok(None),
    }
}

/// First row of the result set, or `None` when there is none.
pub(crate) fn get_one(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
    mode: DisplayMode,
) -> Result<Option<Row>, SqliteBridgeError> {
    let mut first = None;
    scan(conn, sql, params, mode, |row| {
        first = Some(row);
        Ok(ControlFlow::Break(()))
    })?;
    Ok(first)
}

/// Every row of the result set; empty when nothing matched.
pub(crate) fn get_all(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
    mode: DisplayMode,
) -> Result<Vec<Row>, SqliteBridgeError> {
    let mut rows = Vec::new();
    scan(conn, sql, params, mode, |row| {
        rows.push(row);
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(rows)
}

/// Stream rows to `on_row` as the cursor produces them.
///
/// An error or panic from `on_row` stops iteration; the statement is finalized before
/// the resulting [`SqliteBridgeError::RowCallback`] is returned. Rows already delivered
/// stay delivered.
pub(crate) fn for_each(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
    mode: DisplayMode,
    on_row: &mut BoxedRowCallback,
) -> Result<usize, SqliteBridgeError> {
    scan(conn, sql, params, mode, |row| {
        match catch_unwind(AssertUnwindSafe(|| on_row(row))) {
            Ok(Ok(())) => Ok(ControlFlow::Continue(())),
            Ok(Err(err)) => Err(SqliteBridgeError::RowCallback(err.to_string())),
            Err(_) => Err(SqliteBridgeError::RowCallback(
                "row callback panicked".into(),
            )),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RowShape, ValueTyping};

    fn memory() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch("create table t (id integer primary key, x integer, label text);")
            .expect("schema");
        conn
    }

    #[test]
    fn insert_reports_rowid_and_update_reports_changes() {
        let conn = memory();
        let id = exec_sql(&conn, "insert into t (x) values (?)", &Params::from(1_i64));
        assert_eq!(id, Ok(Some(1)));
        let id = exec_sql(&conn, "insert into t (x) values (?)", &Params::from(1_i64));
        assert_eq!(id, Ok(Some(2)));
        assert_eq!(exec_sql(&conn, "update t set x = 2", &Params::none()), Ok(Some(2)));
        assert_eq!(
            exec_sql(&conn, "delete from t where id = ?", &Params::from(1_i64)),
            Ok(Some(1))
        );
        assert_eq!(exec_sql(&conn, "create table u (y)", &Params::none()), Ok(None));
    }

    #[test]
    fn errors_are_classified_by_phase() {
        let conn = memory();
        assert!(matches!(
            exec_sql(&conn, "not valid sql", &Params::none()),
            Err(SqliteBridgeError::Prepare(_))
        ));
        assert!(matches!(
            get_one(&conn, "select ?1, ?2", &Params::from(1_i64), DisplayMode::RAW),
            Err(SqliteBridgeError::Bind(_))
        ));
        conn.execute_batch("create table uniq (v integer unique); insert into uniq values (1);")
            .expect("setup");
        let err = exec_sql(&conn, "insert into uniq values (?)", &Params::from(1_i64));
        assert!(matches!(err, Err(SqliteBridgeError::Statement(ref native)) if native.code.is_some()));
    }

    #[test]
    fn named_rows_use_placeholders_for_duplicates() {
        let conn = memory();
        let mode = DisplayMode::new(RowShape::Named, ValueTyping::Native);
        let row = get_one(&conn, "select 1 as a, 2 as a", &Params::none(), mode)
            .expect("query")
            .expect("one row");
        assert_eq!(row.get_named("a"), Some(&Value::Integer(1)));
        assert_eq!(row.get_named("column1"), Some(&Value::Integer(2)));
    }

    #[test]
    fn callback_error_stops_iteration() {
        let conn = memory();
        for x in 0..5_i64 {
            exec_sql(&conn, "insert into t (x) values (?)", &Params::from(x)).expect("insert");
        }
        let mut seen = 0;
        let mut on_row: BoxedRowCallback = Box::new(move |_row| {
            seen += 1;
            if seen == 2 { Err("stop".into()) } else { Ok(()) }
        });
        let result = for_each(&conn, "select x from t", &Params::none(), DisplayMode::RAW, &mut on_row);
        assert_eq!(result, Err(SqliteBridgeError::RowCallback("stop".into())));
        // the statement was finalized, so the schema can still change
        assert_eq!(exec_sql(&conn, "drop table t", &Params::none()), Ok(None));
    }
}
