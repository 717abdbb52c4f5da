use std::collections::HashSet;

use rusqlite::types::ValueRef;

use crate::error::SqliteBridgeError;
use crate::row::{ColumnSet, NamedRow, Row};
use crate::types::{DisplayMode, RowShape, Value, ValueTyping};

/// Turns engine rows into [`Row`] values for one statement.
///
/// The display mode is fixed when the decoder is created, so changing a connection's
/// mode never affects a statement that is already running. Column count and names are
/// read from the statement once, on the first row.
pub(crate) struct RowDecoder {
    mode: DisplayMode,
    column_count: Option<usize>,
    columns: Option<ColumnSet>,
}

impl RowDecoder {
    pub(crate) fn new(mode: DisplayMode) -> Self {
        Self {
            mode,
            column_count: None,
            columns: None,
        }
    }

    /// Decode the row the cursor is positioned on.
    ///
    /// `conn` must be the connection that owns the statement; stringified reals are
    /// rendered by it. Returns `Ok(None)` for statements that produce no columns.
    pub(crate) fn decode(
        &mut self,
        conn: &rusqlite::Connection,
        row: &rusqlite::Row<'_>,
    ) -> Result<Option<Row>, SqliteBridgeError> {
        let count = match self.column_count {
            Some(count) => count,
            None => {
                let stmt: &rusqlite::Statement<'_> = row.as_ref();
                let count = stmt.column_count();
                if self.mode.shape == RowShape::Named {
                    let raw_names: Vec<&str> = stmt.column_names();
                    self.columns = Some(ColumnSet::new(resolve_column_names(&raw_names)));
                }
                self.column_count = Some(count);
                count
            }
        };
        if count == 0 {
            return Ok(None);
        }

        let mut values = Vec::with_capacity(count);
        for idx in 0..count {
            let cell = row.get_ref(idx).map_err(|e| SqliteBridgeError::statement(&e))?;
            values.push(decode_cell(conn, cell, self.mode.typing)?);
        }

        let decoded = match (&self.columns, self.mode.shape) {
            (Some(columns), RowShape::Named) => Row::Named(NamedRow::new(columns.clone(), values)),
            _ => Row::Positional(values),
        };
        Ok(Some(decoded))
    }
}

/// Map one cell by its storage class.
pub(crate) fn decode_cell(
    conn: &rusqlite::Connection,
    cell: ValueRef<'_>,
    typing: ValueTyping,
) -> Result<Value, SqliteBridgeError> {
    let value = match (cell, typing) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Blob(bytes), _) => Value::Blob(bytes.to_vec()),
        (ValueRef::Text(bytes), _) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        (ValueRef::Integer(i), ValueTyping::Native) => Value::Integer(i),
        (ValueRef::Integer(i), ValueTyping::Stringified) => Value::Text(i.to_string()),
        (ValueRef::Real(f), ValueTyping::Native) => Value::Real(f),
        (ValueRef::Real(f), ValueTyping::Stringified) => Value::Text(real_text(conn, f)?),
    };
    Ok(value)
}

/// The engine's own text form of a real, identical to what `column_text` yields.
fn real_text(conn: &rusqlite::Connection, value: f64) -> Result<String, SqliteBridgeError> {
    let mut stmt = conn
        .prepare_cached("select cast(?1 as text)")
        .map_err(|e| SqliteBridgeError::statement(&e))?;
    stmt.query_row([value], |row| row.get::<_, String>(0))
        .map_err(|e| SqliteBridgeError::statement(&e))
}

/// Unique column names: empty or already-used names become `column<index>`.
///
/// A generated name never shadows a real column name; on collision it gains a
/// `_<n>` suffix until it is free.
pub(crate) fn resolve_column_names(raw: &[&str]) -> Vec<String> {
    let reserved: HashSet<&str> = raw.iter().copied().filter(|name| !name.is_empty()).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.iter().enumerate() {
        let resolved = if !name.is_empty() && !used.contains(*name) {
            (*name).to_owned()
        } else {
            let base = format!("column{idx}");
            let mut candidate = base.clone();
            let mut suffix = 1;
            while used.contains(&candidate) || reserved.contains(candidate.as_str()) {
                candidate = format!("{base}_{suffix}");
                suffix += 1;
            }
            candidate
        };
        used.insert(resolved.clone());
        names.push(resolved);
    }
    names
}
