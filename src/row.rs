use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::types::Value;

/// Column names shared by every named row of one statement, plus a name → index cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSet {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl ColumnSet {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row decoded as a column name → value mapping.
///
/// Column names are unique: empty or repeated names were replaced by `column<index>`
/// (with a `_<n>` suffix if that name is taken) when the statement's first row was decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRow {
    columns: ColumnSet,
    values: Vec<Value>,
}

impl NamedRow {
    #[must_use]
    pub fn new(columns: ColumnSet, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.columns
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Iterate `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// One decoded output row, shaped by the active [`RowShape`](crate::types::RowShape).
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Positional(Vec<Value>),
    Named(NamedRow),
}

impl Row {
    /// Value at a column index; works for both shapes.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values().get(index)
    }

    /// Value by column name; `None` for positional rows.
    #[must_use]
    pub fn get_named(&self, column_name: &str) -> Option<&Value> {
        match self {
            Row::Positional(_) => None,
            Row::Named(named) => named.get(column_name),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        match self {
            Row::Positional(values) => values,
            Row::Named(named) => named.values(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, Row::Named(_))
    }

    #[must_use]
    pub fn as_named(&self) -> Option<&NamedRow> {
        if let Row::Named(named) = self {
            Some(named)
        } else {
            None
        }
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Row::Positional(values) => values,
            Row::Named(named) => named.values,
        }
    }

    /// Host representation: a JSON array for positional rows, an object for named rows.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Row::Positional(values) => {
                serde_json::Value::Array(values.iter().map(value_to_json).collect())
            }
            Row::Named(named) => serde_json::Value::Object(
                named
                    .iter()
                    .map(|(name, value)| (name.to_owned(), value_to_json(value)))
                    .collect(),
            ),
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(bytes) => serde_json::Value::from(bytes.clone()),
    }
}

impl Serialize for NamedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Row::Positional(values) => values.serialize(serializer),
            Row::Named(named) => named.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_named() -> Row {
        let columns = ColumnSet::new(vec!["id".into(), "name".into(), "column2".into()]);
        Row::Named(NamedRow::new(
            columns,
            vec![Value::Integer(1), Value::Text("a".into()), Value::Null],
        ))
    }

    #[test]
    fn named_lookup_and_index_agree() {
        let row = sample_named();
        assert_eq!(row.get_named("name"), row.get(1));
        assert_eq!(row.get_named("missing"), None);
        assert_eq!(row.len(), 3);
        assert!(row.is_named());
    }

    #[test]
    fn positional_rows_have_no_names() {
        let row = Row::Positional(vec![Value::Integer(5)]);
        assert_eq!(row.get_named("id"), None);
        assert_eq!(row.get(0), Some(&Value::Integer(5)));
    }

    #[test]
    fn json_shape_follows_row_shape() {
        assert_eq!(
            sample_named().to_json(),
            json!({"id": 1, "name": "a", "column2": null})
        );
        let positional = Row::Positional(vec![Value::Real(1.5), Value::Blob(vec![1, 2])]);
        assert_eq!(positional.to_json(), json!([1.5, [1, 2]]));
        assert_eq!(serde_json::to_value(&positional).ok(), Some(json!([1.5, [1, 2]])));
    }
}
