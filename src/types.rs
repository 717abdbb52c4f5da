use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single decoded cell.
///
/// The variant is picked from the storage class the engine reports for the column
/// at decode time, never from the SQL text:
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// let cells = vec![Value::Integer(1), Value::Text("alice".into()), Value::Null];
/// assert_eq!(cells[0].as_int(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// 64-bit integer
    Integer(i64),
    /// 64-bit floating point
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Binary data, never stringified
    Blob(Vec<u8>),
}

impl Value {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Integer(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Real(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

/// Whether a decoded row is a positional sequence or a named mapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RowShape {
    /// Index-addressable sequence of values
    #[default]
    Positional,
    /// Column name to value mapping
    Named,
}

/// Whether decoded scalars keep their native type or are converted to text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ValueTyping {
    /// Integers, reals, text and blobs as reported by the engine
    #[default]
    Native,
    /// Integers and reals rendered as text; blobs stay binary
    Stringified,
}

/// A fully resolved `(RowShape, ValueTyping)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DisplayMode {
    pub shape: RowShape,
    pub typing: ValueTyping,
}

impl DisplayMode {
    /// Positional rows with native values; used for internal scalar follow-up queries.
    pub const RAW: DisplayMode = DisplayMode {
        shape: RowShape::Positional,
        typing: ValueTyping::Native,
    };

    #[must_use]
    pub fn new(shape: RowShape, typing: ValueTyping) -> Self {
        Self { shape, typing }
    }
}

/// Per-call override; unset halves fall back to the connection's current mode.
///
/// # Examples
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// let mode = ResultMode::default().with_shape(RowShape::Named);
/// let resolved = mode.resolve(DisplayMode::default());
/// assert_eq!(resolved.shape, RowShape::Named);
/// assert_eq!(resolved.typing, ValueTyping::Native);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultMode {
    pub shape: Option<RowShape>,
    pub typing: Option<ValueTyping>,
}

impl ResultMode {
    #[must_use]
    pub fn with_shape(mut self, shape: RowShape) -> Self {
        self.shape = Some(shape);
        self
    }

    #[must_use]
    pub fn with_typing(mut self, typing: ValueTyping) -> Self {
        self.typing = Some(typing);
        self
    }

    #[must_use]
    pub fn resolve(self, defaults: DisplayMode) -> DisplayMode {
        DisplayMode {
            shape: self.shape.unwrap_or(defaults.shape),
            typing: self.typing.unwrap_or(defaults.typing),
        }
    }
}

impl From<DisplayMode> for ResultMode {
    fn from(mode: DisplayMode) -> Self {
        Self {
            shape: Some(mode.shape),
            typing: Some(mode.typing),
        }
    }
}

/// Classification of a statement by its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Row-producing statement (`select`, `with`, `values`, `pragma`, `explain`)
    Query,
    Insert,
    Update,
    Delete,
    /// DDL and everything else
    Other,
}

static LEADING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z]+)\b").expect("leading keyword pattern is valid")
});

impl StatementKind {
    /// Classify SQL text by its first keyword, ignoring case and leading whitespace.
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let Some(keyword) = LEADING_KEYWORD.captures(sql).and_then(|caps| caps.get(1)) else {
            return StatementKind::Other;
        };
        match keyword.as_str().to_ascii_lowercase().as_str() {
            "insert" => StatementKind::Insert,
            "update" => StatementKind::Update,
            "delete" => StatementKind::Delete,
            "select" | "with" | "values" | "pragma" | "explain" => StatementKind::Query,
            _ => StatementKind::Other,
        }
    }

    /// `true` for statements whose row-change count is reported back.
    #[must_use]
    pub fn reports_changes(self) -> bool {
        matches!(self, StatementKind::Update | StatementKind::Delete)
    }
}
