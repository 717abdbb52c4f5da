use chrono::NaiveDateTime;
use rusqlite::types::Value as SqliteValue;

/// A bound parameter: null, text, or an opaque blob passed through unconverted.
///
/// Every scalar is bound by its textual form; the engine's column affinity decides
/// how it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Null,
    Text(String),
    Blob(Vec<u8>),
}

impl Param {
    fn to_sqlite_value(&self) -> SqliteValue {
        match self {
            Param::Null => SqliteValue::Null,
            Param::Text(s) => SqliteValue::Text(s.clone()),
            Param::Blob(bytes) => SqliteValue::Blob(bytes.clone()),
        }
    }
}

macro_rules! text_param_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::Text(value.to_string())
                }
            }
        )*
    };
}

text_param_from!(
    i64, i32, i16, i8, u64, u32, u16, u8, usize, f64, f32, bool, char, &str, String, &String,
);

impl From<NaiveDateTime> for Param {
    fn from(value: NaiveDateTime) -> Self {
        Param::Text(value.format("%F %T%.f").to_string())
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Blob(value)
    }
}

impl From<&[u8]> for Param {
    fn from(value: &[u8]) -> Self {
        Param::Blob(value.to_vec())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

/// Ordered parameter list for one statement.
///
/// A single scalar is accepted as a one-element list:
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// assert_eq!(Params::from(42_i64).len(), 1);
/// assert_eq!(Params::from(()).len(), 0);
/// let mixed = sqlite_bridge::params![1_i64, "two", None::<i64>, vec![0_u8, 1]];
/// assert_eq!(mixed.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(pub Vec<Param>);

impl Params {
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Param] {
        &self.0
    }

    /// Convert into the engine's owned value representation for binding.
    pub(crate) fn to_sqlite_values(&self) -> Vec<SqliteValue> {
        self.0.iter().map(Param::to_sqlite_value).collect()
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::none()
    }
}

impl From<Param> for Params {
    fn from(param: Param) -> Self {
        Params(vec![param])
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Params(params)
    }
}

impl From<&[Param]> for Params {
    fn from(params: &[Param]) -> Self {
        Params(params.to_vec())
    }
}

impl<const N: usize> From<[Param; N]> for Params {
    fn from(params: [Param; N]) -> Self {
        Params(params.into())
    }
}

macro_rules! scalar_params_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Params {
                fn from(value: $ty) -> Self {
                    Params(vec![Param::from(value)])
                }
            }
        )*
    };
}

scalar_params_from!(
    i64,
    i32,
    i16,
    i8,
    u64,
    u32,
    u16,
    u8,
    usize,
    f64,
    f32,
    bool,
    char,
    &str,
    String,
    &String,
    NaiveDateTime,
);

/// Build a [`Params`] list from mixed values.
///
/// Usage: `params![1_i64, "text", blob.as_slice(), None::<i64>]`
#[macro_export]
macro_rules! params {
    () => {
        $crate::Params::none()
    };
    ($($val:expr),+ $(,)?) => {
        $crate::Params(vec![$($crate::Param::from($val)),+])
    };
}
