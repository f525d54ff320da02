// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Typed positional parameters for prepared statements.

use crate::{DbError, DbResult};
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

/// SQL type tags that select how a parameter is encoded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SqlType {
    /// 64-bit integer.
    BigInt,
    /// Raw bytes.
    Binary,
    /// Single bit, encoded as a boolean.
    Bit,
    /// Large binary object.
    Blob,
    /// Boolean.
    Boolean,
    /// Fixed-length text.
    Char,
    /// Calendar date, encoded as ISO 8601 text.
    Date,
    /// Exact decimal, encoded as a double.
    Decimal,
    /// Double-precision float.
    Double,
    /// Single-precision float.
    Float,
    /// 32-bit integer.
    Integer,
    /// Long text.
    LongVarchar,
    /// Untyped null.
    Null,
    /// Exact numeric, encoded as a double.
    Numeric,
    /// Single-precision float.
    Real,
    /// 16-bit integer.
    SmallInt,
    /// Time of day, encoded as ISO 8601 text.
    Time,
    /// Date and time, encoded as ISO 8601 text.
    Timestamp,
    /// 8-bit integer, widened to 16 bits.
    TinyInt,
    /// Variable-length binary.
    VarBinary,
    /// Variable-length text.
    Varchar,
}

/// A parameter value before it is encoded according to its `SqlType`.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// A boolean.
    Bool(bool),
    /// Any integer.
    Int(i64),
    /// Any floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

/// Generates a `From<$t> for SqlValue` conversion through the `$variant` variant.
macro_rules! sqlvalue_from [
    ( $t:ty, $variant:ident, $conv:ty ) => {
        impl From<$t> for SqlValue {
            fn from(value: $t) -> Self {
                SqlValue::$variant(<$conv>::from(value))
            }
        }
    }
];

sqlvalue_from!(bool, Bool, bool);
sqlvalue_from!(i8, Int, i64);
sqlvalue_from!(i16, Int, i64);
sqlvalue_from!(i32, Int, i64);
sqlvalue_from!(i64, Int, i64);
sqlvalue_from!(u8, Int, i64);
sqlvalue_from!(u16, Int, i64);
sqlvalue_from!(u32, Int, i64);
sqlvalue_from!(f32, Float, f64);
sqlvalue_from!(f64, Float, f64);
sqlvalue_from!(String, Text, String);
sqlvalue_from!(&str, Text, String);
sqlvalue_from!(&String, Text, String);
sqlvalue_from!(Vec<u8>, Bytes, Vec<u8>);
sqlvalue_from!(&[u8], Bytes, Vec<u8>);

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => SqlValue::Null,
        }
    }
}

/// Ordered list of typed parameters, bound 1-based in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList(Vec<(SqlType, SqlValue)>);

impl ParamList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn push(&mut self, tag: SqlType, value: SqlValue) {
        self.0.push((tag, value));
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the parameters in binding order.
    pub fn iter(&self) -> impl Iterator<Item = &(SqlType, SqlValue)> {
        self.0.iter()
    }

    /// Binds all parameters to `query` in order.
    pub(crate) fn bind_all<'q>(
        &self,
        mut query: Query<'q, Any, AnyArguments<'q>>,
    ) -> DbResult<Query<'q, Any, AnyArguments<'q>>> {
        for (i, (tag, value)) in self.0.iter().enumerate() {
            query = bind(query, i + 1, *tag, value)?;
        }
        Ok(query)
    }
}

/// Formats the error for a `value` that cannot be encoded as `tag` at the 1-based `index`.
fn bind_error(index: usize, tag: SqlType, value: &SqlValue) -> DbError {
    DbError::BindError(format!("Cannot bind {:?} as {:?} at index {}", value, tag, index))
}

/// Narrows `v` to single precision, rounding to the nearest representable value.
///
/// Returns `None` if `v` is finite but its magnitude exceeds the range of an `f32`.
fn to_f32(v: f64) -> Option<f32> {
    let narrowed = v as f32;
    if v.is_finite() && narrowed.is_infinite() {
        None
    } else {
        Some(narrowed)
    }
}

/// Binds a single `value` tagged as `tag` to `query`.
///
/// `Real` and `Float` parameters are sent in single precision, so their values lose the digits
/// that an `f32` cannot hold.
fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    index: usize,
    tag: SqlType,
    value: &SqlValue,
) -> DbResult<Query<'q, Any, AnyArguments<'q>>> {
    use SqlType::*;

    let out_of_range = || bind_error(index, tag, value);
    let query = match (tag, value) {
        (Integer, SqlValue::Null) => query.bind(None::<i32>),
        (SmallInt | TinyInt, SqlValue::Null) => query.bind(None::<i16>),
        (BigInt, SqlValue::Null) => query.bind(None::<i64>),
        (Real | Float, SqlValue::Null) => query.bind(None::<f32>),
        (Double | Decimal | Numeric, SqlValue::Null) => query.bind(None::<f64>),
        (Boolean | Bit, SqlValue::Null) => query.bind(None::<bool>),
        (Binary | VarBinary | Blob, SqlValue::Null) => query.bind(None::<Vec<u8>>),
        (_, SqlValue::Null) => query.bind(None::<String>),

        (Integer, SqlValue::Int(v)) => query.bind(i32::try_from(*v).map_err(|_| out_of_range())?),
        (SmallInt | TinyInt, SqlValue::Int(v)) => {
            query.bind(i16::try_from(*v).map_err(|_| out_of_range())?)
        }
        (BigInt, SqlValue::Int(v)) => query.bind(*v),

        (Real | Float, SqlValue::Float(v)) => query.bind(to_f32(*v).ok_or_else(out_of_range)?),
        (Real | Float, SqlValue::Int(v)) => query.bind(*v as f32),
        (Double | Decimal | Numeric, SqlValue::Float(v)) => query.bind(*v),
        (Double | Decimal | Numeric, SqlValue::Int(v)) => query.bind(*v as f64),

        (Boolean | Bit, SqlValue::Bool(b)) => query.bind(*b),

        (Char | Varchar | LongVarchar | Date | Time | Timestamp, SqlValue::Text(s)) => {
            query.bind(s.clone())
        }

        (Binary | VarBinary | Blob, SqlValue::Bytes(b)) => query.bind(b.clone()),

        _ => return Err(bind_error(index, tag, value)),
    };
    Ok(query)
}

/// Generates the placeholders for a multi-row `VALUES` clause.
///
/// The result contains `list_count` groups of `param_count` comma-separated `?` placeholders.
/// Each group is indented by five spaces and wrapped in parentheses, and groups are separated
/// by `", \n"`.
///
/// Panics if either count is zero.
pub fn param_list(param_count: usize, list_count: usize) -> String {
    assert!(param_count > 0, "param_count must be greater than 0");
    assert!(list_count > 0, "list_count must be greater than 0");

    let group = format!("     ({})", vec!["?"; param_count].join(","));
    vec![group; list_count].join(", \n")
}
