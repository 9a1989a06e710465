//! # Value Binding Module
//!
//! Typed parameter values for named-parameter queries, and binding of those
//! values into sqlx `AnyArguments` for the driver a statement is rendered for.
//!
//! ## Features
//!
//! - **Closed value set**: [`ParamValue`] covers the scalars filters bind plus lists
//! - **Ergonomic conversions**: `From` impls for strings, numbers, UUIDs,
//!   timestamps, options and collections
//! - **Driver-aware binding**: UUIDs and timestamps are bound as text the same way
//!   on every driver

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::Arguments;
use sqlx::any::AnyArguments;
use uuid::Uuid;

use crate::{Error, database::Drivers};

// ============================================================================
// Parameter Values
// ============================================================================

/// A value bound to a named query parameter.
///
/// `List` is used for `IN (:name)` style parameters; it is expanded to one
/// positional placeholder per element when the statement is rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Returns the elements of a `List`, or `None` for scalars.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// An empty list. Bound to an `IN` clause it matches no rows.
    pub fn empty_list() -> Self {
        ParamValue::List(Vec::new())
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<&String> for ParamValue {
    fn from(v: &String) -> Self {
        ParamValue::Text(v.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<Uuid> for ParamValue {
    fn from(v: Uuid) -> Self {
        ParamValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(v: DateTime<Utc>) -> Self {
        ParamValue::Timestamp(v)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<BTreeSet<T>> for ParamValue {
    fn from(v: BTreeSet<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>, S> From<HashSet<T, S>> for ParamValue {
    fn from(v: HashSet<T, S>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Value Binding Trait
// ============================================================================

/// Extension trait for binding [`ParamValue`]s to `AnyArguments`.
pub trait ValueBinder {
    /// Binds one scalar value. Lists must be expanded by the caller.
    fn bind_param(&mut self, value: &ParamValue, driver: &Drivers) -> Result<(), Error>;
}

impl ValueBinder for AnyArguments<'_> {
    fn bind_param(&mut self, value: &ParamValue, driver: &Drivers) -> Result<(), Error> {
        let result = match value {
            ParamValue::Null => self.add(Option::<String>::None),
            ParamValue::Bool(v) => match driver {
                // MySQL has no boolean type; TINYINT(1) columns compare against integers.
                Drivers::MySQL => self.add(*v as i64),
                _ => self.add(*v),
            },
            ParamValue::Int(v) => self.add(*v),
            ParamValue::Float(v) => self.add(*v),
            ParamValue::Text(v) => self.add(v.clone()),
            ParamValue::Uuid(v) => self.add(v.hyphenated().to_string()),
            ParamValue::Timestamp(v) => self.add(format_timestamp(v, driver)),
            ParamValue::List(_) => {
                return Err(Error::conversion("a list parameter cannot be bound as a single value"));
            }
        };
        result.map_err(|e| Error::Conversion(e.to_string()))
    }
}

/// Formats a timestamp the way each driver parses it from text.
fn format_timestamp(value: &DateTime<Utc>, driver: &Drivers) -> String {
    match driver {
        Drivers::Postgres => value.to_rfc3339_opts(SecondsFormat::Micros, true),
        Drivers::MySQL => value.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        Drivers::SQLite => value.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}
