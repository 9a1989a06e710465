//! # Error Handling Module
//!
//! This module defines the error types used throughout Bridge ORM.
//!
//! ## Error Types
//!
//! - **Error**: failures of the ORM itself (bad arguments, unbound parameters,
//!   unreadable catalog files, wrapped sqlx errors)
//! - **PersistenceError**: a failed write or read as the data-access layer sees it.
//!   This is what gets handed to the
//!   [`ConstraintViolationConverter`](crate::converter::ConstraintViolationConverter).
//! - **IntegrityViolation**: an integrity-constraint violation reported by a driver
//!   that does not go through sqlx
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use bridge_orm::{Error, PersistenceError};
//!
//! match db.execute(&query).await {
//!     Ok(rows) => println!("updated {rows}"),
//!     Err(e) => match converter.convert(e, &schedule) {
//!         ClassifiedError::Unclassified(original) => log::error!("{original}"),
//!         classified => return Err(classified),
//!     },
//! }
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// Error Enum Definition
// ============================================================================

/// The main error type for Bridge ORM operations.
///
/// # Display Format
///
/// - `InvalidArgument`: "Invalid argument: {message}"
/// - `Conversion`: "Type conversion error: {message}"
/// - `MissingParameter`: "Query references unbound parameter :{name}"
/// - `Config`: "Invalid constraint catalog: {message}"
/// - `DatabaseError`: "Database error: {inner_error}"
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument error.
    ///
    /// Indicates programmer error (passing invalid parameters) rather than
    /// runtime data issues, e.g. a page size outside the accepted range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Type conversion error.
    ///
    /// Used when a [`ParamValue`](crate::value_binding::ParamValue) cannot be
    /// bound for the target driver.
    #[error("Type conversion error: {0}")]
    Conversion(String),

    /// A clause references a `:name` placeholder that was never bound.
    ///
    /// Every placeholder has to be present in the parameter map before the
    /// query is executed. Rendering a statement checks this.
    #[error("Query references unbound parameter :{0}")]
    MissingParameter(String),

    /// The constraint catalog could not be read or parsed.
    #[error("Invalid constraint catalog: {0}")]
    Config(String),

    /// Database operation error.
    ///
    /// Wraps errors from the underlying sqlx library. Converted automatically
    /// via `#[from]` so `?` works on sqlx results.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(e.to_string())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

impl Error {
    /// Creates an `InvalidArgument` error from a string slice.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// if page_size > 100 {
    ///     return Err(Error::invalid_argument("pageSize must be at most 100"));
    /// }
    /// ```
    pub fn invalid_argument(msg: &str) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    /// Creates a `Conversion` error from a string slice.
    pub fn conversion(msg: &str) -> Self {
        Error::Conversion(msg.to_string())
    }
}

// ============================================================================
// Persistence Failures
// ============================================================================

/// A failure raised by the data-access layer while reading or writing an entity.
///
/// The variants are the failure shapes the persistence runtime can report.
/// Anything that is not a version conflict or an identity conflict arrives as
/// `Database` or `Wrapped`, and its cause chain is inspected by the converter.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The row was written by someone else since it was read (version mismatch).
    #[error("Optimistic lock failure on {entity}: {message}")]
    OptimisticLock { entity: String, message: String },

    /// The same identifier was attached twice within one unit of work.
    #[error("A different object with the same identifier value was already associated: {identifier}")]
    NonUniqueObject { identifier: String },

    /// A failure surfaced by sqlx.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A failure wrapping an arbitrary cause chain.
    #[error("{context}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PersistenceError {
    /// Wraps any error as the cause of a persistence failure.
    pub fn wrap<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PersistenceError::Wrapped { context: context.into(), source: Box::new(source) }
    }
}

impl From<Error> for PersistenceError {
    fn from(e: Error) -> Self {
        match e {
            Error::DatabaseError(inner) => PersistenceError::Database(inner),
            other => PersistenceError::wrap("Could not run query", other),
        }
    }
}

/// An integrity-constraint violation reported by the database.
///
/// sqlx errors are recognised on their own; this type is for drivers and test
/// doubles that report violations outside of sqlx. It is only meaningful as a
/// link in a [`PersistenceError`] cause chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct IntegrityViolation {
    pub message: String,
}

impl IntegrityViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_database_error_keeps_sqlx_error() {
        let err: PersistenceError = Error::DatabaseError(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, PersistenceError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_other_errors_become_wrapped_causes() {
        let err: PersistenceError = Error::MissingParameter("orgId".to_string()).into();
        match &err {
            PersistenceError::Wrapped { source, .. } => {
                assert_eq!(source.to_string(), "Query references unbound parameter :orgId");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.source().is_some());
    }

    #[test]
    fn test_wrap_exposes_source_chain() {
        let err = PersistenceError::wrap("could not execute statement", IntegrityViolation::new("boom"));
        let source = err.source().expect("source");
        assert_eq!(source.downcast_ref::<IntegrityViolation>(), Some(&IntegrityViolation::new("boom")));
    }
}
