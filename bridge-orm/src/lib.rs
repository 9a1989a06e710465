//! # Bridge ORM
//!
//! Helpers that let a data-access layer build filtered queries safely and
//! report persistence failures in terms users can act on.
//!
//! - [`QueryBuilder`] assembles conditionally-included filter phrases and named
//!   parameters into a [`BuiltQuery`].
//! - [`ConstraintViolationConverter`] classifies a [`PersistenceError`] into a
//!   [`ClassifiedError`], phrasing constraint violations from a [`ConstraintCatalog`].
//! - [`Database`] renders built queries for a sqlx driver and runs them.

// Lets `#[derive(Entity)]` expand to `::bridge_orm::Entity` inside this crate too.
extern crate self as bridge_orm;

pub use bridge_orm_macro::Entity;

pub mod account_search;
pub mod constraints;
pub mod converter;
pub mod database;
pub mod entity;
pub mod errors;
pub mod pagination;
pub mod query_builder;
pub mod statement;
pub mod value_binding;

pub use account_search::AccountSearchFilters;
pub use constraints::{ConstraintCatalog, ConstraintTable};
pub use converter::{ClassifiedError, ConstraintViolationConverter, FailureShape, PersistenceErrorConverter};
pub use database::{Database, DatabaseBuilder, Drivers};
pub use entity::Entity;
pub use errors::{Error, IntegrityViolation, PersistenceError};
pub use pagination::{PagedResults, Pagination};
pub use query_builder::{BuiltQuery, MembershipFilter, QueryBuilder};
pub use value_binding::ParamValue;
