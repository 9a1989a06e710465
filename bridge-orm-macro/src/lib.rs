//! # Bridge ORM Procedural Macros
//!
//! This crate provides the `#[derive(Entity)]` macro for Bridge ORM. It is not
//! meant to be used directly; `bridge-orm` re-exports it:
//!
//! ```rust,ignore
//! use bridge_orm::Entity;
//!
//! #[derive(Entity)]
//! #[entity(name = "Schedule")]
//! struct Schedule2 {
//!     guid: String,
//! }
//! ```
//!
//! ## Supported Attributes
//!
//! ### Name
//! ```rust,ignore
//! #[entity(name = "Schedule")]
//! ```
//! Sets the name used in user-facing error messages. Without it the struct's
//! identifier is used.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod derive_entity;

/// Derives the `Entity` trait.
///
/// The generated `type_name()` returns the struct identifier, or the value of
/// `#[entity(name = "...")]`. The name is what the constraint-violation
/// converter puts in its messages ("Schedule has the wrong version number...").
///
/// # Errors
///
/// Emits a compile error if an `#[entity(...)]` attribute is malformed or names
/// an unknown key.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn entity_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let expanded = derive_entity::expand(ast);
    TokenStream::from(expanded)
}
