//! # Entity Derive Macro Implementation
//!
//! Expands `#[derive(Entity)]` into an implementation of `bridge_orm::Entity`
//! whose `type_name()` returns a fixed string: the struct's identifier, or the
//! value of `#[entity(name = "...")]` when present.

// ============================================================================
// External Crate Imports
// ============================================================================

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr};

// ============================================================================
// Macro Expansion Function
// ============================================================================

/// Expands the `#[derive(Entity)]` macro.
///
/// Malformed `#[entity(...)]` attributes produce a compile error pointing at
/// the attribute.
pub fn expand(ast: DeriveInput) -> TokenStream {
    match type_name(&ast) {
        Ok(name) => {
            let ident = &ast.ident;
            let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
            quote! {
                impl #impl_generics ::bridge_orm::Entity for #ident #ty_generics #where_clause {
                    fn type_name(&self) -> ::std::borrow::Cow<'static, str> {
                        ::std::borrow::Cow::Borrowed(#name)
                    }
                }
            }
        }
        Err(e) => e.to_compile_error(),
    }
}

/// Reads the display name from `#[entity(name = "...")]`, defaulting to the identifier.
fn type_name(ast: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in ast.attrs.iter().filter(|a| a.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(meta.error("entity name cannot be empty"));
                }
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| ast.ident.to_string()))
}
