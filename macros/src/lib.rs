//! Proc macros for tether: `#[derive(Lenses)]` field lenses for property views.
//!
//! This crate is not meant to be used directly; enable the `macros` feature on `tether`.

use proc_macro::TokenStream;

mod lens_derive;

/// Derive one lens constructor per named field.
///
/// For a field `name: T` on `Self`, generates
/// `pub fn name_lens() -> tether::reactive::Lens<Self, T>`. Reading clones the
/// field; writing rebuilds the struct with the field replaced, so the struct
/// and every field type must be `Clone`.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, PartialEq, Lenses)]
/// struct Todo {
///     title: String,
///     completed: bool,
/// }
///
/// let todo = Observable::new(Todo { title: "milk".into(), completed: false });
/// let completed = todo.property(Todo::completed_lens());
/// completed.set(true);
/// ```
#[proc_macro_derive(Lenses)]
pub fn derive_lenses(input: TokenStream) -> TokenStream {
    lens_derive::lenses_impl(input.into())
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
