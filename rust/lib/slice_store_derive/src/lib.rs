//! Slice Store derive macros.
//!
//! - `#[derive(Lenses)]`: one `lens_<field>()` constructor per field
//! - `#[derive(Replicate)]`: field-by-field `deep_copy`
//!
//! Generated code refers to `::slice_store`, so the macros are used through
//! the re-exports in that crate.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod lenses;
mod replicate;

/// Generate accessor-chain lenses for every field of a struct.
///
/// ```ignore
/// #[derive(Lenses)]
/// pub struct Player {
///     pub name: String,
///     #[lens(readonly)]
///     pub id: u64,
///     #[lens(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// Generates:
/// - `pub fn lens_name() -> slice_store::Lens<Player, String>` (writable)
/// - `pub fn lens_id() -> slice_store::Lens<Player, u64>` (read-only)
///
/// Tuple structs get `lens_0`, `lens_1`, ...
#[proc_macro_derive(Lenses, attributes(lens))]
pub fn derive_lenses(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    lenses::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Implement `slice_store::Replicate` by deep-copying every field.
///
/// Every field type must implement `Replicate` as well; `shallow_copy`
/// keeps its default (`clone`).
#[proc_macro_derive(Replicate)]
pub fn derive_replicate(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    replicate::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
