//! Derive macro generating `cti_graphql` selection descriptors.
//!
//! `#[derive(GraphqlObject)]` reads the serde attributes already present on a
//! struct so that compiled selections and decoding agree on member names:
//! `rename`, `rename_all`, `skip`, `skip_deserializing` and `flatten`.
//! Additional `#[graphql(...)]` attributes:
//!
//! - container: `name = "Type"`, `implementations(A, B)` (interfaces/unions);
//! - field: `args = "(first: 10)"`, `skip`.
//!
//! Member names and the remainder map are declared through serde only
//! (`rename`, `flatten` on a map), so a compiled selection always decodes
//! back into the type it was compiled from.

use proc_macro::TokenStream;

mod attr;
mod object;

#[proc_macro_derive(GraphqlObject, attributes(graphql))]
pub fn derive_graphql_object(input: TokenStream) -> TokenStream {
    object::derive_graphql_object(input.into()).into()
}
