mod model;
mod route;

use proc_macro::TokenStream;

/// Creates a new documentation function for the route, named after the original function with the suffix `_docs`.
///
/// The first line of the doc comment becomes the operation summary, the remaining lines its description.
#[proc_macro_attribute]
pub fn route(args: TokenStream, input: TokenStream) -> TokenStream {
	route::from_input(args, input)
}

/// Creates two new structs: `CreateXInput` and `UpdateXInput` for the model.
/// For both models, fields with #[serde(skip_deserializing)] are skipped, and all
/// other fields are included verbatim (including attributes), except for `#[sqlx(...)]`
/// attributes and a derived `FromRow`, which only apply to the database row.
///
/// Fields of `UpdateXInput` are wrapped in `Option` unless they already are one.
#[proc_macro_attribute]
pub fn model(_args: TokenStream, input: TokenStream) -> TokenStream {
	model::from_input(input)
}
