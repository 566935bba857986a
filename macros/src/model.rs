use darling::{ast, FromDeriveInput, FromField};
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::{punctuated::Punctuated, Meta, Token};

#[derive(Debug, FromDeriveInput)]
#[darling(supports(struct_named), forward_attrs)]
struct ModelInputReceiver {
	ident: syn::Ident,

	generics: syn::Generics,

	data: ast::Data<(), ModelFieldReceiver>,

	attrs: Vec<syn::Attribute>,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs)]
struct ModelFieldReceiver {
	ident: Option<syn::Ident>,

	ty: syn::Type,
	vis: syn::Visibility,

	attrs: Vec<syn::Attribute>,
}

/// Whether the attribute is `#[serde(...)]` containing `skip_deserializing` or `skip`.
fn is_skipped(attr: &syn::Attribute) -> bool {
	let Meta::List(ref list) = attr.meta else {
		return false;
	};

	if !list.path.is_ident("serde") {
		return false;
	}

	list.tokens.to_token_stream().into_iter().any(|token| {
		matches!(token, TokenTree::Ident(ref ident) if ident == "skip_deserializing" || ident == "skip")
	})
}

/// Whether the attribute only makes sense on the database row, such as `#[sqlx(...)]`.
fn is_row_only(attr: &syn::Attribute) -> bool {
	attr.path().is_ident("sqlx")
}

/// Rewrites `#[derive(...)]` attributes to drop `FromRow`, since input structs
/// are never read from the database. Other attributes are returned untouched.
fn strip_row_derives(attr: &syn::Attribute) -> Option<syn::Attribute> {
	if is_row_only(attr) {
		return None;
	}

	if !attr.path().is_ident("derive") {
		return Some(attr.clone());
	}

	let Ok(paths) = attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
	else {
		return Some(attr.clone());
	};

	let paths = paths
		.into_iter()
		.filter(|path| {
			path.segments
				.last()
				.map_or(true, |segment| segment.ident != "FromRow")
		})
		.collect::<Vec<_>>();

	Some(syn::parse_quote!(#[derive(#(#paths),*)]))
}

/// Whether the type is already an `Option<T>`, in which case the update
/// field keeps it as-is instead of wrapping it a second time.
fn is_option(ty: &syn::Type) -> bool {
	let syn::Type::Path(path) = ty else {
		return false;
	};

	path.qself.is_none()
		&& path
			.path
			.segments
			.last()
			.is_some_and(|segment| segment.ident == "Option")
}

pub fn from_input(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = syn::parse_macro_input!(input as syn::DeriveInput);
	let receiver = match ModelInputReceiver::from_derive_input(&input) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let ident = &receiver.ident;
	let vis = &input.vis;
	let generics = &receiver.generics;
	let create_ident = format_ident!("Create{}Input", ident);
	let update_ident = format_ident!("Update{}Input", ident);

	let attrs = receiver
		.attrs
		.iter()
		.filter_map(strip_row_derives)
		.collect::<Vec<_>>();

	let Some(fields) = receiver.data.take_struct() else {
		return syn::Error::new_spanned(ident, "#[model] only supports structs with named fields")
			.into_compile_error()
			.into();
	};

	let fields = fields
		.iter()
		.filter_map(|field| {
			let ident = field.ident.as_ref()?;

			// Skip fields with #[serde(skip_deserializing)] or #[serde(skip)]
			if field.attrs.iter().any(is_skipped) {
				return None;
			}

			let attrs = field
				.attrs
				.iter()
				.filter(|attr| !is_row_only(attr))
				.collect::<Vec<_>>();

			Some((attrs, ident, &field.ty, &field.vis))
		})
		.collect::<Vec<_>>();

	let create_fields = fields.iter().map(|(attrs, ident, ty, vis)| {
		quote! {
			#(#attrs)*
			#vis #ident: #ty,
		}
	});

	let update_fields = fields.iter().map(|(attrs, ident, ty, vis)| {
		if is_option(ty) {
			quote! {
				#(#attrs)*
				#vis #ident: #ty,
			}
		} else {
			quote! {
				#(#attrs)*
				#vis #ident: Option<#ty>,
			}
		}
	});

	quote! {
		#input

		#(#attrs)*
		#vis struct #create_ident #generics {
			#(
				#create_fields
			)*
		}

		#(#attrs)*
		#vis struct #update_ident #generics {
			#(
				#update_fields
			)*
		}
	}
	.into()
}
