use proc_macro::TokenStream;
use quote::{quote, quote_spanned};
use syn::{self, ext::IdentExt};

#[proc_macro_derive(TemplateOptions)]
pub fn template_options_derive(input: TokenStream) -> TokenStream {
	// Every named field becomes one template variable, keyed by the field name.
	let syn::DeriveInput {
		ident,
		data,
		generics,
		..
	} = syn::parse_macro_input!(input);

	let fields = match data {
		syn::Data::Struct(s) => match s.fields {
			syn::Fields::Named(syn::FieldsNamed { named, .. }) => named,
			_ => {
				return quote_spanned! {
					ident.span() =>
					compile_error!("TemplateOptions can only be derived for structs with named fields.");
				}
				.into()
			}
		},
		_ => {
			return quote_spanned! {
				ident.span() =>
				compile_error!("Cannot derive TemplateOptions for non-structs.");
			}
			.into()
		}
	};

	let idents: Vec<_> = fields.iter().filter_map(|f| f.ident.as_ref()).collect();
	let names = idents.iter().map(|i| i.unraw().to_string());
	let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

	let output = quote! {
		impl #impl_generics ::glsl_chunks::TemplateOptions for #ident #ty_generics #where_clause {
			fn options(&self) -> ::std::borrow::Cow<'_, ::glsl_chunks::Options> {
				let mut options = ::glsl_chunks::Options::new();
				#(
					options.insert_field(#names, ::glsl_chunks::TemplateValue::to_glsl(&self.#idents));
				)*
				::std::borrow::Cow::Owned(options)
			}
		}
	};

	output.into()
}
