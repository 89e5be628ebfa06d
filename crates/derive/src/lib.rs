use proc_macro2::Span;
use quote::{quote, quote_spanned};
use syn::{DeriveInput, parse_macro_input};

/// Implements `glshade::HostType` for a struct with named fields, describing it as a GLSL struct
/// whose members mirror the fields in declaration order.
///
/// The host layout must match std140, so use `#[repr(C)]` and pad `vec3`-like fields.
#[proc_macro_derive(GlslStruct)]
pub fn derive_glsl_struct(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match input.data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(fields),
            ..
        }) => fields,
        _ => {
            return quote_spanned! {
                Span::call_site() =>
                compile_error!("GlslStruct can only be derived for structs with named fields");
            }
            .into();
        }
    };

    let members = fields
        .named
        .iter()
        .filter_map(|x| {
            let ident = x.ident.as_ref()?;
            let ident_str = ident.to_string();
            let ident_str = ident_str.trim_start_matches('_');
            let ty = &x.ty;
            Some(quote! { glshade::StructField::new::<#ty>(#ident_str) })
        })
        .collect::<Vec<_>>();

    quote! {
        impl #impl_generics glshade::HostType for #name #ty_generics #where_clause {
            fn type_meta() -> glshade::TypeMeta {
                glshade::TypeMeta::Struct(vec![#(#members),*])
            }
        }
    }
    .into()
}
