//! `#[derive(Lenses)]` expansion.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Index, parse_quote};

#[derive(Default)]
struct LensAttr {
    readonly: bool,
    skip: bool,
}

pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Lenses can only be derived for structs",
            ));
        }
    };

    let name = &input.ident;
    let vis = &input.vis;

    let mut constructors = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let attr = parse_attr(field)?;
        if attr.skip {
            continue;
        }

        let ty = &field.ty;
        let (fn_name, label, member) = match &field.ident {
            Some(ident) => (
                format_ident!("lens_{}", ident),
                ident.to_string(),
                quote!(#ident),
            ),
            None => {
                let idx = Index::from(index);
                (format_ident!("lens_{}", index), index.to_string(), quote!(#idx))
            }
        };
        let writable = !attr.readonly;
        let doc = format!("Lens to `{}`.", label);

        constructors.push(quote! {
            #[doc = #doc]
            #vis fn #fn_name() -> ::slice_store::Lens<Self, #ty> {
                ::slice_store::__private::field(#label, #writable, |s| &s.#member, |s| &mut s.#member)
            }
        });
    }

    if constructors.is_empty() {
        return Ok(TokenStream::new());
    }

    let mut generics = input.generics.clone();
    generics
        .make_where_clause()
        .predicates
        .push(parse_quote!(Self: 'static));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#constructors)*
        }
    })
}

fn parse_attr(field: &Field) -> syn::Result<LensAttr> {
    let mut attr = LensAttr::default();
    for a in field.attrs.iter().filter(|a| a.path().is_ident("lens")) {
        a.parse_nested_meta(|meta| {
            if meta.path.is_ident("readonly") {
                attr.readonly = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                attr.skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `readonly` or `skip`"))
            }
        })?;
    }
    Ok(attr)
}
