//! `#[derive(Replicate)]` expansion.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, GenericParam, Index, parse_quote};

pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;

    let body = match &input.data {
        Data::Struct(data) => copy_struct(&data.fields),
        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| {
                let ident = &variant.ident;
                let (pattern, rebuild) = copy_bindings(&variant.fields);
                quote!(Self::#ident #pattern => Self::#ident #rebuild)
            });
            quote! {
                match self {
                    #(#arms,)*
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "Replicate cannot be derived for unions",
            ));
        }
    };

    let mut generics = input.generics.clone();
    for param in generics.params.iter_mut() {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(::slice_store::Replicate));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::slice_store::Replicate for #name #ty_generics #where_clause {
            fn deep_copy(&self) -> Self {
                #body
            }
        }
    })
}

fn copy_struct(fields: &Fields) -> TokenStream {
    match fields {
        Fields::Named(named) => {
            let inits = named.named.iter().map(|f| {
                let ident = &f.ident;
                quote!(#ident: ::slice_store::Replicate::deep_copy(&self.#ident))
            });
            quote!(Self { #(#inits),* })
        }
        Fields::Unnamed(unnamed) => {
            let inits = (0..unnamed.unnamed.len()).map(|i| {
                let idx = Index::from(i);
                quote!(::slice_store::Replicate::deep_copy(&self.#idx))
            });
            quote!(Self(#(#inits),*))
        }
        Fields::Unit => quote!(Self),
    }
}

/// Destructuring pattern and rebuilt value for one enum variant.
fn copy_bindings(fields: &Fields) -> (TokenStream, TokenStream) {
    match fields {
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().map(|f| &f.ident).collect();
            (
                quote!({ #(#idents),* }),
                quote!({ #(#idents: ::slice_store::Replicate::deep_copy(#idents)),* }),
            )
        }
        Fields::Unnamed(unnamed) => {
            let binds: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("f{}", i))
                .collect();
            (
                quote!((#(#binds),*)),
                quote!((#(::slice_store::Replicate::deep_copy(#binds)),*)),
            )
        }
        Fields::Unit => (TokenStream::new(), TokenStream::new()),
    }
}
