//! `#[derive(Lenses)]`: generate `<field>_lens()` constructors for named fields.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Error, Fields, Ident, Result, Type};

/// One generated lens: the field and its type.
struct LensField {
    ident: Ident,
    ty: Type,
}

/// Collect the named fields of a struct, rejecting every other shape.
fn lens_fields(input: &DeriveInput) -> Result<Vec<LensField>> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "Lenses can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            &input.ident,
            "Lenses requires a struct with named fields",
        ));
    };
    Ok(named
        .named
        .iter()
        .filter_map(|field| {
            field.ident.clone().map(|ident| LensField {
                ident,
                ty: field.ty.clone(),
            })
        })
        .collect())
}

pub(crate) fn lenses_impl(input: TokenStream) -> Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;
    let fields = lens_fields(&input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let constructors = fields.iter().map(|LensField { ident, ty }| {
        let fn_name = format_ident!("{}_lens", ident);
        let doc = format!("Lens focusing on the `{ident}` field.");
        quote! {
            #[doc = #doc]
            pub fn #fn_name() -> ::tether::reactive::Lens<Self, #ty>
            where
                Self: ::std::clone::Clone + 'static,
                #ty: ::std::clone::Clone + 'static,
            {
                ::tether::reactive::Lens::new(
                    |whole: &Self| ::std::clone::Clone::clone(&whole.#ident),
                    |whole: &Self, part: #ty| Self {
                        #ident: part,
                        ..::std::clone::Clone::clone(whole)
                    },
                )
            }
        }
    });

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#constructors)*
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    fn expand(tokens: TokenStream) -> Result<String> {
        lenses_impl(tokens).map(|out| out.to_string())
    }

    #[test]
    fn one_constructor_per_field() {
        let out = expand(quote! {
            struct Todo {
                title: String,
                completed: bool,
            }
        })
        .unwrap();
        assert!(out.contains("fn title_lens"));
        assert!(out.contains("fn completed_lens"));
        assert!(out.contains("Lens < Self , bool >"));
    }

    #[test]
    fn generics_are_carried() {
        let out = expand(quote! {
            struct Pair<T: Clone> {
                left: T,
                right: T,
            }
        })
        .unwrap();
        assert!(out.contains("impl < T : Clone > Pair < T >"));
        assert!(out.contains("fn right_lens"));
    }

    #[test]
    fn empty_struct_generates_empty_impl() {
        let out = expand(quote! { struct Unit {} }).unwrap();
        assert!(!out.contains("_lens"));
    }

    #[test]
    fn tuple_struct_is_rejected() {
        let err = expand(quote! { struct Point(i32, i32); }).unwrap_err();
        assert!(err.to_string().contains("named fields"));
    }

    #[test]
    fn enum_is_rejected() {
        let err = expand(quote! { enum Filter { All, Active } }).unwrap_err();
        assert!(err.to_string().contains("only be derived for structs"));
    }
}
