use darling::ast::Data;
use darling::util::Ignored;
use darling::{FromDeriveInput, FromField};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, DeriveInput, Error, Generics, Ident, LitStr, Type, Visibility};

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(bean), supports(struct_named, struct_unit))]
struct BeanInput {
    ident: Ident,
    generics: Generics,
    data: Data<Ignored, BeanField>,

    name: Option<String>,
    scope: Option<LitStr>,
    #[darling(multiple)]
    provides: Vec<LitStr>,
    init: Option<String>,
    destroy: Option<String>,
    #[darling(default)]
    initializing: bool,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs(wire))]
struct BeanField {
    ident: Option<Ident>,
    vis: Visibility,
    attrs: Vec<Attribute>,
}

pub fn derive_bean(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let bean = match BeanInput::from_derive_input(&input) {
        Ok(bean) => bean,
        Err(err) => return err.write_errors(),
    };

    match expand(&bean) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(bean: &BeanInput) -> Result<TokenStream, Error> {
    let ident = &bean.ident;
    let (impl_generics, ty_generics, where_clause) = bean.generics.split_for_impl();

    let name = bean.name.as_ref().map(|name| quote!(.name(#name)));
    let scope = bean.scope.as_ref().map(scope_call).transpose()?;

    let mut fields = Vec::new();
    if let Data::Struct(struct_fields) = &bean.data {
        for field in struct_fields.iter() {
            if let Some(call) = bind_call(field)? {
                fields.push(call);
            }
        }
    }

    let provides = bean
        .provides
        .iter()
        .map(|capability| -> Result<TokenStream, Error> {
            let ty: Type = capability.parse()?;
            Ok(quote! {
                .provides(|bean: ::std::sync::Arc<Self>| bean as ::std::sync::Arc<#ty>)
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let initializing = bean.initializing.then(|| quote!(.initializing()));

    let init = bean.init.as_ref().map(|method| {
        let method_ident = format_ident!("{}", method);
        quote! {
            .init_method(#method, |bean: &mut Self| Self::#method_ident(bean))
        }
    });

    let destroy = bean.destroy.as_ref().map(|method| {
        let method_ident = format_ident!("{}", method);
        quote! {
            .destroy_method(#method, |bean: &Self| Self::#method_ident(bean))
        }
    });

    Ok(quote! {
        impl #impl_generics ::tarkib::Bean for #ident #ty_generics #where_clause {
            fn bean_definition() -> ::tarkib::Result<::tarkib::definition::BeanDefinition> {
                ::tarkib::definition::BeanDefinition::builder::<Self>()
                    #name
                    #scope
                    #(#fields)*
                    #(#provides)*
                    #initializing
                    #init
                    #destroy
                    .build()
            }
        }
    })
}

fn scope_call(scope: &LitStr) -> Result<TokenStream, Error> {
    let variant = match scope.value().as_str() {
        "singleton" => quote!(Singleton),
        "prototype" => quote!(Prototype),
        other => {
            return Err(Error::new(
                scope.span(),
                format!("unknown scope '{other}', expected 'singleton' or 'prototype'"),
            ));
        }
    };
    Ok(quote!(.scope(::tarkib::Scope::#variant)))
}

/// `.bind(...)` for a field carrying `#[wire]` attributes; several are
/// joined with `;` and validated when the definition is built.
fn bind_call(field: &BeanField) -> Result<Option<TokenStream>, Error> {
    let directives = field
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("wire"))
        .map(|attr| attr.parse_args::<LitStr>().map(|lit| lit.value()))
        .collect::<Result<Vec<_>, Error>>()?;

    if directives.is_empty() {
        return Ok(None);
    }

    let Some(ident) = &field.ident else {
        return Ok(None);
    };
    let field_name = ident.to_string();
    let directive = directives.join(";");
    let visibility = match field.vis {
        Visibility::Inherited => quote!(Private),
        _ => quote!(Public),
    };

    Ok(Some(quote! {
        .bind(
            #field_name,
            #directive,
            ::tarkib::definition::Visibility::#visibility,
            |bean: &mut Self| &mut bean.#ident,
        )
    }))
}
