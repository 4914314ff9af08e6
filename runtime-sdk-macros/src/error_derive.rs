use darling::{util::Flag, FromDeriveInput, FromField, FromVariant};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Ident};

use crate::generators::{self as gen, CodedVariant};

#[derive(FromDeriveInput)]
#[darling(supports(enum_any), attributes(sdk_error))]
struct Error {
    ident: Ident,

    data: darling::ast::Data<ErrorVariant, darling::util::Ignored>,

    /// The path to a const set to the module name.
    #[darling(default)]
    module_name: Option<syn::LitStr>,
}

#[derive(FromVariant)]
#[darling(attributes(sdk_error))]
struct ErrorVariant {
    ident: Ident,

    fields: darling::ast::Fields<ErrorField>,

    /// The explicit ID of the error code.
    #[darling(default)]
    code: Option<u32>,

    /// Whether this error variant wraps an error of another module and reports its module name
    /// and code as its own.
    #[darling(default)]
    transparent: Flag,
}

#[derive(FromField)]
struct ErrorField {
    ident: Option<Ident>,
}

impl CodedVariant for ErrorVariant {
    const FIELD_NAME: &'static str = "code";

    fn ident(&self) -> &Ident {
        &self.ident
    }

    fn code(&self) -> Option<u32> {
        self.code
    }

    fn is_delegated(&self) -> bool {
        self.transparent.is_present()
    }
}

pub fn derive_error(input: DeriveInput) -> TokenStream {
    let error = match Error::from_derive_input(&input) {
        Ok(error) => error,
        Err(e) => return e.write_errors(),
    };

    match generate_error_impl(error) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
}

fn generate_error_impl(error: Error) -> syn::Result<TokenStream> {
    let error_ty_ident = &error.ident;
    let module_name = gen::module_name(error.module_name.as_ref())?;
    let sdk_crate = gen::sdk_crate_path();

    let variants = error
        .data
        .as_ref()
        .take_enum()
        .ok_or_else(|| syn::Error::new(error_ty_ident.span(), "expected an enum"))?;
    let codes = gen::variant_codes(&variants)?;

    let mut module_name_arms = Vec::with_capacity(variants.len());
    let mut code_arms = Vec::with_capacity(variants.len());
    for (variant, code) in variants.iter().zip(codes) {
        let variant_ident = &variant.ident;

        match code {
            Some(code) => {
                module_name_arms.push(quote!(Self::#variant_ident { .. } => { #module_name }));
                code_arms.push(quote!(Self::#variant_ident { .. } => { #code }));
            }
            None => {
                let pattern = transparent_pattern(variant)?;
                module_name_arms.push(quote! {
                    #pattern => #sdk_crate::error::Error::module_name(source)
                });
                code_arms.push(quote! {
                    #pattern => #sdk_crate::error::Error::code(source)
                });
            }
        }
    }

    let (module_name_body, code_body) = if variants.is_empty() {
        (quote!(#module_name), quote!(0))
    } else {
        (
            quote!(match self { #(#module_name_arms,)* }),
            quote!(match self { #(#code_arms,)* }),
        )
    };

    Ok(gen::wrap_in_const(quote! {
        impl #sdk_crate::error::Error for #error_ty_ident {
            fn module_name(&self) -> &str {
                #module_name_body
            }

            fn code(&self) -> u32 {
                #code_body
            }
        }
    }))
}

/// Pattern binding the single inner value of a transparent variant as `source`.
fn transparent_pattern(variant: &ErrorVariant) -> syn::Result<TokenStream> {
    let variant_ident = &variant.ident;
    if variant.fields.len() != 1 {
        return Err(syn::Error::new(
            variant_ident.span(),
            "transparent variants must have exactly one field",
        ));
    }

    let pattern = match &variant.fields.fields[0].ident {
        Some(field_ident) => quote!(Self::#variant_ident { #field_ident: source }),
        None => quote!(Self::#variant_ident(source)),
    };
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    #[test]
    fn generate_error_impl() {
        let expected: syn::Stmt = syn::parse_quote!(
            const _: () = {
                impl ::wasmd_runtime_sdk::error::Error for Error {
                    fn module_name(&self) -> &str {
                        match self {
                            Self::InvalidArgument { .. } => { MODULE_NAME },
                            Self::Forbidden { .. } => { MODULE_NAME },
                            Self::Core(source) => ::wasmd_runtime_sdk::error::Error::module_name(source),
                        }
                    }
                    fn code(&self) -> u32 {
                        match self {
                            Self::InvalidArgument { .. } => { 1u32 },
                            Self::Forbidden { .. } => { 3u32 },
                            Self::Core(source) => ::wasmd_runtime_sdk::error::Error::code(source),
                        }
                    }
                }
            };
        );

        let input: syn::DeriveInput = syn::parse_quote!(
            #[derive(Error)]
            pub enum Error {
                #[sdk_error(code = 1)]
                InvalidArgument,
                #[sdk_error(code = 3)]
                Forbidden { reason: String },
                #[sdk_error(transparent)]
                Core(#[from] core::Error),
            }
        );
        let error_derivation = super::derive_error(input);
        let actual: syn::Stmt = syn::parse2(error_derivation).unwrap();

        crate::assert_empty_diff!(actual, expected);
    }

    #[test]
    fn generate_error_impl_with_module_name() {
        let expected: syn::Stmt = syn::parse_quote!(
            const _: () = {
                impl ::wasmd_runtime_sdk::error::Error for Error {
                    fn module_name(&self) -> &str {
                        match self {
                            Self::Named { inner: source } => ::wasmd_runtime_sdk::error::Error::module_name(source),
                            Self::Other { .. } => { THE_MODULE_NAME },
                        }
                    }
                    fn code(&self) -> u32 {
                        match self {
                            Self::Named { inner: source } => ::wasmd_runtime_sdk::error::Error::code(source),
                            Self::Other { .. } => { 7u32 },
                        }
                    }
                }
            };
        );

        let input: syn::DeriveInput = syn::parse_quote!(
            #[derive(Error)]
            #[sdk_error(module_name = "THE_MODULE_NAME")]
            pub enum Error {
                #[sdk_error(transparent)]
                Named { inner: other::Error },
                #[sdk_error(code = 7)]
                Other(String),
            }
        );
        let error_derivation = super::derive_error(input);
        let actual: syn::Stmt = syn::parse2(error_derivation).unwrap();

        crate::assert_empty_diff!(actual, expected);
    }

    #[test]
    fn reject_missing_code() {
        let input: syn::DeriveInput = syn::parse_quote!(
            pub enum Error {
                #[sdk_error(code = 1)]
                InvalidArgument,
                Forbidden,
            }
        );
        let output = super::derive_error(input).to_string();
        assert!(output.contains("compile_error"));
        assert!(output.contains("missing `code` for variant"));
    }
}
