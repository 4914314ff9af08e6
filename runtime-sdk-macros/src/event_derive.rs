use darling::{FromDeriveInput, FromField, FromVariant};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::generators::{self as gen, CodedVariant};

#[derive(FromDeriveInput)]
#[darling(supports(enum_any), attributes(sdk_event))]
struct Event {
    ident: syn::Ident,

    data: darling::ast::Data<EventVariant, darling::util::Ignored>,

    /// The path to a const set to the module name.
    #[darling(default)]
    module_name: Option<syn::LitStr>,
}

#[derive(FromVariant)]
#[darling(attributes(sdk_event))]
struct EventVariant {
    ident: syn::Ident,

    fields: darling::ast::Fields<EventField>,

    /// The explicit ID of the event code.
    #[darling(default)]
    code: Option<u32>,

    /// The event type. Defaults to the snake-cased variant name.
    #[darling(default)]
    kind: Option<String>,
}

#[derive(FromField)]
#[darling(attributes(sdk_event))]
struct EventField {
    ident: Option<syn::Ident>,

    /// The attribute key. Defaults to the field name.
    #[darling(default)]
    key: Option<String>,
}

impl CodedVariant for EventVariant {
    const FIELD_NAME: &'static str = "code";

    fn ident(&self) -> &syn::Ident {
        &self.ident
    }

    fn code(&self) -> Option<u32> {
        self.code
    }
}

impl EventVariant {
    fn kind(&self) -> String {
        self.kind
            .clone()
            .unwrap_or_else(|| to_snake_case(&self.ident.to_string()))
    }
}

pub fn derive_event(input: syn::DeriveInput) -> TokenStream {
    let event = match Event::from_derive_input(&input) {
        Ok(event) => event,
        Err(e) => return e.write_errors(),
    };

    match generate_event_impl(event) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
}

fn generate_event_impl(event: Event) -> syn::Result<TokenStream> {
    let event_ty_ident = &event.ident;
    let module_name = gen::module_name(event.module_name.as_ref())?;
    let sdk_crate = gen::sdk_crate_path();

    let variants = event
        .data
        .as_ref()
        .take_enum()
        .ok_or_else(|| syn::Error::new(event_ty_ident.span(), "expected an enum"))?;
    let code_converter = gen::enum_code_converter(&format_ident!("self"), &variants)?;

    let (kind_body, attributes_body) = if variants.is_empty() {
        (quote!(""), quote!(Vec::new()))
    } else {
        let kind_arms = variants.iter().map(|variant| {
            let variant_ident = &variant.ident;
            let kind = variant.kind();
            quote!(Self::#variant_ident { .. } => #kind)
        });
        let attributes_arms = variants
            .iter()
            .map(|variant| attributes_arm(&sdk_crate, variant))
            .collect::<syn::Result<Vec<_>>>()?;

        (
            quote!(match self { #(#kind_arms,)* }),
            quote!(match self { #(#attributes_arms,)* }),
        )
    };

    Ok(gen::wrap_in_const(quote! {
        impl #sdk_crate::event::Event for #event_ty_ident {
            fn module_name() -> &'static str {
                #module_name
            }

            fn code(&self) -> u32 {
                #code_converter
            }

            fn kind(&self) -> &'static str {
                #kind_body
            }

            fn attributes(&self) -> Vec<#sdk_crate::event::Attribute> {
                #attributes_body
            }
        }
    }))
}

/// Match arm that renders the fields of a variant as ordered attributes.
fn attributes_arm(sdk_crate: &syn::Path, variant: &EventVariant) -> syn::Result<TokenStream> {
    let variant_ident = &variant.ident;
    let mut bindings = Vec::with_capacity(variant.fields.len());
    let mut attributes = Vec::with_capacity(variant.fields.len());

    for (index, field) in variant.fields.iter().enumerate() {
        let binding = format_ident!("__field{}", index);
        let key = match (&field.key, &field.ident) {
            (Some(key), _) => key.clone(),
            (None, Some(ident)) => ident.to_string(),
            (None, None) => {
                return Err(syn::Error::new(
                    variant_ident.span(),
                    "unnamed event fields require an explicit `key`",
                ))
            }
        };

        attributes.push(quote! {
            #sdk_crate::event::Attribute::new(
                #key,
                #sdk_crate::event::AttributeValue::to_attribute_value(#binding),
            )
        });
        bindings.push((field.ident.clone(), binding));
    }

    let pattern = match variant.fields.style {
        darling::ast::Style::Struct => {
            let bindings = bindings.iter().map(|(ident, binding)| quote!(#ident: #binding));
            quote!(Self::#variant_ident { #(#bindings),* })
        }
        darling::ast::Style::Tuple => {
            let bindings = bindings.iter().map(|(_, binding)| binding);
            quote!(Self::#variant_ident ( #(#bindings),* ))
        }
        darling::ast::Style::Unit => quote!(Self::#variant_ident),
    };

    Ok(quote!(#pattern => vec![#(#attributes),*]))
}

fn to_snake_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, c) in ident.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    #[test]
    fn generate_event_impl() {
        let expected: syn::Stmt = syn::parse_quote!(
            const _: () = {
                impl ::wasmd_runtime_sdk::event::Event for MainEvent {
                    fn module_name() -> &'static str {
                        MODULE_NAME
                    }
                    fn code(&self) -> u32 {
                        match self {
                            Self::StoreCode { .. } => { 1u32 }
                            Self::Unpinned { .. } => { 2u32 }
                            Self::Raw { .. } => { 3u32 }
                        }
                    }
                    fn kind(&self) -> &'static str {
                        match self {
                            Self::StoreCode { .. } => "store_code",
                            Self::Unpinned { .. } => "unpin",
                            Self::Raw { .. } => "raw",
                        }
                    }
                    fn attributes(&self) -> Vec<::wasmd_runtime_sdk::event::Attribute> {
                        match self {
                            Self::StoreCode {
                                code_id: __field0,
                                checksum: __field1,
                            } => vec![
                                ::wasmd_runtime_sdk::event::Attribute::new(
                                    "code_id",
                                    ::wasmd_runtime_sdk::event::AttributeValue::to_attribute_value(__field0),
                                ),
                                ::wasmd_runtime_sdk::event::Attribute::new(
                                    "code_checksum",
                                    ::wasmd_runtime_sdk::event::AttributeValue::to_attribute_value(__field1),
                                )
                            ],
                            Self::Unpinned => vec![],
                            Self::Raw(__field0) => vec![
                                ::wasmd_runtime_sdk::event::Attribute::new(
                                    "data",
                                    ::wasmd_runtime_sdk::event::AttributeValue::to_attribute_value(__field0),
                                )
                            ],
                        }
                    }
                }
            };
        );

        let input: syn::DeriveInput = syn::parse_quote!(
            #[derive(Event)]
            pub enum MainEvent {
                #[sdk_event(code = 1)]
                StoreCode {
                    code_id: u64,
                    #[sdk_event(key = "code_checksum")]
                    checksum: String,
                },
                #[sdk_event(code = 2, kind = "unpin")]
                Unpinned,
                #[sdk_event(code = 3)]
                Raw(#[sdk_event(key = "data")] String),
            }
        );
        let event_derivation = super::derive_event(input);
        let actual: syn::Stmt = syn::parse2(event_derivation).unwrap();

        crate::assert_empty_diff!(actual, expected);
    }

    #[test]
    fn generate_empty_event_impl() {
        let expected: syn::Stmt = syn::parse_quote!(
            const _: () = {
                impl ::wasmd_runtime_sdk::event::Event for MainEvent {
                    fn module_name() -> &'static str {
                        THE_MODULE_NAME
                    }
                    fn code(&self) -> u32 {
                        0
                    }
                    fn kind(&self) -> &'static str {
                        ""
                    }
                    fn attributes(&self) -> Vec<::wasmd_runtime_sdk::event::Attribute> {
                        Vec::new()
                    }
                }
            };
        );

        let input: syn::DeriveInput = syn::parse_quote!(
            #[derive(Event)]
            #[sdk_event(module_name = "THE_MODULE_NAME")]
            pub enum MainEvent {}
        );
        let event_derivation = super::derive_event(input);
        let actual: syn::Stmt = syn::parse2(event_derivation).unwrap();

        crate::assert_empty_diff!(actual, expected);
    }

    #[test]
    fn snake_case_kinds() {
        assert_eq!(super::to_snake_case("StoreCode"), "store_code");
        assert_eq!(super::to_snake_case("Pin"), "pin");
        assert_eq!(super::to_snake_case("UpdateContractAdmin"), "update_contract_admin");
    }
}
