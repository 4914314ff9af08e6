use std::collections::BTreeSet;

use proc_macro2::TokenStream;
use quote::quote;
use syn::Ident;

pub fn wrap_in_const(tokens: TokenStream) -> TokenStream {
    quote! {
        const _: () = {
            #tokens
        };
    }
}

/// Determines what crate name should be used to refer to `wasmd_runtime_sdk` types.
/// Required for use within the SDK itself (crates cannot refer to their own names).
pub fn sdk_crate_path() -> syn::Path {
    let is_internal = std::env::var("CARGO_PKG_NAME")
        .map(|pkg_name| pkg_name == "wasmd-runtime-sdk")
        .unwrap_or_default();
    if is_internal {
        // Doctests are their own crates, but they share the name of the primary crate.
        syn::parse_quote!(crate::wasmd_runtime_sdk)
    } else {
        syn::parse_quote!(::wasmd_runtime_sdk)
    }
}

pub trait CodedVariant {
    /// The field in the helper attribute that yields the value provided by `code`.
    /// For instance, in `#[sdk_event(code = 0)]`, the `FIELD_NAME` would be `code`.
    const FIELD_NAME: &'static str;

    /// The variant ident.
    fn ident(&self) -> &Ident;

    /// The code to which the variant should be converted.
    fn code(&self) -> Option<u32>;

    /// Whether the variant delegates its code to an inner value.
    fn is_delegated(&self) -> bool {
        false
    }
}

/// Checks that every non-delegated variant has a code and that codes are unique.
///
/// Returns the codes in variant order (`None` for delegated variants).
pub(crate) fn variant_codes<V: CodedVariant>(variants: &[&V]) -> syn::Result<Vec<Option<u32>>> {
    let mut reserved = BTreeSet::new();
    let mut codes = Vec::with_capacity(variants.len());

    for variant in variants {
        if variant.is_delegated() {
            codes.push(None);
            continue;
        }

        let ident = variant.ident();
        let code = variant.code().ok_or_else(|| {
            syn::Error::new(
                ident.span(),
                format!("missing `{}` for variant", V::FIELD_NAME),
            )
        })?;
        if !reserved.insert(code) {
            return Err(syn::Error::new(
                ident.span(),
                format!("code {} already used", code),
            ));
        }
        codes.push(Some(code));
    }

    Ok(codes)
}

pub(crate) fn enum_code_converter<V: CodedVariant>(
    enum_binding: &Ident,
    variants: &[&V],
) -> syn::Result<TokenStream> {
    if variants.is_empty() {
        return Ok(quote!(0));
    }

    let codes = variant_codes(variants)?;
    let match_arms = variants.iter().zip(codes).map(|(variant, code)| {
        let variant_ident = variant.ident();
        quote!(Self::#variant_ident { .. } => { #code })
    });

    Ok(quote! {
        match #enum_binding {
            #(#match_arms)*
        }
    })
}

pub(crate) fn module_name(module_name_lit: Option<&syn::LitStr>) -> syn::Result<syn::Expr> {
    match module_name_lit {
        Some(expr_str) => expr_str.parse::<syn::Expr>().map_err(|_| {
            syn::Error::new(
                expr_str.span(),
                "expected `module_name` to be a valid expression",
            )
        }),
        None => Ok(syn::parse_quote!(MODULE_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyVariant {
        ident: Ident,
        code: Option<u32>,
    }

    impl CodedVariant for DummyVariant {
        const FIELD_NAME: &'static str = "code";

        fn ident(&self) -> &Ident {
            &self.ident
        }

        fn code(&self) -> Option<u32> {
            self.code
        }
    }

    fn variant(name: &str, code: Option<u32>) -> DummyVariant {
        DummyVariant {
            ident: quote::format_ident!("{}", name),
            code,
        }
    }

    #[test]
    fn generate_empty_enum_converter() {
        let variants: &[&DummyVariant] = &[];

        let expected: syn::Expr = syn::parse_quote!(0);
        let converter = enum_code_converter(&quote::format_ident!("the_enum"), variants).unwrap();
        let actual: syn::Expr = syn::parse2(converter).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn reject_duplicate_codes() {
        let a = variant("A", Some(1));
        let b = variant("B", Some(1));

        let err = variant_codes(&[&a, &b]).unwrap_err();
        assert_eq!(err.to_string(), "code 1 already used");
    }

    #[test]
    fn reject_missing_code() {
        let a = variant("A", Some(1));
        let b = variant("B", None);

        let err = variant_codes(&[&a, &b]).unwrap_err();
        assert_eq!(err.to_string(), "missing `code` for variant");
    }
}
