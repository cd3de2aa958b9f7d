use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, FnArg, Ident, ItemFn};

/// `snake_case` function name to `CamelCase` type name.
fn type_name_for(ident: &Ident) -> Ident {
    let camel: String = ident
        .to_string()
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    Ident::new(&camel, ident.span())
}

fn check_signature(func: &ItemFn) -> syn::Result<()> {
    let sig = &func.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "components render synchronously",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "components cannot be generic",
        ));
    }
    let typed = sig
        .inputs
        .iter()
        .filter(|arg| matches!(arg, FnArg::Typed(_)))
        .count();
    if typed != 2 || sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "expected `(props: &Props, cx: &mut RenderContext<'_>)`",
        ));
    }
    Ok(())
}

/// Turns a render function into a `Component` type.
///
/// ```ignore
/// #[component]
/// fn greeting(props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult { .. }
/// // expands to the function plus `pub struct Greeting;` implementing
/// // `Component`, with `Greeting::element()` returning an element builder.
/// ```
///
/// `#[component(Name)]` picks the type name explicitly.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_tokens = TokenStream2::from(attr);
    let explicit_name = if attr_tokens.is_empty() {
        None
    } else {
        match syn::parse2::<Ident>(attr_tokens) {
            Ok(ident) => Some(ident),
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let func = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&func) {
        return err.to_compile_error().into();
    }

    let vis = &func.vis;
    let fn_ident = &func.sig.ident;
    let type_ident = explicit_name.unwrap_or_else(|| type_name_for(fn_ident));
    let display_name = type_ident.to_string();
    let props_ident = Ident::new("__props", Span::call_site());
    let cx_ident = Ident::new("__cx", Span::call_site());

    let expanded = quote! {
        #func

        #[derive(Clone, Copy, Debug, Default)]
        #vis struct #type_ident;

        impl #type_ident {
            /// Element builder for this component.
            #vis fn element() -> ::arbor_core::ElementBuilder {
                ::arbor_core::Element::component(#type_ident)
            }
        }

        impl ::arbor_core::Component for #type_ident {
            fn name(&self) -> &'static str {
                #display_name
            }

            fn render(
                &self,
                #props_ident: &::arbor_core::Props,
                #cx_ident: &mut ::arbor_core::RenderContext<'_>,
            ) -> ::arbor_core::ComponentResult {
                #fn_ident(#props_ident, #cx_ident)
            }
        }
    };
    expanded.into()
}
