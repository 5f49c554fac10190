// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `#[wirework::module]` expansion: rewrite the module and append the
//! wiring function.

use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{parse2, Item, ItemMod};

use crate::ctor::{CONSTRUCTOR_MARKER, FIELD_MARKER};
use crate::diagnostic::{Diagnostic, Severity};
use crate::emit::emit_wiring;
use crate::pipeline::run_pipeline;

/// The rewritten module plus everything the pipeline found.
#[derive(Debug)]
pub struct Expansion {
    /// The emitted module, markers stripped and wiring appended.
    pub tokens: TokenStream,
    /// The full diagnostic list, warnings included.
    pub diagnostics: Vec<Diagnostic>,
}

impl Expansion {
    /// Renders the expansion the way the macro surfaces it: the module,
    /// followed by one `compile_error!` per error-severity finding.
    /// Warnings are carried in [`Self::diagnostics`] only; they never block
    /// the build.
    pub fn into_token_stream(self) -> TokenStream {
        let mut tokens = self.tokens;
        for diagnostic in &self.diagnostics {
            if diagnostic.severity != Severity::Error {
                continue;
            }
            let message = diagnostic.render();
            let span = diagnostic.span.unwrap_or_else(Span::call_site);
            tokens.extend(quote_spanned!(span=> ::core::compile_error!(#message);));
        }
        tokens
    }
}

/// Expands `#[wirework::module]` on an inline module.
#[cfg_attr(test, mutants::skip)]
pub fn expand_module(attr: TokenStream, item: TokenStream) -> syn::Result<Expansion> {
    if !attr.is_empty() {
        return Err(syn::Error::new_spanned(
            attr,
            "wirework::module takes no arguments",
        ));
    }

    let module: ItemMod = parse2(item)?;
    if module.content.is_none() {
        return Err(syn::Error::new_spanned(
            &module,
            "wirework::module only supports inline modules",
        ));
    }

    let output = run_pipeline(&module);
    let wiring = emit_wiring(&output.table, &output.invalid)?;
    let wiring: syn::ItemFn = parse2(wiring)?;

    let mut module = module;
    rewrite_items(&mut module, &output.registration_fns);
    if let Some((_, items)) = &mut module.content {
        items.push(Item::Fn(wiring));
    }

    Ok(Expansion {
        tokens: quote!(#module),
        diagnostics: output.diagnostics,
    })
}

/// Drops the consumed registration functions and strips the declarative
/// markers; everything else is reproduced verbatim.
fn rewrite_items(module: &mut ItemMod, registration_fns: &[syn::Ident]) {
    let Some((_, items)) = &mut module.content else {
        return;
    };

    items.retain(|item| match item {
        Item::Fn(function) => !registration_fns.contains(&function.sig.ident),
        _ => true,
    });

    for item in items {
        match item {
            Item::Struct(declaration) => {
                for field in &mut declaration.fields {
                    field.attrs.retain(|attr| !attr.path().is_ident(FIELD_MARKER));
                }
            }
            Item::Impl(block) => {
                for impl_item in &mut block.items {
                    if let syn::ImplItem::Fn(function) = impl_item {
                        function
                            .attrs
                            .retain(|attr| !attr.path().is_ident(CONSTRUCTOR_MARKER));
                    }
                }
            }
            _ => {}
        }
    }
}
