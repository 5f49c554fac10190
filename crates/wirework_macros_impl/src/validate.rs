// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Interactive validation: the full diagnostic pass without emission.
//!
//! Editor tooling calls this to surface findings while the user types; it
//! is a thin composition over the same stages the generator runs, so the
//! selection and validation rules cannot drift apart.

use proc_macro2::TokenStream;
use syn::{parse2, ItemMod};

use crate::diagnostic::Diagnostic;
use crate::pipeline::run_pipeline;

/// Validates a parsed module, returning every finding in stage order.
pub fn validate_module(module: &ItemMod) -> Vec<Diagnostic> {
    run_pipeline(module).diagnostics
}

/// Validates a module given as tokens.
pub fn validate_tokens(item: TokenStream) -> syn::Result<Vec<Diagnostic>> {
    let module: ItemMod = parse2(item)?;
    Ok(validate_module(&module))
}
