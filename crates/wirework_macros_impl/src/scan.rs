// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Declaration scanning: finds registration call sites in a module.
//!
//! Scanning is purely syntactic and host-independent: a call site matches
//! when its callee path ends in one of the three registration names with the
//! matching turbofish arity. Registration calls live in ordinary functions
//! at the top level of the module; any function containing at least one
//! matching call is a registration function and is consumed by the expander.

use proc_macro2::Span;
use quote::ToTokens;
use syn::spanned::Spanned;
use syn::visit::Visit;
use syn::{Expr, ExprCall, ItemMod, Type};

use crate::descriptor::{canonical_rendering, SourceLocation, ThreadMode};
use crate::diagnostic::{Diagnostic, DiagnosticCode};

const REGISTER: &str = "register";
const REGISTER_DEFERRED_SINGLETON: &str = "register_deferred_singleton";
const REGISTER_CONSTANT: &str = "register_constant";

/// Which registration operation a call site invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `register::<I, C>()` / `register::<C>()`.
    Transient,
    /// `register_deferred_singleton::<I, C>()`.
    DeferredSingleton,
    /// `register_constant::<T>(value)`.
    Constant,
}

/// One matched registration call, still carrying `syn` nodes.
///
/// This is ephemeral scanner output, consumed within the same pipeline run;
/// the value-typed [`crate::descriptor::RegistrationRecord`] is produced
/// from it by the later stages.
#[derive(Debug, Clone)]
pub struct RegistrationCall {
    /// The operation invoked.
    pub kind: CallKind,
    /// The binding's interface type (first type argument).
    pub interface: Type,
    /// The concrete type to construct; `None` for constants.
    pub concrete: Option<Type>,
    /// The contract key literal, when given.
    pub contract: Option<String>,
    /// The thread mode, when given on a deferred-singleton call.
    pub thread_mode: Option<ThreadMode>,
    /// The captured value expression of a constant registration.
    pub constant_value: Option<Expr>,
    /// Where the call appeared, as a value.
    pub location: SourceLocation,
    /// Span of the call, for diagnostics only.
    pub span: Span,
}

/// Everything the scanner learned about one module.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Matched calls, in source order.
    pub calls: Vec<RegistrationCall>,
    /// Names of top-level functions that contained at least one matching
    /// call; the expander removes these from the emitted module.
    pub registration_fns: Vec<syn::Ident>,
    /// Shape problems found while scanning.
    pub diagnostics: Vec<Diagnostic>,
}

/// Scans the top-level functions of a module for registration calls.
pub fn scan_module(module: &ItemMod) -> ScanOutput {
    let mut output = ScanOutput::default();
    let Some((_, items)) = &module.content else {
        return output;
    };

    for item in items {
        let syn::Item::Fn(function) = item else {
            continue;
        };
        let mut matched = false;
        let mut visitor = CallVisitor {
            output: &mut output,
            matched: &mut matched,
        };
        visitor.visit_block(&function.block);
        // A function is consumed even when its only matching call was
        // dropped with a diagnostic; leaving it behind would surface the
        // unresolvable registration names as extra rustc errors.
        if matched {
            output.registration_fns.push(function.sig.ident.clone());
        }
    }

    output
}

struct CallVisitor<'a> {
    output: &'a mut ScanOutput,
    matched: &'a mut bool,
}

impl<'ast> Visit<'ast> for CallVisitor<'_> {
    fn visit_expr_call(&mut self, call: &'ast ExprCall) {
        if let Some((kind, type_arguments)) = match_registration_callee(call) {
            *self.matched = true;
            self.output.record_call(call, kind, type_arguments);
        }
        syn::visit::visit_expr_call(self, call);
    }
}

/// Matches a callee against the three registration names and their
/// type-argument arities. A name without the matching arity is not a
/// registration call at all.
fn match_registration_callee(call: &ExprCall) -> Option<(CallKind, Vec<Type>)> {
    let Expr::Path(path) = call.func.as_ref() else {
        return None;
    };
    let segment = path.path.segments.last()?;
    let kind = match segment.ident.to_string().as_str() {
        REGISTER => CallKind::Transient,
        REGISTER_DEFERRED_SINGLETON => CallKind::DeferredSingleton,
        REGISTER_CONSTANT => CallKind::Constant,
        _ => return None,
    };

    let syn::PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    let type_arguments: Vec<Type> = arguments
        .args
        .iter()
        .filter_map(|argument| match argument {
            syn::GenericArgument::Type(ty) => Some(ty.clone()),
            _ => None,
        })
        .collect();
    if type_arguments.len() != arguments.args.len() {
        return None;
    }

    let arity_matches = match kind {
        CallKind::Transient => (1..=2).contains(&type_arguments.len()),
        CallKind::DeferredSingleton => type_arguments.len() == 2,
        CallKind::Constant => type_arguments.len() == 1,
    };
    arity_matches.then_some((kind, type_arguments))
}

impl ScanOutput {
    fn record_call(&mut self, call: &ExprCall, kind: CallKind, mut type_arguments: Vec<Type>) {
        let span = call.span();
        let display = canonical_rendering(call.to_token_stream());
        let ordinal = self.calls.len();

        let (interface, concrete, constant_value) = match kind {
            CallKind::Transient => {
                let interface = type_arguments.remove(0);
                let concrete = type_arguments.pop().unwrap_or_else(|| interface.clone());
                (interface, Some(concrete), None)
            }
            CallKind::DeferredSingleton => {
                let interface = type_arguments.remove(0);
                let concrete = type_arguments.remove(0);
                (interface, Some(concrete), None)
            }
            CallKind::Constant => {
                let interface = type_arguments.remove(0);
                let Some(value) = call.args.first() else {
                    self.diagnostics.push(Diagnostic::error(
                        DiagnosticCode::MalformedRegistration,
                        Some(span),
                        format!("`{REGISTER_CONSTANT}` requires a value argument"),
                    ));
                    return;
                };
                (interface, None, Some(value.clone()))
            }
        };

        let value_arguments: Vec<&Expr> = match kind {
            CallKind::Constant => call.args.iter().skip(1).collect(),
            _ => call.args.iter().collect(),
        };
        let Some((contract, thread_mode)) = self.classify_arguments(kind, &value_arguments, span)
        else {
            return;
        };

        self.calls.push(RegistrationCall {
            kind,
            interface,
            concrete,
            contract,
            thread_mode,
            constant_value,
            location: SourceLocation { ordinal, display },
            span,
        });
    }

    /// Sorts a call's value arguments into (contract, thread mode), or
    /// reports why they do not fit and drops the call.
    fn classify_arguments(
        &mut self,
        kind: CallKind,
        arguments: &[&Expr],
        span: Span,
    ) -> Option<(Option<String>, Option<ThreadMode>)> {
        let allows_mode = kind == CallKind::DeferredSingleton;
        let max = if allows_mode { 2 } else { 1 };
        if arguments.len() > max {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::MalformedRegistration,
                Some(span),
                format!("registration takes at most {max} argument(s), found {}", arguments.len()),
            ));
            return None;
        }

        let mut contract = None;
        let mut thread_mode = None;
        for argument in arguments {
            if let Some(literal) = string_literal(argument) {
                if contract.is_some() {
                    self.diagnostics.push(Diagnostic::error(
                        DiagnosticCode::MalformedRegistration,
                        Some(span),
                        "registration has more than one contract argument",
                    ));
                    return None;
                }
                contract = Some(literal);
                continue;
            }

            if allows_mode && contract.is_none() && thread_mode.is_none() {
                match parse_thread_mode(argument) {
                    Some(mode) => thread_mode = Some(mode),
                    None => {
                        self.diagnostics.push(Diagnostic::error(
                            DiagnosticCode::UnrecognizedThreadMode,
                            Some(argument.span()),
                            format!(
                                "`{}` is not a `ThreadMode` variant",
                                canonical_rendering(argument.to_token_stream())
                            ),
                        ));
                        return None;
                    }
                }
                continue;
            }

            // The contract slot accepts nothing but a fixed string literal.
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::NonLiteralContract,
                Some(argument.span()),
                "contract must be a compile-time string literal",
            ));
            return None;
        }

        Some((contract, thread_mode))
    }
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(literal) => match &literal.lit {
            syn::Lit::Str(value) => Some(value.value()),
            _ => None,
        },
        _ => None,
    }
}

/// Parses `ThreadMode::X` (optionally `wirework::ThreadMode::X`) paths.
fn parse_thread_mode(expr: &Expr) -> Option<ThreadMode> {
    let Expr::Path(path) = expr else {
        return None;
    };
    let segments = &path.path.segments;
    if segments.len() < 2 {
        return None;
    }
    let qualifier = &segments[segments.len() - 2].ident;
    let variant = &segments[segments.len() - 1].ident;
    if qualifier != "ThreadMode" {
        return None;
    }
    match variant.to_string().as_str() {
        "ExecutionAndPublication" => Some(ThreadMode::ExecutionAndPublication),
        "PublicationOnly" => Some(ThreadMode::PublicationOnly),
        "Unsynchronized" => Some(ThreadMode::Unsynchronized),
        _ => None,
    }
}
