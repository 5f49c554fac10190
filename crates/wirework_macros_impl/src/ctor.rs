// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Constructor and field-injection resolution.
//!
//! This is the selection algorithm shared between the generator and the
//! interactive validator: for a concrete type declared in the module, decide
//! which associated function constructs it and which `#[fill]` fields are
//! populated after construction. The rules are deterministic and
//! order-independent over the constructor set.

use std::collections::HashMap;

use proc_macro2::Span;
use quote::ToTokens;
use syn::{ItemMod, ItemStruct, Type, Visibility};

use crate::classify::classify;
use crate::descriptor::{
    canonical_rendering, ConstructionStyle, ConstructorParameterDescriptor,
    FieldInjectionDescriptor, SourceLocation,
};
use crate::diagnostic::{Diagnostic, DiagnosticCode};

/// Marker selecting a constructor when a type has more than one.
pub const CONSTRUCTOR_MARKER: &str = "inject";

/// Marker identifying fields populated after construction.
pub const FIELD_MARKER: &str = "fill";

/// One constructor candidate: an inherent associated function without a
/// `self` receiver whose return type is `Self` or the type's own name.
#[derive(Debug)]
struct ConstructorCandidate<'a> {
    function: &'a syn::ImplItemFn,
    marked: bool,
}

/// Index of the type declarations in one module, built once per pipeline run.
#[derive(Debug, Default)]
pub struct ModuleIndex<'a> {
    structs: HashMap<String, &'a ItemStruct>,
    constructors: HashMap<String, Vec<ConstructorCandidate<'a>>>,
}

impl<'a> ModuleIndex<'a> {
    /// Indexes the structs and inherent constructors of a module.
    pub fn build(module: &'a ItemMod) -> Self {
        let mut index = Self::default();
        let Some((_, items)) = &module.content else {
            return index;
        };

        for item in items {
            match item {
                syn::Item::Struct(declaration) => {
                    index
                        .structs
                        .insert(declaration.ident.to_string(), declaration);
                }
                syn::Item::Impl(block) if block.trait_.is_none() => {
                    let Some(type_name) = path_ident(&block.self_ty) else {
                        continue;
                    };
                    for impl_item in &block.items {
                        let syn::ImplItem::Fn(function) = impl_item else {
                            continue;
                        };
                        if is_constructor(function, &type_name) {
                            index.constructors.entry(type_name.clone()).or_default().push(
                                ConstructorCandidate {
                                    function,
                                    marked: has_marker(&function.attrs, CONSTRUCTOR_MARKER),
                                },
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        index
    }

    /// Whether the module declares a struct with this name.
    pub fn declares(&self, type_name: &str) -> bool {
        self.structs.contains_key(type_name)
    }
}

/// The outcome of constructor/field resolution for one concrete type.
#[derive(Debug)]
pub struct ResolvedConstruction {
    /// How to bring the type into existence.
    pub style: ConstructionStyle,
    /// Constructor parameters, in declaration order.
    pub parameters: Vec<ConstructorParameterDescriptor>,
    /// `#[fill]` fields that passed validation.
    pub fields: Vec<FieldInjectionDescriptor>,
}

/// Resolves how to construct `concrete`, reporting structural problems.
///
/// Structural failures (no usable constructor, ambiguity, inaccessibility)
/// are fatal for this type only: `None` is returned and the caller omits
/// the registration. Field-level failures drop the single field and
/// resolution continues.
pub fn resolve_construction(
    index: &ModuleIndex<'_>,
    concrete: &Type,
    call_span: Span,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ResolvedConstruction> {
    let type_name = match path_ident(concrete) {
        Some(name) => name,
        None => {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::UnknownConcreteType,
                Some(call_span),
                format!(
                    "`{}` cannot be constructed; the concrete type must be a struct declared in this module",
                    canonical_rendering(concrete.to_token_stream())
                ),
            ));
            return None;
        }
    };

    let Some(declaration) = index.structs.get(&type_name) else {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::UnknownConcreteType,
            Some(call_span),
            format!("`{type_name}` is not declared in this module"),
        ));
        return None;
    };

    let style = select_constructor(index, declaration, &type_name, call_span, diagnostics)?;
    let parameters = match &style {
        ConstructionStyle::Function(name) => constructor_parameters(index, &type_name, name),
        ConstructionStyle::UnitLiteral => Vec::new(),
    };
    let fields = injected_fields(declaration, &type_name, diagnostics);

    Some(ResolvedConstruction {
        style,
        parameters,
        fields,
    })
}

/// The selection algorithm proper. Deterministic and independent of the
/// order constructors were declared in.
fn select_constructor(
    index: &ModuleIndex<'_>,
    declaration: &ItemStruct,
    type_name: &str,
    call_span: Span,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<ConstructionStyle> {
    let empty = Vec::new();
    let candidates = index.constructors.get(type_name).unwrap_or(&empty);

    let selected = match candidates.len() {
        0 => {
            if matches!(declaration.fields, syn::Fields::Unit) {
                return Some(ConstructionStyle::UnitLiteral);
            }
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::AmbiguousConstructor,
                Some(call_span),
                format!("`{type_name}` has no constructor returning `Self`"),
            ));
            return None;
        }
        1 => &candidates[0],
        _ => {
            let marked: Vec<&ConstructorCandidate<'_>> =
                candidates.iter().filter(|candidate| candidate.marked).collect();
            match marked.as_slice() {
                [] => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::AmbiguousConstructor,
                        Some(call_span),
                        format!(
                            "`{type_name}` has {} constructors; mark one with `#[{CONSTRUCTOR_MARKER}]`",
                            candidates.len()
                        ),
                    ));
                    return None;
                }
                [single] => *single,
                _ => {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::MultipleMarkedConstructors,
                        Some(call_span),
                        format!(
                            "`{type_name}` has more than one constructor marked `#[{CONSTRUCTOR_MARKER}]`"
                        ),
                    ));
                    return None;
                }
            }
        }
    };

    if !is_unit_visible(&selected.function.vis) {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::InaccessibleMarkedConstructor,
            Some(selected.function.sig.ident.span()),
            format!(
                "constructor `{type_name}::{}` must be at least `pub(crate)`",
                selected.function.sig.ident
            ),
        ));
        return None;
    }

    Some(ConstructionStyle::Function(
        selected.function.sig.ident.to_string(),
    ))
}

fn constructor_parameters(
    index: &ModuleIndex<'_>,
    type_name: &str,
    constructor_name: &str,
) -> Vec<ConstructorParameterDescriptor> {
    let Some(candidates) = index.constructors.get(type_name) else {
        return Vec::new();
    };
    let Some(candidate) = candidates
        .iter()
        .find(|candidate| candidate.function.sig.ident == constructor_name)
    else {
        return Vec::new();
    };

    candidate
        .function
        .sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            syn::FnArg::Typed(typed) => Some(typed),
            syn::FnArg::Receiver(_) => None,
        })
        .map(|typed| {
            let classified = classify(&typed.ty);
            ConstructorParameterDescriptor {
                parameter_name: parameter_name(&typed.pat),
                declared: classified.declared,
                wrapper: classified.wrapper,
                service: classified.service,
                lookup: classified.lookup,
                item: classified.item,
                inner: classified.inner,
            }
        })
        .collect()
}

fn injected_fields(
    declaration: &ItemStruct,
    type_name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<FieldInjectionDescriptor> {
    let syn::Fields::Named(fields) = &declaration.fields else {
        return Vec::new();
    };

    let mut injected = Vec::new();
    for (ordinal, field) in fields.named.iter().enumerate() {
        if !has_marker(&field.attrs, FIELD_MARKER) {
            continue;
        }
        let Some(name) = &field.ident else {
            continue;
        };

        if !is_unit_visible(&field.vis) {
            // Single-field failure isolation: the field is dropped, the
            // registration proceeds.
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::PropertyMissingSetter,
                Some(name.span()),
                format!("field `{type_name}.{name}` must be at least `pub(crate)` to be filled"),
            ));
            continue;
        }

        let classified = classify(&field.ty);
        injected.push(FieldInjectionDescriptor {
            field_name: name.to_string(),
            declared: classified.declared,
            wrapper: classified.wrapper,
            service: classified.service,
            lookup: classified.lookup,
            item: classified.item,
            inner: classified.inner,
            location: SourceLocation {
                ordinal,
                display: format!("{type_name}.{name}"),
            },
        });
    }
    injected
}

fn is_constructor(function: &syn::ImplItemFn, type_name: &str) -> bool {
    if function.sig.receiver().is_some() {
        return false;
    }
    let syn::ReturnType::Type(_, return_type) = &function.sig.output else {
        return false;
    };
    match path_ident(return_type) {
        Some(name) => name == "Self" || name == type_name,
        None => false,
    }
}

/// "Internal-equivalent" accessibility: the item must be visible beyond the
/// module body so tooling outside the module can rely on it. `pub`,
/// `pub(crate)`, and `pub(super)` qualify; inherited, `pub(self)`, and
/// `pub(in ...)` do not.
fn is_unit_visible(vis: &Visibility) -> bool {
    match vis {
        Visibility::Public(_) => true,
        Visibility::Restricted(restricted) => {
            restricted.in_token.is_none()
                && (restricted.path.is_ident("crate") || restricted.path.is_ident("super"))
        }
        Visibility::Inherited => false,
    }
}

fn has_marker(attrs: &[syn::Attribute], marker: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(marker))
}

fn parameter_name(pat: &syn::Pat) -> String {
    match pat {
        syn::Pat::Ident(ident) => ident.ident.to_string(),
        other => canonical_rendering(other.to_token_stream()),
    }
}

/// The trailing identifier of a plain path type, when it has no arguments.
fn path_ident(ty: &Type) -> Option<String> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    matches!(segment.arguments, syn::PathArguments::None)
        .then(|| segment.ident.to_string())
}
