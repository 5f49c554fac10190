// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wrapper-shape classification for dependency slots.
//!
//! Recognition is by exact generic shape (path tail plus argument arity)
//! against the known wrapper identities, never by name-substring heuristics.
//! Classification is a pure function of the type's rendering, so callers may
//! memoize it on the resulting descriptor.

use syn::Type;

use crate::descriptor::{DependencyWrapper, TypeDescriptor};

/// The classification of one dependency slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassifiedDependency {
    /// The recognized wrapper shape.
    pub wrapper: DependencyWrapper,
    /// The type exactly as declared.
    pub declared: TypeDescriptor,
    /// The service identity the slot depends on (wrappers and `Arc` peeled).
    pub service: TypeDescriptor,
    /// The type to pass to the resolver lookup call: the declared type for
    /// one-value slots, the element type for sequence slots.
    pub lookup: TypeDescriptor,
    /// The element service identity; set only for sequence slots.
    pub item: Option<TypeDescriptor>,
    /// The declared type inside a `Deferred<...>` slot; set only for
    /// deferred slots. The emitter resolves this lazily when the provider
    /// is not a deferred singleton.
    pub inner: Option<TypeDescriptor>,
}

/// Classifies a dependency slot type into one of the recognized shapes.
pub fn classify(ty: &Type) -> ClassifiedDependency {
    let declared = TypeDescriptor::from_type(ty);

    if let Some(inner) = single_argument_of(ty, "Deferred") {
        return ClassifiedDependency {
            wrapper: DependencyWrapper::Deferred,
            service: TypeDescriptor::from_type(peel_arc(inner)),
            lookup: declared.clone(),
            declared,
            item: None,
            inner: Some(TypeDescriptor::from_type(inner)),
        };
    }

    if let Some(element) = single_argument_of(ty, "Vec") {
        let item = TypeDescriptor::from_type(peel_arc(element));
        return ClassifiedDependency {
            wrapper: DependencyWrapper::Multi,
            service: item.clone(),
            lookup: TypeDescriptor::from_type(element),
            declared,
            item: Some(item),
            inner: None,
        };
    }

    if let Some(inner) = single_argument_of(ty, "Arc") {
        return ClassifiedDependency {
            wrapper: DependencyWrapper::None,
            service: TypeDescriptor::from_type(inner),
            lookup: declared.clone(),
            declared,
            item: None,
            inner: None,
        };
    }

    ClassifiedDependency {
        wrapper: DependencyWrapper::None,
        service: declared.clone(),
        lookup: declared.clone(),
        declared,
        item: None,
        inner: None,
    }
}

/// Returns the single type argument when `ty` is a path whose last segment
/// is `ident` with exactly one generic type argument.
fn single_argument_of<'a>(ty: &'a Type, ident: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != ident {
        return None;
    }
    let syn::PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    let mut types = arguments.args.iter().filter_map(|argument| match argument {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    });
    let first = types.next()?;
    if types.next().is_some() {
        return None;
    }
    Some(first)
}

/// Peels one `Arc` layer off a slot type to reach the service identity.
fn peel_arc(ty: &Type) -> &Type {
    single_argument_of(ty, "Arc").unwrap_or(ty)
}
