// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Value-typed descriptor records shared by every pipeline stage.
//!
//! Records deliberately contain no `syn` nodes, spans, or other non-value
//! identities: two scans of byte-identical input must produce structurally
//! equal record sets, so callers can memoize the whole pipeline on input
//! equality.

use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;

/// Canonical, value-equatable identity for a type.
///
/// Two descriptors are equal iff their canonical names match; this is the
/// sole identity used for table keys and graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor {
    name: String,
}

impl TypeDescriptor {
    /// Creates a descriptor from the canonical rendering of a type.
    pub fn from_type(ty: &syn::Type) -> Self {
        Self {
            name: canonical_rendering(ty.to_token_stream()),
        }
    }

    /// Creates a descriptor from an already-canonical name.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The fully-qualified canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parses the descriptor back into a `syn::Type` for emission.
    pub fn to_type(&self) -> syn::Result<syn::Type> {
        syn::parse_str(&self.name)
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Renders a token stream with minimal whitespace so that the same tokens
/// always produce the same string, independent of how they were written.
pub fn canonical_rendering(tokens: TokenStream) -> String {
    let mut out = String::new();
    push_tokens(&mut out, tokens);
    out
}

fn push_tokens(out: &mut String, tokens: TokenStream) {
    for tt in tokens {
        match tt {
            TokenTree::Ident(ident) => {
                push_word(out, &ident.to_string());
            }
            TokenTree::Literal(lit) => {
                push_word(out, &lit.to_string());
            }
            TokenTree::Punct(punct) => out.push(punct.as_char()),
            TokenTree::Group(group) => {
                let (open, close) = match group.delimiter() {
                    proc_macro2::Delimiter::Parenthesis => ("(", ")"),
                    proc_macro2::Delimiter::Bracket => ("[", "]"),
                    proc_macro2::Delimiter::Brace => ("{", "}"),
                    proc_macro2::Delimiter::None => ("", ""),
                };
                out.push_str(open);
                push_tokens(out, group.stream());
                out.push_str(close);
            }
        }
    }
}

fn push_word(out: &mut String, word: &str) {
    let needs_space = out
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_');
    if needs_space {
        out.push(' ');
    }
    out.push_str(word);
}

/// Where a record came from, as a value: the declaration's ordinal position
/// in the compilation unit plus its rendered text. Spans never enter the
/// records; they travel on diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Zero-based index of the declaration in scan order.
    pub ordinal: usize,
    /// Canonical rendering of the originating declaration.
    pub display: String,
}

/// The wrapper shape of a dependency slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyWrapper {
    /// An eager dependency: required before the constructor returns.
    None,
    /// A `Deferred<...>` slot: materialized on first access, then cached.
    Deferred,
    /// A `Vec<...>` slot: zero or more providers resolved as a sequence.
    Multi,
}

/// Thread-safety mode for a deferred singleton cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    /// The initializer runs at most once at a time; losers block.
    ExecutionAndPublication,
    /// Racing initializers are allowed; the first publication wins.
    PublicationOnly,
    /// No execution exclusion. Publication remains atomic.
    Unsynchronized,
}

impl ThreadMode {
    /// The variant name as written in source, for diagnostics and emission.
    pub fn variant_name(self) -> &'static str {
        match self {
            Self::ExecutionAndPublication => "ExecutionAndPublication",
            Self::PublicationOnly => "PublicationOnly",
            Self::Unsynchronized => "Unsynchronized",
        }
    }
}

/// One constructor parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorParameterDescriptor {
    /// The parameter name as declared.
    pub parameter_name: String,
    /// The parameter type exactly as declared (diagnostics).
    pub declared: TypeDescriptor,
    /// The wrapper shape of the slot.
    pub wrapper: DependencyWrapper,
    /// The service identity the slot depends on (wrappers stripped).
    pub service: TypeDescriptor,
    /// The type to pass to the resolver lookup call.
    pub lookup: TypeDescriptor,
    /// Element service type; set only when `wrapper` is [`DependencyWrapper::Multi`].
    pub item: Option<TypeDescriptor>,
    /// Declared type inside a `Deferred<...>` slot; set only when `wrapper`
    /// is [`DependencyWrapper::Deferred`].
    pub inner: Option<TypeDescriptor>,
}

/// One `#[fill]` field, populated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInjectionDescriptor {
    /// The field name as declared.
    pub field_name: String,
    /// The field type exactly as declared.
    pub declared: TypeDescriptor,
    /// The wrapper shape of the slot.
    pub wrapper: DependencyWrapper,
    /// The service identity the slot depends on.
    pub service: TypeDescriptor,
    /// The type to pass to the resolver lookup call.
    pub lookup: TypeDescriptor,
    /// Element service type for `Vec<...>` fields.
    pub item: Option<TypeDescriptor>,
    /// Declared type inside a `Deferred<...>` field.
    pub inner: Option<TypeDescriptor>,
    /// Where the field was declared.
    pub location: SourceLocation,
}

/// How the concrete type is brought into existence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstructionStyle {
    /// Call the named associated function.
    Function(String),
    /// The type is a unit struct; construct it with a literal.
    UnitLiteral,
}

/// The three registration shapes, as one tagged union.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    /// A new instance on every resolution.
    Transient,
    /// One lazily-built instance shared across all resolutions.
    DeferredSingleton {
        /// The cell's thread-safety mode.
        mode: ThreadMode,
    },
    /// A pre-built value registered as-is.
    Constant {
        /// Canonical rendering of the captured value expression.
        value: String,
    },
}

/// A fully resolved registration, ready for aggregation and emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationRecord {
    /// Which registration shape produced this record.
    pub kind: RegistrationKind,
    /// The binding identity (the interface type, or the concrete type for
    /// self-registrations, or the constant's type).
    pub interface: TypeDescriptor,
    /// Whether the interface is a trait object (controls the `Arc` coercion
    /// on emission).
    pub interface_is_trait_object: bool,
    /// The concrete type to construct; absent for constants.
    pub concrete: Option<TypeDescriptor>,
    /// How to construct the concrete type; absent for constants.
    pub construction: Option<ConstructionStyle>,
    /// Constructor parameters, in declaration order.
    pub constructor_parameters: Vec<ConstructorParameterDescriptor>,
    /// `#[fill]` fields that passed validation.
    pub field_injections: Vec<FieldInjectionDescriptor>,
    /// The contract key, always a fixed literal when present.
    pub contract: Option<String>,
    /// Where the registration call appeared.
    pub location: SourceLocation,
}

impl RegistrationRecord {
    /// The key this record binds under.
    pub fn binding_key(&self) -> (TypeDescriptor, Option<String>) {
        (self.interface.clone(), self.contract.clone())
    }
}
