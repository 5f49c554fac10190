// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Diagnostic records produced by the pipeline and by the standalone
//! validator.
//!
//! Diagnostics are outputs, never cached state, so unlike the descriptor
//! records they may carry spans for rendering.

use proc_macro2::Span;

/// Stable diagnostic codes, shared with interactive tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A type has several constructors and none (or none unambiguously)
    /// carries the selection marker.
    AmbiguousConstructor,
    /// More than one constructor carries the selection marker.
    MultipleMarkedConstructors,
    /// The selected constructor is not visible outside the module.
    InaccessibleMarkedConstructor,
    /// A `#[fill]` field is not visible outside the module.
    PropertyMissingSetter,
    /// A second registration appeared under an already-bound key.
    DuplicateRegistration,
    /// Eagerly-constructed registrations form a cycle.
    CircularDependency,
    /// A contract argument was not a compile-time string literal.
    NonLiteralContract,
    /// A registration names a concrete type not declared in the module.
    UnknownConcreteType,
    /// A thread-mode argument was not a recognized `ThreadMode` path.
    UnrecognizedThreadMode,
    /// A registration call's value arguments do not fit the call shape.
    MalformedRegistration,
}

impl DiagnosticCode {
    /// The stable, kebab-cased code string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AmbiguousConstructor => "ambiguous-constructor",
            Self::MultipleMarkedConstructors => "multiple-marked-constructors",
            Self::InaccessibleMarkedConstructor => "inaccessible-marked-constructor",
            Self::PropertyMissingSetter => "property-missing-setter",
            Self::DuplicateRegistration => "duplicate-registration",
            Self::CircularDependency => "circular-dependency",
            Self::NonLiteralContract => "non-literal-contract",
            Self::UnknownConcreteType => "unknown-concrete-type",
            Self::UnrecognizedThreadMode => "unrecognized-thread-mode",
            Self::MalformedRegistration => "malformed-registration",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a diagnostic blocks the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Reported and turned into a `compile_error!`; emission for the
    /// affected unit is withheld, everything else proceeds.
    Error,
    /// Reported only; never blocks emission.
    Warning,
}

/// One human-facing finding.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The stable code.
    pub code: DiagnosticCode,
    /// Whether this finding blocks the build.
    pub severity: Severity,
    /// The rendered message.
    pub message: String,
    /// Span of the offending source, when one is available.
    pub span: Option<Span>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    /// Renders the diagnostic the way it is surfaced to the build:
    /// `<code>: <message>`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_kebab_cased() {
        assert_eq!(
            DiagnosticCode::AmbiguousConstructor.as_str(),
            "ambiguous-constructor"
        );
        assert_eq!(
            DiagnosticCode::PropertyMissingSetter.as_str(),
            "property-missing-setter"
        );
    }

    #[test]
    fn render_includes_code_prefix() {
        let diagnostic = Diagnostic::warning(
            DiagnosticCode::DuplicateRegistration,
            None,
            "`dyn Greeter` is already registered",
        );
        assert_eq!(
            diagnostic.render(),
            "duplicate-registration: `dyn Greeter` is already registered"
        );
    }
}
