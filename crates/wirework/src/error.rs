// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The result for fallible resolver operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// An error that can occur while resolving a binding.
///
/// Factories are fallible, so a missing dependency deep in a construction
/// chain surfaces here rather than panicking.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// No factory is registered for the requested type and contract.
    #[error("no registration for `{type_name}`{}", contract_suffix(.contract))]
    NotRegistered {
        /// The requested type, as reported by `std::any::type_name`.
        type_name: &'static str,
        /// The contract the lookup was keyed by.
        contract: Option<&'static str>,
    },
}

fn contract_suffix(contract: &Option<&'static str>) -> String {
    match contract {
        Some(contract) => format!(" under contract \"{contract}\""),
        None => String::new(),
    }
}
