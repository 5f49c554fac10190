// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Implementation of the `wirework` registration compiler. See the
//! [`wirework`](https://docs.rs/wirework) crate for the user-facing story.
//!
//! The pipeline has three stages, each a total function over an immutable
//! snapshot of the annotated module:
//!
//! 1. **Scan** ([`scan`]): find the registration call sites.
//! 2. **Resolve & validate** ([`ctor`], [`classify`], [`table`], [`graph`]):
//!    select constructors and injected fields, classify dependency shapes,
//!    aggregate by binding key, and reject eager construction cycles.
//! 3. **Emit** ([`emit`]): serialize the validated table into the wiring
//!    function, deterministically.
//!
//! [`validate`] runs stages 1-2 without emission for interactive tooling;
//! it shares the selection algorithm with the generator by construction.

pub mod classify;
pub mod ctor;
pub mod descriptor;
pub mod diagnostic;
pub mod emit;
pub mod expand;
pub mod graph;
pub mod pipeline;
pub mod scan;
pub mod table;
pub mod validate;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use expand::{expand_module, Expansion};
pub use validate::{validate_module, validate_tokens};
