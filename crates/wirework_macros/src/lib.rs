// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Procedural macros to support the [`wirework`](https://docs.rs/wirework) crate. See `wirework` for more information.
//!
//! # Macros
//!
//! ## `#[module]`
//!
//! Compiles the registration declarations of a module into a wiring
//! function.
//!
//! ```rust,ignore
//! #[wirework::module]
//! mod app {
//!     pub trait Greeter: Send + Sync {
//!         fn greet(&self) -> String;
//!     }
//!
//!     pub struct ConsoleGreeter;
//!     impl ConsoleGreeter {
//!         pub fn new() -> Self { Self }
//!     }
//!     impl Greeter for ConsoleGreeter {
//!         fn greet(&self) -> String { "hello".into() }
//!     }
//!
//!     fn services() {
//!         register::<dyn Greeter, ConsoleGreeter>();
//!     }
//! }
//! ```
//!
//! Generates `app::wire(&resolver)`, which registers every declared binding.

use proc_macro::TokenStream;

/// Compile the registration declarations of a module into a wiring function.
///
/// The macro scans the module's functions for the three registration calls,
/// resolves each concrete type's constructor and `#[fill]` fields, validates
/// the construction graph, and appends `pub fn wire(resolver: &Resolver)` to
/// the module. Functions containing registration calls are consumed; the
/// `#[inject]` and `#[fill]` markers are stripped from the emitted module.
///
/// # Registration calls
///
/// - `register::<dyn I, C>(contract?)` / `register::<C>(contract?)` - a new
///   instance on every resolution.
/// - `register_deferred_singleton::<dyn I, C>(thread_mode?, contract?)` -
///   one lazily-built instance shared across all resolutions.
/// - `register_constant::<T>(value, contract?)` - a pre-built value.
///
/// Contracts must be compile-time string literals.
///
/// # Diagnostics
///
/// Structural problems (ambiguous constructors, inaccessible members,
/// cycles, non-literal contracts) surface as `compile_error!` with stable
/// kebab-cased codes; each one withholds only the affected registrations,
/// and wiring is still generated for everything that validated.
#[proc_macro_attribute]
#[cfg_attr(test, mutants::skip)]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    match wirework_macros_impl::expand_module(attr.into(), item.into()) {
        Ok(expansion) => expansion.into_token_stream().into(),
        Err(error) => error.to_compile_error().into(),
    }
}
