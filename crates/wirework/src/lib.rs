// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compile-time dependency wiring for Rust.
//!
//! # Summary
//!
//! Wirework turns declarative registration statements into ordinary wiring
//! code at compile time. `#[wirework::module]` scans a module for
//! registration calls, resolves each concrete type's constructor and
//! injected fields, validates that the construction graph is unambiguous
//! and acyclic, and appends a deterministic `wire` function that registers
//! everything with a [`Resolver`]. No reflection runs at resolution time;
//! the resolver only executes the factories the macro wrote.
//!
//! # Capabilities
//!
//! - **Three registration shapes** - transients, deferred singletons, and
//!   constants, each optionally keyed by a contract string
//! - **Constructor selection** - one constructor is picked per type, with
//!   `#[inject]` disambiguating when there are several
//! - **Field injection** - `#[fill]` fields are populated from the
//!   resolver after construction
//! - **Wrapper shapes** - `Deferred<T>` slots break eager construction
//!   order, `Vec<T>` slots collect every provider of a service
//! - **Whole-graph validation** - ambiguities, inaccessible members,
//!   duplicate bindings, and eager cycles surface as diagnostics with
//!   stable codes, without blocking the rest of the module
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use wirework::Resolver;
//!
//! #[wirework::module]
//! mod app {
//!     pub trait Greeter: Send + Sync {
//!         fn greet(&self) -> String;
//!     }
//!
//!     pub struct ConsoleGreeter;
//!
//!     impl ConsoleGreeter {
//!         pub fn new() -> Self {
//!             Self
//!         }
//!     }
//!
//!     impl Greeter for ConsoleGreeter {
//!         fn greet(&self) -> String {
//!             "hello".to_owned()
//!         }
//!     }
//!
//!     fn services() {
//!         register::<dyn Greeter, ConsoleGreeter>();
//!     }
//! }
//!
//! fn main() {
//!     let resolver = Resolver::new();
//!     app::wire(&resolver);
//!
//!     let greeter = resolver.resolve_one::<Arc<dyn app::Greeter>>(None).unwrap();
//!     assert_eq!(greeter.greet(), "hello");
//! }
//! ```
//!
//! # Service requirements
//!
//! Resolved values cross the resolver's type-erased storage, so service
//! traits must be `Send + Sync` and constant types must be `Clone`.

mod deferred;
mod error;
mod resolver;

pub use deferred::{Deferred, ThreadMode};
pub use error::{ResolveError, Result};
pub use resolver::Resolver;

// Re-export the proc macros.
pub use wirework_macros::module;
