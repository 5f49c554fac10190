// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Composition of the pipeline stages over one module snapshot.

use std::collections::HashSet;

use syn::ItemMod;

use crate::ctor::{resolve_construction, ModuleIndex};
use crate::descriptor::{RegistrationKind, RegistrationRecord, ThreadMode, TypeDescriptor};
use crate::diagnostic::Diagnostic;
use crate::graph::detect_cycles;
use crate::scan::{scan_module, CallKind, RegistrationCall};
use crate::table::RegistrationTable;

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The aggregated table, duplicates included, in declaration order.
    pub table: RegistrationTable,
    /// Indices of records withheld by cycle detection.
    pub invalid: HashSet<usize>,
    /// Every finding from every stage, in stage order.
    pub diagnostics: Vec<Diagnostic>,
    /// Names of the registration functions consumed from the module.
    pub registration_fns: Vec<syn::Ident>,
}

/// Runs scan, resolution, aggregation, and cycle detection over a module.
///
/// Each stage is a total function of the module snapshot; a failed unit is
/// dropped with a diagnostic and the run continues (partial success).
pub fn run_pipeline(module: &ItemMod) -> PipelineOutput {
    let scan = scan_module(module);
    let index = ModuleIndex::build(module);

    let mut diagnostics = scan.diagnostics;
    let mut table = RegistrationTable::new();
    for call in &scan.calls {
        let Some(record) = resolve_call(&index, call, &mut diagnostics) else {
            continue;
        };
        if let Some(duplicate) = table.insert(record) {
            diagnostics.push(duplicate);
        }
    }

    let analysis = detect_cycles(&table);
    diagnostics.extend(analysis.diagnostics);

    PipelineOutput {
        table,
        invalid: analysis.invalid,
        diagnostics,
        registration_fns: scan.registration_fns,
    }
}

/// Turns one scanned call into a resolved record, or reports why not.
fn resolve_call(
    index: &ModuleIndex<'_>,
    call: &RegistrationCall,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<RegistrationRecord> {
    let interface = TypeDescriptor::from_type(&call.interface);
    let interface_is_trait_object = matches!(call.interface, syn::Type::TraitObject(_));

    let (kind, construction) = match call.kind {
        CallKind::Constant => {
            let value = call.constant_value.as_ref()?;
            let rendered = crate::descriptor::canonical_rendering(quote::ToTokens::to_token_stream(value));
            (RegistrationKind::Constant { value: rendered }, None)
        }
        CallKind::Transient => (RegistrationKind::Transient, Some(())),
        CallKind::DeferredSingleton => (
            RegistrationKind::DeferredSingleton {
                // The strictest mode is the default.
                mode: call.thread_mode.unwrap_or(ThreadMode::ExecutionAndPublication),
            },
            Some(()),
        ),
    };

    let (concrete, style, parameters, fields) = match construction {
        None => (None, None, Vec::new(), Vec::new()),
        Some(()) => {
            let concrete_ty = call.concrete.as_ref()?;
            let resolved = resolve_construction(index, concrete_ty, call.span, diagnostics)?;
            (
                Some(TypeDescriptor::from_type(concrete_ty)),
                Some(resolved.style),
                resolved.parameters,
                resolved.fields,
            )
        }
    };

    Some(RegistrationRecord {
        kind,
        interface,
        interface_is_trait_object,
        concrete,
        construction: style,
        constructor_parameters: parameters,
        field_injections: fields,
        contract: call.contract.clone(),
        location: call.location.clone(),
    })
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;
    use crate::descriptor::DependencyWrapper;
    use crate::diagnostic::{DiagnosticCode, Severity};

    #[test]
    fn a_complete_module_resolves_without_findings() {
        let module: ItemMod = parse_quote! {
            mod app {
                pub trait Sink: Send + Sync {}
                pub trait Greeter: Send + Sync {}

                pub struct ConsoleSink;
                impl ConsoleSink {
                    pub fn new() -> Self { Self }
                }

                pub struct ConsoleGreeter {
                    sink: Arc<dyn Sink>,
                }
                impl ConsoleGreeter {
                    pub fn new(sink: Arc<dyn Sink>) -> Self { Self { sink } }
                }

                fn services() {
                    register::<dyn Sink, ConsoleSink>();
                    register::<dyn Greeter, ConsoleGreeter>();
                }
            }
        };
        let output = run_pipeline(&module);
        assert!(output.diagnostics.is_empty());
        assert!(output.invalid.is_empty());
        assert_eq!(output.table.len(), 2);

        let greeter = &output.table.records()[1];
        assert_eq!(greeter.constructor_parameters.len(), 1);
        assert_eq!(
            greeter.constructor_parameters[0].wrapper,
            DependencyWrapper::None
        );
        assert_eq!(greeter.constructor_parameters[0].service.name(), "dyn Sink");
    }

    #[test]
    fn a_failed_type_does_not_block_the_others() {
        let module: ItemMod = parse_quote! {
            mod app {
                pub struct Good;
                impl Good {
                    pub fn new() -> Self { Self }
                }
                pub struct Bad {
                    field: u32,
                }

                fn services() {
                    register::<Bad>();
                    register::<Good>();
                }
            }
        };
        let output = run_pipeline(&module);
        assert_eq!(output.table.len(), 1);
        assert_eq!(output.table.records()[0].interface.name(), "Good");
        assert_eq!(
            output.diagnostics[0].code,
            DiagnosticCode::AmbiguousConstructor
        );
    }

    #[test]
    fn duplicates_are_advisory_and_kept() {
        let module: ItemMod = parse_quote! {
            mod app {
                pub struct A;
                impl A { pub fn new() -> Self { Self } }
                pub struct B;
                impl B { pub fn new() -> Self { Self } }

                fn services() {
                    register::<dyn Service, A>();
                    register::<dyn Service, B>();
                }
            }
        };
        let output = run_pipeline(&module);
        assert_eq!(output.table.len(), 2);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(
            output.diagnostics[0].code,
            DiagnosticCode::DuplicateRegistration
        );
        assert_eq!(output.diagnostics[0].severity, Severity::Warning);
        assert!(output.invalid.is_empty());
    }

    #[test]
    fn eager_cycles_withhold_the_members_only() {
        let module: ItemMod = parse_quote! {
            mod app {
                pub struct PImpl;
                impl PImpl {
                    pub fn new(q: Arc<dyn Q>) -> Self { Self }
                }
                pub struct QImpl;
                impl QImpl {
                    pub fn new(p: Arc<dyn P>) -> Self { Self }
                }
                pub struct Lone;
                impl Lone {
                    pub fn new() -> Self { Self }
                }

                fn services() {
                    register::<dyn P, PImpl>();
                    register::<dyn Q, QImpl>();
                    register::<dyn Lonely, Lone>();
                }
            }
        };
        let output = run_pipeline(&module);
        assert_eq!(output.invalid, HashSet::from([0, 1]));
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::CircularDependency));
    }

    #[test]
    fn a_deferred_slot_breaks_the_cycle() {
        let module: ItemMod = parse_quote! {
            mod app {
                pub struct PImpl;
                impl PImpl {
                    pub fn new(q: Arc<dyn Q>) -> Self { Self }
                }
                pub struct QImpl;
                impl QImpl {
                    pub fn new(p: Deferred<Arc<dyn P>>) -> Self { Self }
                }

                fn services() {
                    register::<dyn P, PImpl>();
                    register::<dyn Q, QImpl>();
                }
            }
        };
        let output = run_pipeline(&module);
        assert!(output.invalid.is_empty());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn deferred_singleton_defaults_to_the_strictest_mode() {
        let module: ItemMod = parse_quote! {
            mod app {
                pub struct DiskStore;
                impl DiskStore {
                    pub fn new() -> Self { Self }
                }

                fn services() {
                    register_deferred_singleton::<dyn Store, DiskStore>();
                }
            }
        };
        let output = run_pipeline(&module);
        assert_eq!(
            output.table.records()[0].kind,
            RegistrationKind::DeferredSingleton {
                mode: ThreadMode::ExecutionAndPublication
            }
        );
    }

    #[test]
    fn identical_snapshots_produce_equal_records() {
        let source = || -> ItemMod {
            parse_quote! {
                mod app {
                    pub struct A;
                    impl A { pub fn new() -> Self { Self } }

                    fn services() {
                        register::<dyn Service, A>("primary");
                    }
                }
            }
        };
        let first = run_pipeline(&source());
        let second = run_pipeline(&source());
        assert_eq!(first.table.records(), second.table.records());
    }
}
