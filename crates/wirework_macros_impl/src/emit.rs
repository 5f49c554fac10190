// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deterministic emission of the wiring function.
//!
//! Emission consumes the validated table strictly in declaration order and
//! never iterates a hash container, so a given table always produces the
//! same tokens, independent of process or run count. Everything the emitter
//! introduces itself is fully qualified (`::std`, `::wirework`); everything
//! the user wrote is reproduced verbatim and resolves in module scope.

use std::collections::HashSet;

use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

use crate::descriptor::{
    ConstructionStyle, DependencyWrapper, RegistrationKind, RegistrationRecord, ThreadMode,
    TypeDescriptor,
};
use crate::table::RegistrationTable;

/// Name of the generated wiring function.
pub const WIRING_FN: &str = "wire";

/// Services provided by a contract-less deferred singleton; `Deferred`
/// slots on these resolve the registered cell, all others get an inline
/// cell that defers the bare lookup.
type DeferredProviders = HashSet<TypeDescriptor>;

/// Emits the wiring function for every record not withheld by validation.
#[cfg_attr(test, mutants::skip)]
pub fn emit_wiring(
    table: &RegistrationTable,
    invalid: &HashSet<usize>,
) -> syn::Result<TokenStream> {
    let deferred_providers: DeferredProviders = table
        .records()
        .iter()
        .filter(|record| {
            matches!(record.kind, RegistrationKind::DeferredSingleton { .. })
                && record.contract.is_none()
        })
        .map(|record| record.interface.clone())
        .collect();

    let mut statements = Vec::new();
    for (position, record) in table.records().iter().enumerate() {
        if invalid.contains(&position) {
            continue;
        }
        statements.push(emit_record(record, &deferred_providers)?);
    }

    let name = Ident::new(WIRING_FN, Span::call_site());
    let parameter = if statements.is_empty() {
        quote!(_resolver)
    } else {
        quote!(resolver)
    };
    Ok(quote! {
        #[doc = " Registers every binding declared in this module with the resolver."]
        pub fn #name(#parameter: &::wirework::Resolver) {
            #(#statements)*
        }
    })
}

fn emit_record(
    record: &RegistrationRecord,
    deferred_providers: &DeferredProviders,
) -> syn::Result<TokenStream> {
    match &record.kind {
        RegistrationKind::Transient => emit_transient(record, deferred_providers),
        RegistrationKind::DeferredSingleton { mode } => {
            emit_deferred_singleton(record, *mode, deferred_providers)
        }
        RegistrationKind::Constant { value } => emit_constant(record, value),
    }
}

fn emit_transient(
    record: &RegistrationRecord,
    deferred_providers: &DeferredProviders,
) -> syn::Result<TokenStream> {
    let service_ty = service_type(record)?;
    let contract = contract_tokens(record.contract.as_deref());
    let body = factory_body(record, &service_ty, deferred_providers)?;
    let parameter = factory_parameter(record);

    Ok(quote! {
        resolver.register::<#service_ty, _>(#contract, #parameter {
            #body
        });
    })
}

fn emit_deferred_singleton(
    record: &RegistrationRecord,
    mode: ThreadMode,
    deferred_providers: &DeferredProviders,
) -> syn::Result<TokenStream> {
    let service_ty = service_type(record)?;
    let contract = contract_tokens(record.contract.as_deref());
    let body = factory_body(record, &service_ty, deferred_providers)?;
    let mode = mode_tokens(mode);

    let initializer = if uses_resolver(record) {
        quote! {
            {
                let resolver = resolver.clone();
                move || {
                    #body
                }
            }
        }
    } else {
        quote! {
            move || {
                #body
            }
        }
    };

    // The cell registers twice: once under its wrapped form for `Deferred`
    // slots, once unwrapped under the bare service so repeated resolution
    // of either form yields the same instance.
    Ok(quote! {
        {
            let cell = ::wirework::Deferred::new(#mode, #initializer);
            {
                let cell = cell.clone();
                resolver.register::<::wirework::Deferred<#service_ty>, _>(#contract, move |_| ::core::result::Result::Ok(cell.clone()));
            }
            resolver.register::<#service_ty, _>(#contract, move |_| cell.force());
        }
    })
}

fn emit_constant(record: &RegistrationRecord, value: &str) -> syn::Result<TokenStream> {
    let interface = record.interface.to_type()?;
    let contract = contract_tokens(record.contract.as_deref());
    let value: syn::Expr = syn::parse_str(value)?;

    Ok(quote! {
        {
            let value = #value;
            resolver.register::<#interface, _>(#contract, move |_| ::core::result::Result::Ok(value.clone()));
        }
    })
}

/// The registered value type: `Arc<I>` for constructed bindings.
fn service_type(record: &RegistrationRecord) -> syn::Result<TokenStream> {
    let interface = record.interface.to_type()?;
    Ok(quote!(::std::sync::Arc<#interface>))
}

/// The factory body shared by transients and deferred-singleton cells:
/// construct, fill marked fields, coerce into the service type.
fn factory_body(
    record: &RegistrationRecord,
    service_ty: &TokenStream,
    deferred_providers: &DeferredProviders,
) -> syn::Result<TokenStream> {
    let concrete = record
        .concrete
        .as_ref()
        .ok_or_else(|| syn::Error::new(Span::call_site(), "constructed binding without a concrete type"))?
        .to_type()?;

    let construction = match &record.construction {
        Some(ConstructionStyle::Function(name)) => {
            let constructor = Ident::new(name, Span::call_site());
            let arguments = record
                .constructor_parameters
                .iter()
                .map(|parameter| {
                    lookup_call(
                        parameter.wrapper,
                        &parameter.lookup,
                        parameter.inner.as_ref(),
                        &parameter.service,
                        deferred_providers,
                    )
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote!(#concrete::#constructor(#(#arguments),*))
        }
        Some(ConstructionStyle::UnitLiteral) => quote!(#concrete),
        None => {
            return Err(syn::Error::new(
                Span::call_site(),
                "constructed binding without a construction style",
            ));
        }
    };

    let binding = if record.field_injections.is_empty() {
        quote!(let value = #construction;)
    } else {
        quote!(let mut value = #construction;)
    };

    let fills = record
        .field_injections
        .iter()
        .map(|field| {
            let name = Ident::new(&field.field_name, Span::call_site());
            let lookup = lookup_call(
                field.wrapper,
                &field.lookup,
                field.inner.as_ref(),
                &field.service,
                deferred_providers,
            )?;
            Ok(quote!(value.#name = #lookup;))
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        #binding
        #(#fills)*
        let service: #service_ty = ::std::sync::Arc::new(value);
        ::core::result::Result::Ok(service)
    })
}

/// One resolver lookup: `resolve_one` for one-value slots, `resolve_many`
/// for sequence slots. Dependencies resolve under the default contract.
///
/// A `Deferred` slot resolves the registered cell when its service is
/// provided by a contract-less deferred singleton; for every other provider
/// the slot gets an inline cell that defers the bare lookup to first
/// access. The choice is made here, at generation time, so emission stays
/// a pure function of the table.
fn lookup_call(
    wrapper: DependencyWrapper,
    lookup: &TypeDescriptor,
    inner: Option<&TypeDescriptor>,
    service: &TypeDescriptor,
    deferred_providers: &DeferredProviders,
) -> syn::Result<TokenStream> {
    let lookup_ty = lookup.to_type()?;
    Ok(match wrapper {
        DependencyWrapper::Multi => {
            quote!(resolver.resolve_many::<#lookup_ty>(::core::option::Option::None)?)
        }
        DependencyWrapper::None => {
            quote!(resolver.resolve_one::<#lookup_ty>(::core::option::Option::None)?)
        }
        DependencyWrapper::Deferred => {
            if deferred_providers.contains(service) {
                quote!(resolver.resolve_one::<#lookup_ty>(::core::option::Option::None)?)
            } else {
                let inner_ty = inner
                    .ok_or_else(|| {
                        syn::Error::new(Span::call_site(), "deferred slot without an inner type")
                    })?
                    .to_type()?;
                quote!({
                    let resolver = resolver.clone();
                    ::wirework::Deferred::new(
                        ::wirework::ThreadMode::ExecutionAndPublication,
                        move || resolver.resolve_one::<#inner_ty>(::core::option::Option::None),
                    )
                })
            }
        }
    })
}

fn factory_parameter(record: &RegistrationRecord) -> TokenStream {
    if uses_resolver(record) {
        quote!(|resolver|)
    } else {
        quote!(|_|)
    }
}

fn uses_resolver(record: &RegistrationRecord) -> bool {
    !record.constructor_parameters.is_empty() || !record.field_injections.is_empty()
}

fn contract_tokens(contract: Option<&str>) -> TokenStream {
    match contract {
        Some(value) => quote!(::core::option::Option::Some(#value)),
        None => quote!(::core::option::Option::None),
    }
}

fn mode_tokens(mode: ThreadMode) -> TokenStream {
    let variant = Ident::new(mode.variant_name(), Span::call_site());
    quote!(::wirework::ThreadMode::#variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        ConstructorParameterDescriptor, FieldInjectionDescriptor, SourceLocation,
    };

    fn rendered(table: &RegistrationTable, invalid: &HashSet<usize>) -> String {
        let tokens = emit_wiring(table, invalid).unwrap();
        let file: syn::File = syn::parse2(tokens).unwrap();
        prettyplease::unparse(&file)
    }

    fn transient(interface: &str, concrete: &str, ordinal: usize) -> RegistrationRecord {
        RegistrationRecord {
            kind: RegistrationKind::Transient,
            interface: TypeDescriptor::from_name(interface),
            interface_is_trait_object: interface.starts_with("dyn "),
            concrete: Some(TypeDescriptor::from_name(concrete)),
            construction: Some(ConstructionStyle::Function("new".to_owned())),
            constructor_parameters: Vec::new(),
            field_injections: Vec::new(),
            contract: None,
            location: SourceLocation {
                ordinal,
                display: format!("register #{ordinal}"),
            },
        }
    }

    #[test]
    fn transient_without_dependencies_ignores_the_resolver() {
        let mut table = RegistrationTable::new();
        let _ = table.insert(transient("dyn Greeter", "ConsoleGreeter", 0));
        let text = rendered(&table, &HashSet::new());
        assert!(text.contains("register::<::std::sync::Arc<dyn Greeter>, _>"));
        assert!(text.contains("|_|"));
        assert!(text.contains("ConsoleGreeter::new()"));
    }

    #[test]
    fn parameters_become_lookup_calls_in_order() {
        let mut record = transient("dyn Greeter", "ConsoleGreeter", 0);
        record.constructor_parameters = vec![
            ConstructorParameterDescriptor {
                parameter_name: "sink".to_owned(),
                declared: TypeDescriptor::from_name("Arc<dyn Sink>"),
                wrapper: DependencyWrapper::None,
                service: TypeDescriptor::from_name("dyn Sink"),
                lookup: TypeDescriptor::from_name("Arc<dyn Sink>"),
                item: None,
                inner: None,
            },
            ConstructorParameterDescriptor {
                parameter_name: "handlers".to_owned(),
                declared: TypeDescriptor::from_name("Vec<Arc<dyn Handler>>"),
                wrapper: DependencyWrapper::Multi,
                service: TypeDescriptor::from_name("dyn Handler"),
                lookup: TypeDescriptor::from_name("Arc<dyn Handler>"),
                item: Some(TypeDescriptor::from_name("dyn Handler")),
                inner: None,
            },
        ];
        let mut table = RegistrationTable::new();
        let _ = table.insert(record);
        let text = rendered(&table, &HashSet::new());
        let one = text.find("resolve_one::<Arc<dyn Sink>>").unwrap();
        let many = text.find("resolve_many::<Arc<dyn Handler>>").unwrap();
        assert!(one < many);
    }

    #[test]
    fn field_injections_are_assigned_after_construction() {
        let mut record = transient("dyn Greeter", "ConsoleGreeter", 0);
        record.field_injections = vec![FieldInjectionDescriptor {
            field_name: "metrics".to_owned(),
            declared: TypeDescriptor::from_name("Arc<dyn Metrics>"),
            wrapper: DependencyWrapper::None,
            service: TypeDescriptor::from_name("dyn Metrics"),
            lookup: TypeDescriptor::from_name("Arc<dyn Metrics>"),
            item: None,
            inner: None,
            location: SourceLocation {
                ordinal: 0,
                display: "ConsoleGreeter.metrics".to_owned(),
            },
        }];
        let mut table = RegistrationTable::new();
        let _ = table.insert(record);
        let text = rendered(&table, &HashSet::new());
        assert!(text.contains("let mut value = ConsoleGreeter::new()"));
        assert!(text.contains("value.metrics = resolver.resolve_one::<Arc<dyn Metrics>>"));
    }

    #[test]
    fn deferred_singleton_registers_both_forms() {
        let mut record = transient("dyn Store", "DiskStore", 0);
        record.kind = RegistrationKind::DeferredSingleton {
            mode: ThreadMode::PublicationOnly,
        };
        let mut table = RegistrationTable::new();
        let _ = table.insert(record);
        let text = rendered(&table, &HashSet::new());
        assert!(text.contains("::wirework::ThreadMode::PublicationOnly"));
        assert!(text.contains("::wirework::Deferred<::std::sync::Arc<dyn Store>>"));
        assert!(text.contains("register::<::std::sync::Arc<dyn Store>, _>"));
        assert!(text.contains("cell.force()"));
    }

    #[test]
    fn constants_register_the_captured_expression() {
        let record = RegistrationRecord {
            kind: RegistrationKind::Constant {
                value: "Config::default()".to_owned(),
            },
            interface: TypeDescriptor::from_name("Config"),
            interface_is_trait_object: false,
            concrete: None,
            construction: None,
            constructor_parameters: Vec::new(),
            field_injections: Vec::new(),
            contract: Some("defaults".to_owned()),
            location: SourceLocation {
                ordinal: 0,
                display: "register_constant".to_owned(),
            },
        };
        let mut table = RegistrationTable::new();
        let _ = table.insert(record);
        let text = rendered(&table, &HashSet::new());
        assert!(text.contains("let value = Config::default()"));
        assert!(text.contains("register::<Config, _>"));
        assert!(text.contains("Some(\"defaults\")"));
    }

    #[test]
    fn invalid_records_are_withheld_but_order_is_kept() {
        let mut table = RegistrationTable::new();
        let _ = table.insert(transient("dyn A", "AImpl", 0));
        let _ = table.insert(transient("dyn B", "BImpl", 1));
        let _ = table.insert(transient("dyn C", "CImpl", 2));

        let text = rendered(&table, &HashSet::from([1]));
        assert!(text.contains("AImpl"));
        assert!(!text.contains("BImpl"));
        assert!(text.contains("CImpl"));
        assert!(text.find("AImpl").unwrap() < text.find("CImpl").unwrap());
    }

    fn deferred_parameter(service: &str) -> ConstructorParameterDescriptor {
        ConstructorParameterDescriptor {
            parameter_name: "dep".to_owned(),
            declared: TypeDescriptor::from_name(format!("Deferred<Arc<{service}>>")),
            wrapper: DependencyWrapper::Deferred,
            service: TypeDescriptor::from_name(service),
            lookup: TypeDescriptor::from_name(format!("Deferred<Arc<{service}>>")),
            item: None,
            inner: Some(TypeDescriptor::from_name(format!("Arc<{service}>"))),
        }
    }

    #[test]
    fn deferred_slot_resolves_the_cell_of_a_deferred_singleton() {
        let mut provider = transient("dyn Store", "DiskStore", 0);
        provider.kind = RegistrationKind::DeferredSingleton {
            mode: ThreadMode::ExecutionAndPublication,
        };
        let mut consumer = transient("dyn Reader", "StoreReader", 1);
        consumer.constructor_parameters = vec![deferred_parameter("dyn Store")];

        let mut table = RegistrationTable::new();
        let _ = table.insert(provider);
        let _ = table.insert(consumer);
        let text = rendered(&table, &HashSet::new());
        assert!(text.contains("resolve_one::<Deferred<Arc<dyn Store>>>"));
    }

    #[test]
    fn deferred_slot_on_a_transient_provider_gets_an_inline_cell() {
        let provider = transient("dyn Store", "DiskStore", 0);
        let mut consumer = transient("dyn Reader", "StoreReader", 1);
        consumer.constructor_parameters = vec![deferred_parameter("dyn Store")];

        let mut table = RegistrationTable::new();
        let _ = table.insert(provider);
        let _ = table.insert(consumer);
        let text = rendered(&table, &HashSet::new());
        assert!(!text.contains("resolve_one::<Deferred<Arc<dyn Store>>>"));
        assert!(text.contains("::wirework::Deferred::new"));
        assert!(text.contains("resolve_one::<Arc<dyn Store>>"));
    }

    #[test]
    fn emission_is_deterministic() {
        let mut table = RegistrationTable::new();
        let _ = table.insert(transient("dyn A", "AImpl", 0));
        let _ = table.insert(transient("dyn B", "BImpl", 1));
        let first = emit_wiring(&table, &HashSet::new()).unwrap().to_string();
        let second = emit_wiring(&table, &HashSet::new()).unwrap().to_string();
        assert_eq!(first, second);
    }
}
