// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ResolveError, Result};

type BoxedValue = Box<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Resolver) -> Result<BoxedValue> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    type_id: TypeId,
    contract: Option<&'static str>,
}

/// Executes generated wiring: factories keyed by value type and contract.
///
/// The resolver holds, per `(type, contract)` key, the ordered list of
/// registered factories. [`Resolver::resolve_one`] runs the most recently
/// registered factory for the key; [`Resolver::resolve_many`] runs all of
/// them in registration order. There is no reflection anywhere: the wiring
/// function generated by `#[wirework::module]` is the only place factories
/// come from, and it calls nothing but the three operations below.
///
/// Cloning is cheap and shares the underlying registrations. The interior
/// lock is never held across a factory invocation, so factories may resolve
/// their own dependencies recursively.
#[derive(Clone, Default)]
pub struct Resolver {
    bindings: Arc<RwLock<HashMap<BindingKey, Vec<Factory>>>>,
}

impl Resolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a factory for `T` under the given contract.
    pub fn register<T, F>(&self, contract: Option<&'static str>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver) -> Result<T> + Send + Sync + 'static,
    {
        tracing::debug!(
            service = std::any::type_name::<T>(),
            contract,
            "registering factory"
        );
        let factory: Factory =
            Arc::new(move |resolver| factory(resolver).map(|value| Box::new(value) as BoxedValue));
        self.bindings
            .write()
            .entry(BindingKey {
                type_id: TypeId::of::<T>(),
                contract,
            })
            .or_default()
            .push(factory);
    }

    /// Resolves one `T`, running the most recently registered factory for
    /// the key.
    pub fn resolve_one<T>(&self, contract: Option<&'static str>) -> Result<T>
    where
        T: Send + Sync + 'static,
    {
        match self.try_resolve_one(contract)? {
            Some(value) => Ok(value),
            None => Err(ResolveError::NotRegistered {
                type_name: std::any::type_name::<T>(),
                contract,
            }),
        }
    }

    /// Resolves one `T` if a factory is registered, `None` otherwise.
    pub fn try_resolve_one<T>(&self, contract: Option<&'static str>) -> Result<Option<T>>
    where
        T: Send + Sync + 'static,
    {
        let factory = {
            let bindings = self.bindings.read();
            bindings
                .get(&BindingKey {
                    type_id: TypeId::of::<T>(),
                    contract,
                })
                .and_then(|factories| factories.last())
                .map(Arc::clone)
        };
        match factory {
            Some(factory) => {
                tracing::debug!(
                    service = std::any::type_name::<T>(),
                    contract,
                    "resolving"
                );
                Ok(Some(downcast::<T>(factory(self)?)))
            }
            None => Ok(None),
        }
    }

    /// Resolves every registration of `T` under the contract, in
    /// registration order. An unbound key yields an empty vector: a
    /// sequence dependency means "zero or more".
    pub fn resolve_many<T>(&self, contract: Option<&'static str>) -> Result<Vec<T>>
    where
        T: Send + Sync + 'static,
    {
        let factories: Vec<Factory> = {
            let bindings = self.bindings.read();
            bindings
                .get(&BindingKey {
                    type_id: TypeId::of::<T>(),
                    contract,
                })
                .map(|factories| factories.iter().map(Arc::clone).collect())
                .unwrap_or_default()
        };
        factories
            .iter()
            .map(|factory| factory(self).map(downcast::<T>))
            .collect()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("bindings", &self.bindings.read().len())
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(value: BoxedValue) -> T {
    *value
        .downcast::<T>()
        .expect("internal error: factory produced a value of a different type than its registration")
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Resolver: Send, Sync, Clone, fmt::Debug);

    #[test]
    fn registered_factories_resolve() {
        let resolver = Resolver::new();
        resolver.register::<u32, _>(None, |_| Ok(7));
        assert_eq!(resolver.resolve_one::<u32>(None).unwrap(), 7);
    }

    #[test]
    fn missing_registrations_report_type_and_contract() {
        let resolver = Resolver::new();
        let error = resolver.resolve_one::<u32>(Some("port")).unwrap_err();
        assert_eq!(
            error,
            ResolveError::NotRegistered {
                type_name: std::any::type_name::<u32>(),
                contract: Some("port"),
            }
        );
    }

    #[test]
    fn try_resolve_one_is_the_non_failing_probe() {
        let resolver = Resolver::new();
        assert_eq!(resolver.try_resolve_one::<u32>(None).unwrap(), None);
        resolver.register::<u32, _>(None, |_| Ok(1));
        assert_eq!(resolver.try_resolve_one::<u32>(None).unwrap(), Some(1));
    }

    #[test]
    fn contracts_partition_the_key_space() {
        let resolver = Resolver::new();
        resolver.register::<u32, _>(None, |_| Ok(1));
        resolver.register::<u32, _>(Some("port"), |_| Ok(8080));
        assert_eq!(resolver.resolve_one::<u32>(None).unwrap(), 1);
        assert_eq!(resolver.resolve_one::<u32>(Some("port")).unwrap(), 8080);
    }

    #[test]
    fn the_most_recent_registration_wins_for_one() {
        let resolver = Resolver::new();
        resolver.register::<u32, _>(None, |_| Ok(1));
        resolver.register::<u32, _>(None, |_| Ok(2));
        assert_eq!(resolver.resolve_one::<u32>(None).unwrap(), 2);
    }

    #[test]
    fn resolve_many_returns_all_in_registration_order() {
        let resolver = Resolver::new();
        resolver.register::<u32, _>(None, |_| Ok(1));
        resolver.register::<u32, _>(None, |_| Ok(2));
        assert_eq!(resolver.resolve_many::<u32>(None).unwrap(), vec![1, 2]);
        // An unbound key is an empty sequence, not an error.
        assert_eq!(resolver.resolve_many::<u64>(None).unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn factories_resolve_recursively() {
        let resolver = Resolver::new();
        resolver.register::<u32, _>(None, |_| Ok(20));
        resolver.register::<String, _>(None, |r| {
            let base = r.resolve_one::<u32>(None)?;
            Ok(format!("port {base}"))
        });
        assert_eq!(resolver.resolve_one::<String>(None).unwrap(), "port 20");
    }

    #[test]
    fn clones_share_registrations() {
        let resolver = Resolver::new();
        let alias = resolver.clone();
        resolver.register::<u32, _>(None, |_| Ok(3));
        assert_eq!(alias.resolve_one::<u32>(None).unwrap(), 3);
    }

    #[test]
    fn transient_factories_run_per_resolution() {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let resolver = Resolver::new();
        resolver.register::<u32, _>(None, |_| Ok(COUNTER.fetch_add(1, Ordering::SeqCst)));
        let first = resolver.resolve_one::<u32>(None).unwrap();
        let second = resolver.resolve_one::<u32>(None).unwrap();
        assert_ne!(first, second);
    }
}
