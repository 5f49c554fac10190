// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::Result;

/// Thread-safety mode for a [`Deferred`] cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    /// The initializer runs at most once at a time; racing callers block
    /// until the winner publishes. The strictest mode, and the default.
    ExecutionAndPublication,
    /// Racing initializers are allowed to run concurrently; the first
    /// publication wins and later results are discarded.
    PublicationOnly,
    /// No execution exclusion at all. Publication itself stays atomic;
    /// Rust offers no safe way to drop that last guarantee.
    Unsynchronized,
}

type InitFn<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

struct Inner<T> {
    mode: ThreadMode,
    cell: OnceCell<T>,
    exclusion: Mutex<()>,
    init: InitFn<T>,
}

/// A clone-shareable value that materializes on first access, then caches.
///
/// All clones observe the same cell: whichever clone forces first, every
/// clone sees the same value afterwards. Initialization failures are not
/// cached; a later [`Deferred::force`] retries the initializer.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone> Deferred<T> {
    /// Creates a cell around an initializer, parameterized by `mode`.
    pub fn new<F>(mode: ThreadMode, init: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                mode,
                cell: OnceCell::new(),
                exclusion: Mutex::new(()),
                init: Box::new(init),
            }),
        }
    }

    /// Materializes the value, or returns the cached one.
    pub fn force(&self) -> Result<T> {
        if let Some(value) = self.inner.cell.get() {
            return Ok(value.clone());
        }

        match self.inner.mode {
            ThreadMode::ExecutionAndPublication => {
                let _guard = self.inner.exclusion.lock();
                if self.inner.cell.get().is_none() {
                    let value = (self.inner.init)()?;
                    let _ = self.inner.cell.set(value);
                }
            }
            ThreadMode::PublicationOnly | ThreadMode::Unsynchronized => {
                let value = (self.inner.init)()?;
                let _ = self.inner.cell.set(value);
            }
        }

        Ok(self
            .inner
            .cell
            .get()
            .expect("internal error: deferred cell empty after initialization")
            .clone())
    }

    /// The cached value, if the cell has already materialized.
    pub fn get(&self) -> Option<T> {
        self.inner.cell.get().cloned()
    }

    /// Whether the cell has materialized.
    pub fn is_materialized(&self) -> bool {
        self.inner.cell.get().is_some()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("mode", &self.inner.mode)
            .field("materialized", &self.inner.cell.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    static_assertions::assert_impl_all!(Deferred<u32>: Send, Sync, Clone, fmt::Debug);

    #[test]
    fn force_materializes_once_and_caches() {
        let runs = Arc::new(AtomicU32::new(0));
        let cell = {
            let runs = Arc::clone(&runs);
            Deferred::new(ThreadMode::ExecutionAndPublication, move || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(7u32)
            })
        };
        assert!(!cell.is_materialized());
        assert_eq!(cell.force().unwrap(), 7);
        assert_eq!(cell.force().unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get(), Some(7));
    }

    #[test]
    fn clones_share_the_cell() {
        let cell = Deferred::new(ThreadMode::ExecutionAndPublication, || Ok(1u32));
        let alias = cell.clone();
        assert_eq!(alias.force().unwrap(), 1);
        assert!(cell.is_materialized());
    }

    #[test]
    fn failures_are_not_cached() {
        let attempts = Arc::new(AtomicU32::new(0));
        let cell = {
            let attempts = Arc::clone(&attempts);
            Deferred::new(ThreadMode::ExecutionAndPublication, move || {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(crate::ResolveError::NotRegistered {
                        type_name: "u32",
                        contract: None,
                    })
                } else {
                    Ok(9u32)
                }
            })
        };
        assert!(cell.force().is_err());
        assert!(!cell.is_materialized());
        assert_eq!(cell.force().unwrap(), 9);
    }

    #[test]
    fn publication_only_keeps_the_first_published_value() {
        let cell = Deferred::new(ThreadMode::PublicationOnly, || Ok(5u32));
        assert_eq!(cell.force().unwrap(), 5);
        assert_eq!(cell.get(), Some(5));
    }

    #[test]
    fn execution_and_publication_is_exclusive_across_threads() {
        let runs = Arc::new(AtomicU32::new(0));
        let cell = {
            let runs = Arc::clone(&runs);
            Deferred::new(ThreadMode::ExecutionAndPublication, move || {
                runs.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(10));
                Ok(42u32)
            })
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || cell.force().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
