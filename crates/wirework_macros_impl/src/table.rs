// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registration aggregation: deduplication and indexing by binding key.

use std::collections::HashMap;

use crate::descriptor::{RegistrationRecord, TypeDescriptor};
use crate::diagnostic::{Diagnostic, DiagnosticCode};

/// The key a registration binds under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    /// The interface descriptor.
    pub interface: TypeDescriptor,
    /// The contract literal, when given.
    pub contract: Option<String>,
}

/// All resolved registrations of one compilation unit, in declaration order.
///
/// The first record inserted under a key owns that key; later insertions
/// under the same key raise the advisory `duplicate-registration` finding
/// but are kept — every record is still emitted, and adjudication between
/// duplicates is the runtime resolver's policy, not this table's.
#[derive(Debug, Default)]
pub struct RegistrationTable {
    records: Vec<RegistrationRecord>,
    index: HashMap<BindingKey, usize>,
}

impl RegistrationTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, returning the advisory duplicate finding if the
    /// key is already owned.
    pub fn insert(&mut self, record: RegistrationRecord) -> Option<Diagnostic> {
        let (interface, contract) = record.binding_key();
        let key = BindingKey {
            interface,
            contract,
        };
        let position = self.records.len();
        let diagnostic = match self.index.get(&key) {
            Some(&first) => {
                let original = &self.records[first];
                Some(Diagnostic::warning(
                    DiagnosticCode::DuplicateRegistration,
                    None,
                    format!(
                        "`{}`{} is already registered by `{}`",
                        key.interface,
                        key.contract
                            .as_deref()
                            .map(|contract| format!(" (contract \"{contract}\")"))
                            .unwrap_or_default(),
                        original.location.display,
                    ),
                ))
            }
            None => {
                self.index.insert(key, position);
                None
            }
        };
        self.records.push(record);
        diagnostic
    }

    /// The records in declaration order.
    pub fn records(&self) -> &[RegistrationRecord] {
        &self.records
    }

    /// The record owning a binding key, if any.
    pub fn owner(&self, key: &BindingKey) -> Option<&RegistrationRecord> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    /// Indices of every record that binds the given interface, under any
    /// contract. The cycle detector uses this deliberately conservative
    /// view: construction order matters regardless of contract keys.
    pub fn providers_of(&self, interface: &TypeDescriptor) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| &record.interface == interface)
            .map(|(position, _)| position)
            .collect()
    }

    /// Number of records, duplicates included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
