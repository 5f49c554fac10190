// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Constructor-level cycle detection over the aggregated table.
//!
//! The dependency graph is derived and ephemeral: nodes are the concrete
//! types of the table, edges are eager constructor parameters only.
//! Deferred and sequence slots are exempt because they do not require the
//! dependency to be fully constructed before the depending constructor
//! returns; that exemption is a deliberate, documented semantic choice.

use std::collections::{HashMap, HashSet};

use crate::descriptor::DependencyWrapper;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::table::RegistrationTable;

/// The outcome of one cycle-detection pass.
#[derive(Debug, Default)]
pub struct CycleAnalysis {
    /// Indices of table records withheld from emission.
    pub invalid: HashSet<usize>,
    /// One `circular-dependency` finding per detected cycle.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Runs iterative depth-first traversal with three-color marking over all
/// registered concrete types. Any edge into a gray node signals a cycle;
/// every registration whose concrete type is a cycle member is withheld.
pub fn detect_cycles(table: &RegistrationTable) -> CycleAnalysis {
    let mut analysis = CycleAnalysis::default();

    // Nodes in first-seen declaration order, so reports are deterministic.
    let mut nodes: Vec<String> = Vec::new();
    let mut node_ids: HashMap<String, usize> = HashMap::new();
    for record in table.records() {
        if let Some(concrete) = &record.concrete {
            node_ids.entry(concrete.name().to_owned()).or_insert_with(|| {
                nodes.push(concrete.name().to_owned());
                nodes.len() - 1
            });
        }
    }

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for record in table.records() {
        let Some(concrete) = &record.concrete else {
            continue;
        };
        let from = node_ids[concrete.name()];
        for parameter in &record.constructor_parameters {
            if parameter.wrapper != DependencyWrapper::None {
                continue;
            }
            for provider in table.providers_of(&parameter.service) {
                let Some(provider_concrete) = &table.records()[provider].concrete else {
                    continue;
                };
                let to = node_ids[provider_concrete.name()];
                if !edges[from].contains(&to) {
                    edges[from].push(to);
                }
            }
        }
    }

    let mut colors = vec![Color::White; nodes.len()];
    let mut cycle_members: HashSet<usize> = HashSet::new();

    for start in 0..nodes.len() {
        if colors[start] != Color::White {
            continue;
        }

        // Explicit stack of (node, next child index); `path` mirrors the
        // gray chain for cycle extraction.
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut path: Vec<usize> = vec![start];
        colors[start] = Color::Gray;

        while let Some((node, child_index)) = stack.last_mut() {
            let node = *node;
            match edges[node].get(*child_index) {
                Some(&child) => {
                    *child_index += 1;
                    match colors[child] {
                        Color::White => {
                            colors[child] = Color::Gray;
                            stack.push((child, 0));
                            path.push(child);
                        }
                        Color::Gray => {
                            let position = path
                                .iter()
                                .position(|&member| member == child)
                                .unwrap_or(0);
                            let members: Vec<usize> = path[position..].to_vec();
                            let mut rendered: Vec<&str> =
                                members.iter().map(|&member| nodes[member].as_str()).collect();
                            rendered.push(nodes[child].as_str());
                            analysis.diagnostics.push(Diagnostic::error(
                                DiagnosticCode::CircularDependency,
                                None,
                                format!(
                                    "eager construction cycle: {}",
                                    rendered.join(" -> ")
                                ),
                            ));
                            cycle_members.extend(members);
                        }
                        Color::Black => {}
                    }
                }
                None => {
                    colors[node] = Color::Black;
                    stack.pop();
                    path.pop();
                }
            }
        }
    }

    for (position, record) in table.records().iter().enumerate() {
        if let Some(concrete) = &record.concrete {
            if cycle_members.contains(&node_ids[concrete.name()]) {
                analysis.invalid.insert(position);
            }
        }
    }

    analysis
}
