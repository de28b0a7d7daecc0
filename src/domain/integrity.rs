//! Global integrity checks over the unit graph
//!
//! Three independent checks run once the full graph is built:
//! dangling references, dependency cycles and conflict symmetry.

use std::collections::{BTreeSet, HashSet};

use super::finding::{Finding, FindingCode};
use super::graph::UnitGraph;
use super::id::UnitId;

/// Result of validating the graph
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GraphValidation {
    pub findings: Vec<Finding>,

    /// Canonical cycles, sorted. Each starts with its smallest id and repeats
    /// it at the end.
    pub cycles: Vec<Vec<UnitId>>,
}

/// Runs all graph checks
pub fn validate(graph: &UnitGraph) -> GraphValidation {
    let mut findings = check_dangling(graph);
    let cycles = find_cycles(graph);
    findings.extend(cycle_findings(graph, &cycles));
    findings.extend(check_conflicts(graph));

    GraphValidation { findings, cycles }
}

fn source_path(graph: &UnitGraph, id: &str) -> String {
    graph
        .node(id)
        .map(|n| n.unit.source_path.clone())
        .unwrap_or_default()
}

/// One `ReferenceError` per edge whose target is unknown
pub fn check_dangling(graph: &UnitGraph) -> Vec<Finding> {
    graph
        .dangling_edges()
        .map(|edge| {
            let how = if edge.is_declared() {
                format!("depends on `{}`", edge.to)
            } else {
                format!("references `{}` in its body", edge.to)
            };
            Finding::error(
                FindingCode::ReferenceError,
                &edge.from,
                source_path(graph, edge.from.as_str()),
                format!("`{}` {}, which does not exist", edge.from, how),
            )
            .at_line(edge.line)
        })
        .collect()
}

/// Finds dependency cycles with an iterative depth-first search
///
/// Nodes are visited in id order and successors in id order, so the result
/// is deterministic. When an on-stack node is reached again, the path from
/// its first occurrence to the current node is a cycle.
pub fn find_cycles(graph: &UnitGraph) -> Vec<Vec<UnitId>> {
    struct Frame<'g> {
        node: &'g UnitId,
        successors: Vec<&'g UnitId>,
        cursor: usize,
    }

    if !graph.has_cycles() {
        return Vec::new();
    }

    let mut visited: HashSet<&UnitId> = HashSet::new();
    let mut found: BTreeSet<Vec<UnitId>> = BTreeSet::new();

    for start in graph.ids() {
        if !visited.insert(start) {
            continue;
        }

        let mut path: Vec<&UnitId> = vec![start];
        let mut on_stack: HashSet<&UnitId> = HashSet::from([start]);
        let mut stack = vec![Frame {
            node: start,
            successors: graph.successors(start.as_str()).collect(),
            cursor: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(next) = frame.successors.get(frame.cursor).copied() else {
                on_stack.remove(frame.node);
                path.pop();
                stack.pop();
                continue;
            };
            frame.cursor += 1;

            if on_stack.contains(next) {
                if let Some(pos) = path.iter().position(|n| *n == next) {
                    found.insert(canonical_cycle(&path[pos..]));
                }
            } else if visited.insert(next) {
                path.push(next);
                on_stack.insert(next);
                stack.push(Frame {
                    node: next,
                    successors: graph.successors(next.as_str()).collect(),
                    cursor: 0,
                });
            }
        }
    }

    found.into_iter().collect()
}

/// Rotates a cycle to start at its smallest id and closes it
fn canonical_cycle(path: &[&UnitId]) -> Vec<UnitId> {
    let start = path
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut cycle: Vec<UnitId> = path[start..]
        .iter()
        .chain(path[..start].iter())
        .map(|id| (*id).clone())
        .collect();
    if let Some(first) = cycle.first().cloned() {
        cycle.push(first);
    }
    cycle
}

fn cycle_findings(graph: &UnitGraph, cycles: &[Vec<UnitId>]) -> Vec<Finding> {
    cycles
        .iter()
        .filter_map(|cycle| {
            let first = cycle.first()?;
            let rendered: Vec<&str> = cycle.iter().map(UnitId::as_str).collect();
            Some(Finding::error(
                FindingCode::CycleError,
                first,
                source_path(graph, first.as_str()),
                format!("dependency cycle: {}", rendered.join(" -> ")),
            ))
        })
        .collect()
}

/// Checks that every declared conflict is declared in both directions
///
/// A conflict with a missing unit is an error; a one-sided conflict between
/// two existing units is a warning.
pub fn check_conflicts(graph: &UnitGraph) -> Vec<Finding> {
    let mut findings = Vec::new();

    for node in graph.nodes() {
        let from = &node.unit.id;
        let line = node.unit.frontmatter.line_of("conflicts_with");

        for target in &node.unit.declared_conflicts {
            match graph.node(target.as_str()) {
                None => findings.push(
                    Finding::error(
                        FindingCode::ReferenceError,
                        from,
                        &node.unit.source_path,
                        format!(
                            "`{}` conflicts with `{}`, which does not exist",
                            from, target
                        ),
                    )
                    .at_line(line),
                ),
                Some(other) if !other.unit.declared_conflicts.contains(from) => findings.push(
                    Finding::warning(
                        FindingCode::AsymmetricConflict,
                        from,
                        &node.unit.source_path,
                        format!(
                            "`{}` declares a conflict with `{}`, but `{}` does not declare one with `{}`",
                            from, target, target, from
                        ),
                    )
                    .at_line(line),
                ),
                Some(_) => {}
            }
        }
    }

    findings
}
