//! Unit graph
//!
//! Units live in an arena keyed by id. Edges come from declared
//! `depends_on` fields and from inferred body references; several origins
//! between the same pair collapse into one edge. Targets that do not resolve
//! are kept as dangling edges for the integrity checks.
//!
//! Resolved edges are mirrored into a petgraph `DiGraph` for dependents and
//! the acyclicity fast path.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::id::UnitId;
use super::references::References;
use super::unit::{Unit, UnitKind};

/// Where an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    Declared,
    Inferred,
}

/// Directed dependency `from -> to`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: UnitId,
    pub to: UnitId,
    pub origins: BTreeSet<EdgeOrigin>,

    /// File line in `from` where the relation is written
    pub line: Option<usize>,
}

impl Edge {
    pub fn is_declared(&self) -> bool {
        self.origins.contains(&EdgeOrigin::Declared)
    }

    pub fn is_inferred(&self) -> bool {
        self.origins.contains(&EdgeOrigin::Inferred)
    }
}

/// Unordered conflict relation, stored with `a <= b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPair {
    pub a: UnitId,
    pub b: UnitId,

    /// Units that declared this conflict
    pub declared_by: BTreeSet<UnitId>,
}

impl ConflictPair {
    /// True when both ends declare the conflict
    pub fn is_symmetric(&self) -> bool {
        self.declared_by.contains(&self.a) && self.declared_by.contains(&self.b)
    }
}

/// A unit together with its extracted references
#[derive(Debug, Clone)]
pub struct UnitNode {
    pub unit: Unit,
    pub references: References,

    /// Referenced ids minus declared dependencies minus self
    pub inferred_dependencies: BTreeSet<UnitId>,
}

impl UnitNode {
    pub fn new(unit: Unit, references: References) -> Self {
        let inferred_dependencies = references.inferred(&unit.declared_dependencies);
        Self {
            unit,
            references,
            inferred_dependencies,
        }
    }
}

/// Global graph over all successfully parsed units
#[derive(Debug, Default)]
pub struct UnitGraph {
    units: BTreeMap<UnitId, UnitNode>,
    edges: BTreeMap<(UnitId, UnitId), Edge>,
    conflicts: BTreeMap<(UnitId, UnitId), ConflictPair>,

    /// Resolved adjacency keyed by `from`
    adjacency: BTreeMap<UnitId, BTreeSet<UnitId>>,

    /// Resolved edges only
    graph: DiGraph<UnitId, ()>,
    node_map: HashMap<UnitId, NodeIndex>,
}

impl UnitGraph {
    /// Builds the graph in a single pass over the units
    ///
    /// Nodes must be unique by id; duplicates are removed before this point.
    pub fn build(nodes: impl IntoIterator<Item = UnitNode>) -> Self {
        let mut graph = Self::default();

        for node in nodes {
            let idx = graph.graph.add_node(node.unit.id.clone());
            graph.node_map.insert(node.unit.id.clone(), idx);
            graph.units.insert(node.unit.id.clone(), node);
        }

        let mut edges: BTreeMap<(UnitId, UnitId), Edge> = BTreeMap::new();
        let mut conflicts: BTreeMap<(UnitId, UnitId), ConflictPair> = BTreeMap::new();

        for (id, node) in &graph.units {
            let declared_line = node.unit.frontmatter.line_of("depends_on");
            for to in &node.unit.declared_dependencies {
                add_edge(&mut edges, id, to, EdgeOrigin::Declared, declared_line);
            }
            for to in node.references.ids() {
                add_edge(&mut edges, id, to, EdgeOrigin::Inferred, node.references.line_of(to.as_str()));
            }

            for other in &node.unit.declared_conflicts {
                let key = if id <= other {
                    (id.clone(), other.clone())
                } else {
                    (other.clone(), id.clone())
                };
                conflicts
                    .entry(key.clone())
                    .or_insert_with(|| ConflictPair {
                        a: key.0,
                        b: key.1,
                        declared_by: BTreeSet::new(),
                    })
                    .declared_by
                    .insert(id.clone());
            }
        }

        for edge in edges.values() {
            if let (Some(from), Some(to)) = (graph.node_map.get(&edge.from), graph.node_map.get(&edge.to)) {
                graph.graph.add_edge(*from, *to, ());
                graph
                    .adjacency
                    .entry(edge.from.clone())
                    .or_default()
                    .insert(edge.to.clone());
            }
        }

        graph.edges = edges;
        graph.conflicts = conflicts;
        graph
    }

    pub fn contains(&self, id: &str) -> bool {
        self.units.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&UnitNode> {
        self.units.get(id)
    }

    /// All nodes, sorted by id
    pub fn nodes(&self) -> impl Iterator<Item = &UnitNode> {
        self.units.values()
    }

    /// All ids, sorted
    pub fn ids(&self) -> impl Iterator<Item = &UnitId> {
        self.units.keys()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// All edges sorted by `(from, to)`, dangling ones included
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Edges whose target is not a known unit
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(|e| !self.contains(e.to.as_str()))
    }

    /// Resolved targets of `id`, sorted
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &UnitId> {
        self.adjacency.get(id).into_iter().flatten()
    }

    /// Units with a resolved edge into `id`, sorted
    pub fn dependents(&self, id: &str) -> Vec<UnitId> {
        let idx = match self.node_map.get(id) {
            Some(idx) => *idx,
            None => return vec![],
        };

        let mut dependents: Vec<UnitId> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// Conflict pairs sorted by `(a, b)`
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictPair> {
        self.conflicts.values()
    }

    /// True if any resolved cycle exists
    ///
    /// `toposort` walks with an explicit stack, so long chains are safe.
    pub fn has_cycles(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    pub fn count_kind(&self, kind: UnitKind) -> usize {
        self.units.values().filter(|n| n.unit.kind == kind).count()
    }
}

fn add_edge(
    edges: &mut BTreeMap<(UnitId, UnitId), Edge>,
    from: &UnitId,
    to: &UnitId,
    origin: EdgeOrigin,
    line: Option<usize>,
) {
    let edge = edges
        .entry((from.clone(), to.clone()))
        .or_insert_with(|| Edge {
            from: from.clone(),
            to: to.clone(),
            origins: BTreeSet::new(),
            line,
        });
    edge.origins.insert(origin);
    if edge.line.is_none() {
        edge.line = line;
    }
}
