//! Drug interaction graph.
//!
//! Stored as an adjacency list (`drug → [interacting drugs]`). Sources frequently record an
//! interaction in one direction only, so [`InteractionGraph::interacts`] always checks both.

use crate::{non_empty, parse_wire, render_wire, NonEmptyText, ReferenceResult};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteractionGraph {
    entries: BTreeMap<NonEmptyText, Vec<NonEmptyText>>,
    index: HashMap<String, HashSet<String>>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `drug` interacts with `other`. Only the given direction is stored.
    pub fn insert(&mut self, drug: NonEmptyText, other: NonEmptyText) {
        self.index
            .entry(drug.match_key())
            .or_default()
            .insert(other.match_key());
        let targets = self.entries.entry(drug).or_default();
        if !targets.iter().any(|t| t.eq_ignore_case(other.as_str())) {
            targets.push(other);
        }
    }

    /// Whether `a` and `b` interact in either direction (case-insensitive).
    pub fn interacts(&self, a: &str, b: &str) -> bool {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        let listed = |from: &str, to: &str| self.index.get(from).is_some_and(|t| t.contains(to));
        listed(&a, &b) || listed(&b, &a)
    }

    /// Adjacency entries as stored.
    pub fn entries(&self) -> &BTreeMap<NonEmptyText, Vec<NonEmptyText>> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(NonEmptyText, NonEmptyText)> for InteractionGraph {
    fn from_iter<I: IntoIterator<Item = (NonEmptyText, NonEmptyText)>>(iter: I) -> Self {
        let mut graph = InteractionGraph::new();
        for (drug, other) in iter {
            graph.insert(drug, other);
        }
        graph
    }
}

/// Interaction graph operations.
pub struct Interactions;

impl Interactions {
    /// Parse the graph from a YAML mapping of drug name to a list of drug names.
    pub fn parse(yaml_text: &str) -> ReferenceResult<InteractionGraph> {
        let wire: BTreeMap<String, Vec<String>> = parse_wire(yaml_text, "Interaction graph")?;
        let mut graph = InteractionGraph::new();
        for (drug, others) in wire {
            let drug = non_empty(&drug, "interaction drug")?;
            for other in others {
                graph.insert(drug.clone(), non_empty(&other, "interacting drug")?);
            }
        }
        Ok(graph)
    }

    pub fn render(graph: &InteractionGraph) -> ReferenceResult<String> {
        let wire: BTreeMap<&str, Vec<&str>> = graph
            .entries
            .iter()
            .map(|(drug, others)| (drug.as_str(), others.iter().map(|o| o.as_str()).collect()))
            .collect();
        render_wire(&wire, "interaction graph")
    }
}
