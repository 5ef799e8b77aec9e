//! Dependency Graph (§4.3): single-pass last-writer construction plus
//! transitive upstream/downstream queries.
//!
//! Grounded on `dasa.analysis.deps.DependencyAnalyzer.build_graph` — a single
//! pass maintaining a `var_to_cell` map, producing backward-only edges.

use crate::parser::CellAnalysis;
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub index: usize,
    pub definitions: BTreeSet<String>,
    pub references: BTreeSet<String>,
    pub upstream: BTreeSet<usize>,
    pub downstream: BTreeSet<usize>,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<DependencyNode>,
}

impl DependencyGraph {
    /// Build the graph from cell sources and their parsed analyses, in
    /// source order. `sources` provides the raw cell text for labeling.
    pub fn build(analyses: &[CellAnalysis], sources: &[&str]) -> Self {
        let mut last_writer: HashMap<String, usize> = HashMap::new();
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); analyses.len()];

        for (index, analysis) in analyses.iter().enumerate() {
            for reference in &analysis.references {
                if let Some(&writer) = last_writer.get(reference) {
                    if writer != index {
                        edges[index].insert(writer);
                    }
                }
            }
            for def in &analysis.definitions {
                last_writer.insert(def.clone(), index);
            }
        }

        let mut nodes: Vec<DependencyNode> = analyses
            .iter()
            .enumerate()
            .map(|(index, analysis)| DependencyNode {
                index,
                definitions: analysis.definitions.clone(),
                references: analysis.references.clone(),
                upstream: edges[index].clone(),
                downstream: BTreeSet::new(),
                label: label_for(sources.get(index).copied().unwrap_or("")),
            })
            .collect();

        for (index, ups) in edges.iter().enumerate() {
            for &u in ups {
                nodes[u].downstream.insert(index);
            }
        }

        Self { nodes }
    }

    pub fn upstream(&self, index: usize) -> Vec<usize> {
        self.walk(index, |n| &n.upstream)
    }

    pub fn downstream(&self, index: usize) -> Vec<usize> {
        self.walk(index, |n| &n.downstream)
    }

    fn walk(&self, start: usize, edges_of: impl Fn(&DependencyNode) -> &BTreeSet<usize>) -> Vec<usize> {
        let mut visited: BTreeSet<usize> = BTreeSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(current) {
                for &next in edges_of(node) {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        visited.remove(&start);
        visited.into_iter().collect()
    }

    /// Advisory dead-code heuristic: a node with references but no downstream
    /// consumers, excluding the last cell (assumed a terminal sink).
    pub fn dead_cells(&self) -> Vec<usize> {
        let last = self.nodes.len().saturating_sub(1);
        self.nodes
            .iter()
            .filter(|n| n.index != last && !n.references.is_empty() && n.downstream.is_empty())
            .map(|n| n.index)
            .collect()
    }
}

fn label_for(source: &str) -> String {
    let line = source
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or("");
    let line = line.strip_prefix("# ").unwrap_or(line);
    if line.chars().count() > 50 {
        line.chars().take(50).collect()
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::analyze;

    #[test]
    fn edge_from_definer_to_user() {
        let sources = ["x = 1", "y = x + 1"];
        let analyses: Vec<_> = sources.iter().map(|s| analyze(s)).collect();
        let graph = DependencyGraph::build(&analyses, &sources);
        assert!(graph.nodes[1].upstream.contains(&0));
        assert!(graph.nodes[0].downstream.contains(&1));
    }

    #[test]
    fn last_writer_wins() {
        let sources = ["x = 1", "x = 2", "y = x"];
        let analyses: Vec<_> = sources.iter().map(|s| analyze(s)).collect();
        let graph = DependencyGraph::build(&analyses, &sources);
        assert!(graph.nodes[2].upstream.contains(&1));
        assert!(!graph.nodes[2].upstream.contains(&0));
    }

    #[test]
    fn transitive_downstream() {
        let sources = ["x = 1", "y = x + 1", "z = y + 1"];
        let analyses: Vec<_> = sources.iter().map(|s| analyze(s)).collect();
        let graph = DependencyGraph::build(&analyses, &sources);
        let down = graph.downstream(0);
        assert!(down.contains(&1));
        assert!(down.contains(&2));
    }

    #[test]
    fn upstream_and_downstream_exclude_self() {
        let sources = ["x = 1"];
        let analyses: Vec<_> = sources.iter().map(|s| analyze(s)).collect();
        let graph = DependencyGraph::build(&analyses, &sources);
        assert!(!graph.upstream(0).contains(&0));
        assert!(!graph.downstream(0).contains(&0));
    }

    #[test]
    fn dead_cell_heuristic_ignores_last_cell() {
        let sources = ["x = 1", "y = x + 1"];
        let analyses: Vec<_> = sources.iter().map(|s| analyze(s)).collect();
        let graph = DependencyGraph::build(&analyses, &sources);
        assert!(graph.dead_cells().is_empty());
    }

    #[test]
    fn label_truncates_and_skips_comments() {
        let label = label_for("# a comment\nlong_variable_name = some_function_call_that_is_quite_long_indeed()");
        assert!(label.chars().count() <= 50);
        assert!(!label.starts_with('#'));
    }
}
