use std::fmt::Write as _;

use framegraph_common::EntityId;
use framegraph_ecs::ComponentStore;
use framegraph_render::{CircularDependency, PassKind, PassNode, build_graph, duplicate_producers, sort};
use serde::Serialize;

/// Read-only views of the pass graph a store describes.
pub struct GraphInspector;

impl GraphInspector {
    /// One line per pass, in the order given, with its edges.
    pub fn describe(nodes: &[PassNode]) -> String {
        let mut out = String::new();
        for (i, node) in nodes.iter().enumerate() {
            let _ = write!(
                out,
                "{:>3}. {} {:<7} in [{}] out [{}]",
                i + 1,
                node.entity,
                kind_name(node.kind),
                join(&node.inputs),
                join(&node.outputs),
            );
            if !node.uniforms.is_empty() {
                let _ = write!(out, " uniforms [{}]", join(&node.uniforms));
            }
            out.push('\n');
        }
        out
    }

    /// Build and sort the store's graph, and collect duplicate producers.
    pub fn summarize(store: &ComponentStore) -> Result<GraphSummary, CircularDependency> {
        let nodes = build_graph(store);
        let duplicates = duplicate_producers(&nodes)
            .into_iter()
            .map(|d| DuplicateSummary {
                resource: d.resource,
                passes: d.passes,
            })
            .collect();
        let sorted = sort(nodes)?;
        tracing::debug!(passes = sorted.len(), "graph summarized");
        Ok(GraphSummary {
            passes: sorted.iter().map(PassSummary::from).collect(),
            duplicate_producers: duplicates,
        })
    }
}

fn kind_name(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Compute => "compute",
        PassKind::Render => "render",
    }
}

fn join(ids: &[EntityId]) -> String {
    ids.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

/// Sorted pass order plus lint findings, serializable for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub passes: Vec<PassSummary>,
    pub duplicate_producers: Vec<DuplicateSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub entity: EntityId,
    pub kind: &'static str,
    pub inputs: Vec<EntityId>,
    pub outputs: Vec<EntityId>,
    pub uniforms: Vec<EntityId>,
}

impl From<&PassNode> for PassSummary {
    fn from(node: &PassNode) -> Self {
        Self {
            entity: node.entity,
            kind: kind_name(node.kind),
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            uniforms: node.uniforms.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateSummary {
    pub resource: EntityId,
    pub passes: Vec<EntityId>,
}
