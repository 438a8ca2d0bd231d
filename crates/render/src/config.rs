use serde::{Deserialize, Serialize};

use framegraph_ecs::DEFAULT_VERTEX_COUNT;

/// Tuning knobs for running the pass graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Vertex count for render passes that do not declare one.
    pub default_vertex_count: u32,
    /// Re-upload buffer contents when the component's bytes change.
    pub reupload_buffers: bool,
    /// Log a warning for every resource with more than one producer.
    pub warn_duplicate_producers: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_vertex_count: DEFAULT_VERTEX_COUNT,
            reupload_buffers: true,
            warn_duplicate_producers: true,
        }
    }
}
