use framegraph_common::EntityId;
use framegraph_ecs::{ComponentStore, ComputePass, RenderPass};
use glam::UVec3;

use crate::backend::{BackendResult, GraphicsBackend};
use crate::binder::{Binding, Unresolved, UnresolvedReason};
use crate::config::GraphConfig;
use crate::graph::{PassKind, PassNode};

/// What one graph invocation submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Pass entities in submission order.
    pub dispatched: Vec<EntityId>,
    pub skipped: Vec<Unresolved>,
}

impl FrameReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Submit every ready pass in `nodes` order.
///
/// `bindings` must line up with `nodes`, as produced by
/// [`bind_all`](crate::binder::bind_all). The first backend error stops the
/// frame; passes after it are not submitted.
pub fn execute<B: GraphicsBackend + ?Sized>(
    nodes: &[PassNode],
    bindings: &[Binding],
    store: &ComponentStore,
    backend: &mut B,
    config: &GraphConfig,
) -> BackendResult<FrameReport> {
    let mut report = FrameReport::default();

    for (node, binding) in nodes.iter().zip(bindings) {
        let ready = match binding {
            Binding::Ready(ready) => ready,
            Binding::Skipped(unresolved) => {
                report.skipped.push(unresolved.clone());
                continue;
            }
        };

        let submitted = match node.kind {
            PassKind::Compute => store.get_component::<ComputePass>(node.entity).map(|pass| {
                let workgroups = pass.workgroups.max(UVec3::ONE);
                tracing::debug!(pass = %node.entity, ?workgroups, "dispatch compute");
                backend.submit_compute(ready.pipeline, Some(ready.binding_set), workgroups)
            }),
            PassKind::Render => store.get_component::<RenderPass>(node.entity).map(|pass| {
                let vertex_count = pass.vertex_count.unwrap_or(config.default_vertex_count);
                tracing::debug!(pass = %node.entity, vertex_count, "dispatch draw");
                backend.submit_draw(ready.pipeline, Some(ready.binding_set), vertex_count)
            }),
        };

        match submitted {
            Some(result) => {
                result?;
                report.dispatched.push(node.entity);
            }
            None => report.skipped.push(Unresolved {
                pass: node.entity,
                reason: UnresolvedReason::MissingPassComponent,
            }),
        }
    }

    Ok(report)
}
