//! One graph invocation: build, sort, bind, dispatch.

use std::fmt;

use framegraph_ecs::ComponentStore;

use crate::backend::{BackendError, BackendResult, GraphicsBackend};
use crate::binder::bind_all;
use crate::cache::ResourceCache;
use crate::config::GraphConfig;
use crate::executor::{FrameReport, execute};
use crate::graph::{build_graph, duplicate_producers};
use crate::schedule::{CircularDependency, sort};

/// Stage of a graph invocation. Every invocation starts and ends `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    BuildGraph,
    Sort,
    Bind,
    Dispatch,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BuildGraph => "build-graph",
            Self::Sort => "sort",
            Self::Bind => "bind",
            Self::Dispatch => "dispatch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The scene is mis-authored. Retrying without changes fails the same way.
    #[error(transparent)]
    CircularDependency(#[from] CircularDependency),
    #[error("backend failure during {phase}: {source}")]
    Backend {
        phase: FramePhase,
        #[source]
        source: BackendError,
    },
}

impl GraphError {
    /// Backend failures may clear up after invalidating the cache.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

/// Pass graph runner that keeps backend objects alive between frames.
#[derive(Debug, Default)]
pub struct RenderGraph {
    cache: ResourceCache,
    config: GraphConfig,
}

impl RenderGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            cache: ResourceCache::new(),
            config,
        }
    }

    pub fn run<B: GraphicsBackend + ?Sized>(
        &mut self,
        store: &ComponentStore,
        backend: &mut B,
    ) -> Result<FrameReport, GraphError> {
        run_graph_with(store, backend, &mut self.cache, &self.config)
    }

    /// Drop every cached backend object; the next run recreates them.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    /// Forward a resize to the backend and invalidate the cache.
    pub fn resize<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        backend.resize(width, height)?;
        self.cache.invalidate();
        Ok(())
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
}

/// Run the graph once with the default [`GraphConfig`].
pub fn run_graph<B: GraphicsBackend + ?Sized>(
    store: &ComponentStore,
    backend: &mut B,
    cache: &mut ResourceCache,
) -> Result<FrameReport, GraphError> {
    run_graph_with(store, backend, cache, &GraphConfig::default())
}

pub fn run_graph_with<B: GraphicsBackend + ?Sized>(
    store: &ComponentStore,
    backend: &mut B,
    cache: &mut ResourceCache,
    config: &GraphConfig,
) -> Result<FrameReport, GraphError> {
    let _frame = tracing::debug_span!("run_graph", backend = backend.name()).entered();

    let nodes = {
        let _span = tracing::trace_span!("phase", phase = %FramePhase::BuildGraph).entered();
        let nodes = build_graph(store);
        if config.warn_duplicate_producers {
            for dup in duplicate_producers(&nodes) {
                tracing::warn!(
                    resource = %dup.resource,
                    passes = ?dup.passes,
                    "resource has more than one producer; ordering uses the first"
                );
            }
        }
        nodes
    };

    let sorted = {
        let _span = tracing::trace_span!("phase", phase = %FramePhase::Sort).entered();
        sort(nodes)?
    };

    let bindings = {
        let _span = tracing::trace_span!("phase", phase = %FramePhase::Bind).entered();
        bind_all(&sorted, store, backend, cache, config).map_err(|source| GraphError::Backend {
            phase: FramePhase::Bind,
            source,
        })?
    };

    let report = {
        let _span = tracing::trace_span!("phase", phase = %FramePhase::Dispatch).entered();
        execute(&sorted, &bindings, store, backend, config).map_err(|source| GraphError::Backend {
            phase: FramePhase::Dispatch,
            source,
        })?
    };

    tracing::debug!(
        dispatched = report.dispatched.len(),
        skipped = report.skipped.len(),
        "frame complete"
    );
    Ok(report)
}
