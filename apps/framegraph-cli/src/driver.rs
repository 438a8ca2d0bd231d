//! Per-frame loop around the erosion scene and the pass graph.

use framegraph_author::{AuthorError, ErosionScene, ErosionSystem, build_erosion_scene};
use framegraph_ecs::ComponentStore;
use framegraph_render::{
    BackendError, CircularDependency, FrameReport, GraphConfig, GraphError, GraphicsBackend,
    RenderGraph,
};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The scene itself is broken; retrying cannot help.
    #[error("scene has a dependency cycle")]
    Authoring(#[source] CircularDependency),
    #[error("giving up after {failures} consecutive failed frames")]
    GaveUp {
        failures: u32,
        #[source]
        last: GraphError,
    },
    #[error(transparent)]
    Scene(#[from] AuthorError),
    #[error("resize failed")]
    Resize(#[source] BackendError),
}

/// Result of one frame that did not end the run.
#[derive(Debug)]
pub enum FrameOutcome {
    Rendered(FrameReport),
    /// The backend failed; the cache was dropped and the next frame retries.
    Failed(GraphError),
}

/// Owns everything a frame touches and applies the retry policy.
pub struct FrameDriver<B: GraphicsBackend> {
    scene: ErosionScene,
    graph: RenderGraph,
    erosion: ErosionSystem,
    backend: B,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    frames_rendered: u64,
    frames_failed: u64,
}

impl<B: GraphicsBackend> FrameDriver<B> {
    pub fn new(
        scene: ErosionScene,
        backend: B,
        graph_config: GraphConfig,
        seed: u64,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            scene,
            graph: RenderGraph::new(graph_config),
            erosion: ErosionSystem::new(seed),
            backend,
            max_consecutive_failures: max_consecutive_failures.max(1),
            consecutive_failures: 0,
            frames_rendered: 0,
            frames_failed: 0,
        }
    }

    /// Step erosion, then run the graph once.
    pub fn frame(&mut self) -> Result<FrameOutcome, DriverError> {
        self.erosion.step(&mut self.scene.store);

        match self.graph.run(&self.scene.store, &mut self.backend) {
            Ok(report) => {
                self.consecutive_failures = 0;
                self.frames_rendered += 1;
                Ok(FrameOutcome::Rendered(report))
            }
            Err(GraphError::CircularDependency(cycle)) => Err(DriverError::Authoring(cycle)),
            Err(err) => {
                self.consecutive_failures += 1;
                self.frames_failed += 1;
                tracing::warn!(
                    error = %err,
                    failures = self.consecutive_failures,
                    backend = self.backend.name(),
                    "frame failed; invalidating backend objects"
                );
                self.graph.invalidate();
                if self.consecutive_failures >= self.max_consecutive_failures {
                    return Err(DriverError::GaveUp {
                        failures: self.consecutive_failures,
                        last: err,
                    });
                }
                Ok(FrameOutcome::Failed(err))
            }
        }
    }

    /// Rebuild the scene at the new size and drop every backend object.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), DriverError> {
        self.scene = build_erosion_scene(width, height)?;
        self.graph
            .resize(&mut self.backend, width, height)
            .map_err(DriverError::Resize)?;
        tracing::info!(width, height, "scene resized");
        Ok(())
    }

    pub fn scene(&self) -> &ErosionScene {
        &self.scene
    }

    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.scene.store
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_failed(&self) -> u64 {
        self.frames_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framegraph_ecs::{Dependency, ErosionParams};
    use framegraph_render::{BackendCall, RecordingBackend};

    fn driver(max_failures: u32) -> FrameDriver<RecordingBackend> {
        let scene = build_erosion_scene(32, 32).unwrap();
        FrameDriver::new(
            scene,
            RecordingBackend::new(),
            GraphConfig::default(),
            7,
            max_failures,
        )
    }

    #[test]
    fn frames_dispatch_erosion_then_draw() {
        let mut driver = driver(3);
        for _ in 0..3 {
            match driver.frame().unwrap() {
                FrameOutcome::Rendered(report) => {
                    let scene = driver.scene();
                    assert_eq!(report.dispatched, vec![scene.erosion_pass, scene.render_pass]);
                }
                FrameOutcome::Failed(err) => panic!("unexpected failure: {err}"),
            }
        }
        assert_eq!(driver.frames_rendered(), 3);

        let params = driver.scene().params;
        let iterations = driver
            .scene()
            .store
            .get_component::<ErosionParams>(params)
            .map(|p| p.iterations);
        assert_eq!(iterations, Some(3));
        // Parameter buffer is re-uploaded every frame.
        assert_eq!(
            driver.backend().count(|c| matches!(c, BackendCall::WriteBuffer { .. })),
            3
        );
    }

    #[test]
    fn backend_failure_invalidates_and_recovers() {
        let mut driver = driver(3);
        driver.frame().unwrap();

        driver.backend_mut().fail_submission(1, BackendError::DeviceLost);
        assert!(matches!(driver.frame().unwrap(), FrameOutcome::Failed(_)));
        assert!(driver.graph().cache().is_empty());

        assert!(matches!(driver.frame().unwrap(), FrameOutcome::Rendered(_)));
        assert_eq!(driver.frames_failed(), 1);
        assert_eq!(driver.frames_rendered(), 2);
    }

    #[test]
    fn gives_up_after_consecutive_failures() {
        let mut driver = driver(2);
        driver.backend_mut().fail_submission(1, BackendError::DeviceLost);
        assert!(matches!(driver.frame().unwrap(), FrameOutcome::Failed(_)));

        driver.backend_mut().fail_submission(1, BackendError::DeviceLost);
        let err = driver.frame().unwrap_err();
        assert!(matches!(err, DriverError::GaveUp { failures: 2, .. }));
    }

    #[test]
    fn cycle_is_fatal() {
        let mut driver = driver(3);
        let (render, a, b) = {
            let scene = driver.scene();
            (scene.render_pass, scene.heightmap_a, scene.heightmap_b)
        };
        driver
            .store_mut()
            .add_component(render, Dependency::new(vec![b], vec![a]))
            .unwrap();

        assert!(matches!(driver.frame(), Err(DriverError::Authoring(_))));
        assert!(driver.backend().calls().is_empty());
    }

    #[test]
    fn resize_rebuilds_scene_and_cache() {
        let mut driver = driver(3);
        driver.frame().unwrap();
        driver.resize(64, 16).unwrap();

        assert_eq!(driver.scene().size, glam::UVec2::new(64, 16));
        assert_eq!(driver.graph().cache().generation(), 1);
        assert!(
            driver
                .backend()
                .calls()
                .contains(&BackendCall::Resize { width: 64, height: 16 })
        );
        assert!(matches!(driver.frame().unwrap(), FrameOutcome::Rendered(_)));
    }
}
