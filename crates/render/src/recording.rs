//! In-memory backend that records every call.
//!
//! Hands out sequential handles from a single counter, so objects created
//! after an invalidation never reuse an earlier handle. Used by tests and by
//! the CLI when no GPU is wanted.

use std::collections::HashMap;

use framegraph_ecs::TextureFormat;
use glam::UVec3;

use crate::backend::{
    BackendError, BackendResult, BindingSetDescriptor, BindingSetHandle, BufferDescriptor,
    BufferHandle, GraphicsBackend, PipelineDescriptor, PipelineHandle, ResourceHandle,
    SamplerDescriptor, SamplerHandle, TextureDescriptor, TextureHandle,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateTexture {
        handle: TextureHandle,
        label: String,
        format: TextureFormat,
        width: u32,
        height: u32,
        usage: u32,
    },
    CreateBuffer {
        handle: BufferHandle,
        label: String,
        size: u64,
        usage: u32,
    },
    WriteBuffer {
        buffer: BufferHandle,
        len: usize,
    },
    CreateSampler {
        handle: SamplerHandle,
        label: String,
    },
    CreatePipeline {
        handle: PipelineHandle,
        label: String,
    },
    CreateBindingSet {
        handle: BindingSetHandle,
        pipeline: PipelineHandle,
        group: u32,
        resources: Vec<ResourceHandle>,
    },
    SubmitCompute {
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        workgroups: UVec3,
    },
    SubmitDraw {
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        vertex_count: u32,
    },
    Resize {
        width: u32,
        height: u32,
    },
}

impl BackendCall {
    pub fn is_submission(&self) -> bool {
        matches!(self, Self::SubmitCompute { .. } | Self::SubmitDraw { .. })
    }
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    next_handle: u64,
    pipeline_labels: HashMap<PipelineHandle, String>,
    buffer_sizes: HashMap<BufferHandle, u64>,
    submissions_attempted: usize,
    fail_submission: Option<(usize, BackendError)>,
    fail_pipeline: Option<BackendError>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn submissions(&self) -> impl Iterator<Item = &BackendCall> {
        self.calls.iter().filter(|c| c.is_submission())
    }

    /// Labels of the pipelines submitted so far, in submission order.
    pub fn submitted_labels(&self) -> Vec<&str> {
        self.submissions()
            .filter_map(|call| match call {
                BackendCall::SubmitCompute { pipeline, .. } | BackendCall::SubmitDraw { pipeline, .. } => {
                    self.pipeline_labels.get(pipeline).map(String::as_str)
                }
                _ => None,
            })
            .collect()
    }

    pub fn pipeline_label(&self, pipeline: PipelineHandle) -> Option<&str> {
        self.pipeline_labels.get(&pipeline).map(String::as_str)
    }

    /// Make the `nth` submission from now (1-based) fail once with `error`.
    pub fn fail_submission(&mut self, nth: usize, error: BackendError) {
        self.fail_submission = Some((self.submissions_attempted + nth.max(1), error));
    }

    /// Make the next pipeline creation fail once with `error`.
    pub fn fail_pipeline_creation(&mut self, error: BackendError) {
        self.fail_pipeline = Some(error);
    }

    /// Create a pipeline without going through a descriptor.
    pub fn register_pipeline(&mut self, label: &str) -> PipelineHandle {
        let handle = PipelineHandle(self.next_id());
        self.pipeline_labels.insert(handle, label.to_string());
        handle
    }

    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check_submission(&mut self, pipeline: PipelineHandle) -> BackendResult<()> {
        self.submissions_attempted += 1;
        let due = matches!(&self.fail_submission, Some((nth, _)) if *nth == self.submissions_attempted);
        if due && let Some((_, error)) = self.fail_submission.take() {
            return Err(error);
        }
        if !self.pipeline_labels.contains_key(&pipeline) {
            return Err(BackendError::InvalidHandle(format!("pipeline {}", pipeline.raw())));
        }
        Ok(())
    }
}

impl GraphicsBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreation(format!(
                "{}: zero-sized {}x{}",
                desc.label, desc.width, desc.height
            )));
        }
        let handle = TextureHandle(self.next_id());
        self.calls.push(BackendCall::CreateTexture {
            handle,
            label: desc.label.clone(),
            format: desc.format,
            width: desc.width,
            height: desc.height,
            usage: desc.usage,
        });
        Ok(handle)
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if desc.size == 0 {
            return Err(BackendError::BufferCreation(format!("{}: zero-sized", desc.label)));
        }
        let handle = BufferHandle(self.next_id());
        self.buffer_sizes.insert(handle, desc.size);
        self.calls.push(BackendCall::CreateBuffer {
            handle,
            label: desc.label.clone(),
            size: desc.size,
            usage: desc.usage,
        });
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> BackendResult<()> {
        match self.buffer_sizes.get(&buffer) {
            None => Err(BackendError::InvalidHandle(format!("buffer {}", buffer.raw()))),
            Some(size) if data.len() as u64 > *size => Err(BackendError::Submission(format!(
                "write of {} bytes into buffer of {size}",
                data.len()
            ))),
            Some(_) => {
                self.calls.push(BackendCall::WriteBuffer {
                    buffer,
                    len: data.len(),
                });
                Ok(())
            }
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let handle = SamplerHandle(self.next_id());
        self.calls.push(BackendCall::CreateSampler {
            handle,
            label: desc.label.clone(),
        });
        Ok(handle)
    }

    fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<PipelineHandle> {
        if let Some(error) = self.fail_pipeline.take() {
            return Err(error);
        }
        let handle = PipelineHandle(self.next_id());
        self.pipeline_labels.insert(handle, desc.label().to_string());
        self.calls.push(BackendCall::CreatePipeline {
            handle,
            label: desc.label().to_string(),
        });
        Ok(handle)
    }

    fn create_binding_set(
        &mut self,
        pipeline: PipelineHandle,
        desc: &BindingSetDescriptor,
    ) -> BackendResult<BindingSetHandle> {
        if !self.pipeline_labels.contains_key(&pipeline) {
            return Err(BackendError::InvalidHandle(format!("pipeline {}", pipeline.raw())));
        }
        let handle = BindingSetHandle(self.next_id());
        self.calls.push(BackendCall::CreateBindingSet {
            handle,
            pipeline,
            group: desc.group,
            resources: desc.resources.clone(),
        });
        Ok(handle)
    }

    fn submit_compute(
        &mut self,
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        workgroups: UVec3,
    ) -> BackendResult<()> {
        self.check_submission(pipeline)?;
        self.calls.push(BackendCall::SubmitCompute {
            pipeline,
            binding,
            workgroups,
        });
        Ok(())
    }

    fn submit_draw(
        &mut self,
        pipeline: PipelineHandle,
        binding: Option<BindingSetHandle>,
        vertex_count: u32,
    ) -> BackendResult<()> {
        self.check_submission(pipeline)?;
        self.calls.push(BackendCall::SubmitDraw {
            pipeline,
            binding,
            vertex_count,
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> BackendResult<()> {
        self.calls.push(BackendCall::Resize { width, height });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framegraph_ecs::Topology;

    fn render_desc(label: &str) -> PipelineDescriptor {
        PipelineDescriptor::Render {
            label: label.to_string(),
            vertex_shader: "vertex.wgsl".to_string(),
            fragment_shader: "fragment.wgsl".to_string(),
            topology: Topology::TriangleList,
        }
    }

    #[test]
    fn handles_are_sequential_across_kinds() {
        let mut backend = RecordingBackend::new();
        let tex = backend
            .create_texture(&TextureDescriptor {
                label: "t".into(),
                format: TextureFormat::Rgba8Unorm,
                width: 2,
                height: 2,
                usage: 0,
            })
            .unwrap();
        let sampler = backend
            .create_sampler(&SamplerDescriptor { label: "s".into() })
            .unwrap();
        assert_eq!(tex.raw() + 1, sampler.raw());
    }

    #[test]
    fn nth_submission_fails_once() {
        let mut backend = RecordingBackend::new();
        let pipeline = backend.create_pipeline(&render_desc("p")).unwrap();
        backend.fail_submission(2, BackendError::OutOfMemory);

        backend.submit_draw(pipeline, None, 3).unwrap();
        assert_eq!(
            backend.submit_draw(pipeline, None, 3),
            Err(BackendError::OutOfMemory)
        );
        backend.submit_draw(pipeline, None, 3).unwrap();
        assert_eq!(backend.submissions().count(), 2);
        assert_eq!(backend.submitted_labels(), vec!["p", "p"]);
    }

    #[test]
    fn pipeline_failure_is_one_shot() {
        let mut backend = RecordingBackend::new();
        backend.fail_pipeline_creation(BackendError::PipelineCreation("bad".into()));
        assert!(backend.create_pipeline(&render_desc("p")).is_err());
        assert!(backend.create_pipeline(&render_desc("p")).is_ok());
    }

    #[test]
    fn unknown_pipeline_is_rejected() {
        let mut backend = RecordingBackend::new();
        let err = backend.submit_draw(PipelineHandle(99), None, 3).unwrap_err();
        assert!(matches!(err, BackendError::InvalidHandle(_)));
    }

    #[test]
    fn oversize_write_is_rejected() {
        let mut backend = RecordingBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: "b".into(),
                size: 4,
                usage: 0,
            })
            .unwrap();
        assert!(backend.write_buffer(buffer, &[0; 8]).is_err());
        backend.write_buffer(buffer, &[0; 4]).unwrap();
    }
}
