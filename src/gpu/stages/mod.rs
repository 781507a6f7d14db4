//! Full-screen image stages.
//!
//! Each stage is an owned object: it builds its pipeline once in
//! [`PipelineStage::init`], owns the targets it writes (except ping-pong
//! halves, which belong to their pair) and records one or more passes per
//! frame in [`PipelineStage::update`].

pub mod blur;
pub mod decay;
pub mod display;
pub mod merge;
pub mod threshold;

pub use blur::{BlurPass, BlurStage};
pub use decay::DecayStage;
pub use display::{DisplayInputs, DisplayStage};
pub use merge::{MergeInputs, MergeStage};
pub use threshold::ThresholdStage;

use super::shaders;
use super::GpuContext;
use crate::double_buffer::ResourceId;
use crate::error::PipelineError;
use crate::gpu::resources::RenderTarget;

/// A named GPU stage with per-frame inputs.
pub trait PipelineStage: Sized {
    /// Construction parameters.
    type Settings;
    /// What one `update` call reads and writes.
    type Inputs<'a>;

    const NAME: &'static str;

    fn init(gpu: &GpuContext, settings: Self::Settings) -> Result<Self, PipelineError>;

    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        inputs: Self::Inputs<'_>,
    ) -> Result<(), PipelineError>;
}

/// Source and destination of a single pass.
#[derive(Clone, Copy)]
pub struct StageIo<'a> {
    pub input: &'a RenderTarget,
    pub output: &'a RenderTarget,
}

impl<'a> StageIo<'a> {
    pub fn new(input: &'a RenderTarget, output: &'a RenderTarget) -> Self {
        Self { input, output }
    }

    /// Fail when the pass would sample the texture it renders to.
    pub fn check(&self, stage: &'static str) -> Result<(), PipelineError> {
        check_distinct(stage, &[self.input.id()], self.output.id())
    }
}

/// Fail when `write` is one of `reads`.
pub fn check_distinct(
    stage: &'static str,
    reads: &[ResourceId],
    write: ResourceId,
) -> Result<(), PipelineError> {
    if reads.contains(&write) {
        log::error!("`{stage}` would read and write resource #{}", write.raw());
        return Err(PipelineError::PingPongViolation {
            stage,
            resource: format!("resource #{}", write.raw()),
        });
    }
    Ok(())
}

/// A render pipeline drawing six vertices over the whole destination.
///
/// Bind group 0 holds `textures` sampled textures at bindings `0..textures`,
/// followed by an optional uniform buffer.
pub struct FullscreenPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    textures: u32,
    has_uniform: bool,
}

impl FullscreenPass {
    pub fn new(
        gpu: &GpuContext,
        label: &'static str,
        fragment: &str,
        textures: u32,
        has_uniform: bool,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Result<Self, PipelineError> {
        Self::from_source(
            gpu,
            label,
            &shaders::fullscreen_shader(fragment),
            textures,
            has_uniform,
            format,
            blend,
        )
    }

    /// Like [`FullscreenPass::new`] with an already assembled shader.
    pub fn from_source(
        gpu: &GpuContext,
        label: &'static str,
        source: &str,
        textures: u32,
        has_uniform: bool,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Result<Self, PipelineError> {
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..textures)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        if has_uniform {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: textures,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        gpu.build_checked(label, |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            Self {
                label,
                pipeline,
                layout,
                textures,
                has_uniform,
            }
        })
    }

    /// Bind `textures` in order, then `uniform` if the pass has one.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        textures: &[&wgpu::TextureView],
        uniform: Option<&wgpu::Buffer>,
    ) -> wgpu::BindGroup {
        debug_assert_eq!(textures.len() as u32, self.textures);
        debug_assert_eq!(uniform.is_some(), self.has_uniform);

        let mut entries: Vec<wgpu::BindGroupEntry> = textures
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        if let Some(buffer) = uniform {
            entries.push(wgpu::BindGroupEntry {
                binding: self.textures,
                resource: buffer.as_entire_binding(),
            });
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        })
    }

    /// Record one draw into `target`.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
        load: wgpu::LoadOp<wgpu::Color>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..6, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ids_pass() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert!(check_distinct("decay", &[a], b).is_ok());
    }

    #[test]
    fn aliased_ids_fail() {
        let a = ResourceId::next();
        let err = check_distinct("threshold", &[ResourceId::next(), a], a).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PingPongViolation { stage: "threshold", .. }
        ));
    }
}
