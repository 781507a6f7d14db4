//! Instanced point rendering of agents.
//!
//! One draw of N point instances per target. The agent state buffer is bound
//! directly as an instance vertex buffer: position at offset 0, angle at
//! offset 8, stride 12. The palette entry is picked in the vertex shader from
//! `instance_index / divisor`.

use bytemuck::{Pod, Zeroable};

use super::resources::{AgentBuffer, RenderTarget, TargetFormat};
use super::{shaders, GpuContext};
use crate::canvas::CanvasSize;
use crate::config::SimConfig;
use crate::double_buffer::ResourceId;
use crate::error::PipelineError;
use crate::palette::MAX_PALETTE;
use crate::spawn::Agent;

/// Per-frame part of the paint uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PaintFrame {
    /// Position multiplier; 0.5 for the half-resolution sensing target.
    pub scale: f32,
    pub color_factor: f32,
    pub color_divisor: u32,
    pub palette_len: u32,
    pub palette: [[f32; 4]; MAX_PALETTE],
}

impl PaintFrame {
    pub fn new(config: &SimConfig, scale: f32, color_factor: f32) -> Self {
        Self {
            scale,
            color_factor,
            color_divisor: config.palette.divisor(config.population),
            palette_len: config.palette.len() as u32,
            palette: config.palette.to_gpu(),
        }
    }
}

/// Uniform block of the paint shader. Layout matches `PaintParams` in WGSL.
///
/// The projection only changes on resize; [`PaintFrame`] is rewritten
/// every frame at [`PAINT_FRAME_OFFSET`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PaintParams {
    pub projection: [[f32; 4]; 4],
    pub frame: PaintFrame,
}

pub const PAINT_FRAME_OFFSET: u64 = std::mem::offset_of!(PaintParams, frame) as u64;

const AGENT_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: 8,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32,
    },
];

fn agent_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: Agent::STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &AGENT_ATTRIBUTES,
    }
}

/// A point pipeline, its uniform buffer and bind group for one target kind.
struct PaintTarget {
    pipeline: wgpu::RenderPipeline,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// Size the uploaded projection was built for.
    size: CanvasSize,
}

impl PaintTarget {
    fn new(
        gpu: &GpuContext,
        label: &'static str,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Result<Self, PipelineError> {
        let params = gpu.uniform_buffer(label, std::mem::size_of::<PaintParams>() as u64);

        gpu.build_checked(label, |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shaders::AGENT_PAINT.into()),
            });

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                }],
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
                    buffers: &[agent_vertex_layout()],
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
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            (pipeline, bind_group)
        })
        .map(|(pipeline, bind_group)| Self {
            pipeline,
            params,
            bind_group,
            size: CanvasSize::new(1, 1),
        })
    }

    fn set_projection(&mut self, queue: &wgpu::Queue, size: CanvasSize) {
        let projection = size.projection().to_cols_array_2d();
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&projection));
        self.size = size;
    }

    fn write_frame(&self, queue: &wgpu::Queue, frame: &PaintFrame) {
        queue.write_buffer(&self.params, PAINT_FRAME_OFFSET, bytemuck::bytes_of(frame));
    }

    fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        agents: &AgentBuffer,
        target: &RenderTarget,
        count: u32,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Agent Paint Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, agents.buffer.slice(..));
        pass.draw(0..1, 0..count);
    }
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Paints agents into the HDR trail (additive) and the sensing target
/// (replace, half resolution).
pub struct AgentCompositor {
    trail: PaintTarget,
    sensing: PaintTarget,
    projection_uploads: u64,
}

impl AgentCompositor {
    pub fn new(
        gpu: &GpuContext,
        hdr_format: TargetFormat,
        canvas: CanvasSize,
    ) -> Result<Self, PipelineError> {
        let mut compositor = Self {
            trail: PaintTarget::new(gpu, "Paint Trail", hdr_format.to_wgpu(), Some(ADDITIVE))?,
            sensing: PaintTarget::new(
                gpu,
                "Paint Sensing",
                TargetFormat::Rgba8.to_wgpu(),
                None,
            )?,
            projection_uploads: 0,
        };
        compositor.resize(&gpu.queue, canvas);
        Ok(compositor)
    }

    /// Rebuild both projections for a new canvas size.
    pub fn resize(&mut self, queue: &wgpu::Queue, canvas: CanvasSize) {
        self.trail.set_projection(queue, canvas);
        self.sensing.set_projection(queue, canvas.sensing());
        self.projection_uploads += 1;
    }

    /// Sizes the trail and sensing projections were built for.
    pub fn projection_sizes(&self) -> (CanvasSize, CanvasSize) {
        (self.trail.size, self.sensing.size)
    }

    /// Number of times the projections were uploaded.
    pub fn projection_uploads(&self) -> u64 {
        self.projection_uploads
    }

    /// Paint into the trail output. `sampled` lists every texture bound as an
    /// input this frame; painting into one of them is a bug.
    pub fn paint_trail(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        config: &SimConfig,
        agents: &AgentBuffer,
        target: &RenderTarget,
        sampled: &[ResourceId],
    ) {
        assert!(
            !sampled.contains(&target.id()),
            "trail paint target is bound as a sampled input"
        );
        debug_assert_eq!(target.size, self.trail.size, "trail projection is stale");
        let frame = PaintFrame::new(config, 1.0, config.float_texture_color_factor);
        self.trail.write_frame(&gpu.queue, &frame);
        self.trail.draw(encoder, agents, target, config.population);
    }

    /// Paint into the sensing output at half scale.
    pub fn paint_sensing(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        config: &SimConfig,
        agents: &AgentBuffer,
        target: &RenderTarget,
        sampled: &[ResourceId],
    ) {
        assert!(
            !sampled.contains(&target.id()),
            "sensing paint target is bound as a sampled input"
        );
        debug_assert_eq!(target.size, self.sensing.size, "sensing projection is stale");
        let frame = PaintFrame::new(config, 0.5, config.rgb8_texture_color_factor);
        self.sensing.write_frame(&gpu.queue, &frame);
        self.sensing.draw(encoder, agents, target, config.population);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<PaintParams>(), 336);
        assert_eq!(PAINT_FRAME_OFFSET, 64);
        assert_eq!(PAINT_FRAME_OFFSET as usize + std::mem::offset_of!(PaintFrame, palette), 80);
    }

    #[test]
    fn frame_block_carries_no_projection() {
        let config = SimConfig {
            population: 9,
            ..SimConfig::default()
        };
        let frame = PaintFrame::new(&config, 0.5, 1.0);
        assert_eq!(frame.scale, 0.5);
        assert_eq!(frame.color_divisor, 3);
        assert_eq!(
            std::mem::size_of::<PaintFrame>() as u64 + PAINT_FRAME_OFFSET,
            std::mem::size_of::<PaintParams>() as u64
        );
    }

    #[test]
    fn vertex_layout_matches_agent() {
        let layout = agent_vertex_layout();
        assert_eq!(layout.array_stride, 12);
        assert_eq!(layout.attributes[1].offset, std::mem::offset_of!(Agent, angle) as u64);
    }
}
