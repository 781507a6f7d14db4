//! Render targets, agent buffers and format selection.

use wgpu::util::DeviceExt;

use super::GpuContext;
use crate::canvas::CanvasSize;
use crate::double_buffer::{DoubleBuffer, Identified, ResourceId, Slot};
use crate::error::PipelineError;
use crate::spawn::Agent;

/// Colour formats used by the pipeline's targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Rgba8,
    Rgba16Float,
    Rgba32Float,
}

impl TargetFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TargetFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TargetFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TargetFormat::Rgba8 => 4,
            TargetFormat::Rgba16Float => 8,
            TargetFormat::Rgba32Float => 16,
        }
    }

    pub fn is_float(self) -> bool {
        !matches!(self, TargetFormat::Rgba8)
    }
}

/// Pick the HDR trail format.
///
/// Half float is preferred, full float is the fallback. `probe` reports
/// whether a format is both renderable and blendable.
pub fn select_hdr_format(
    probe: impl Fn(TargetFormat) -> bool,
    allow_fixed_point_fallback: bool,
) -> Result<TargetFormat, PipelineError> {
    for format in [TargetFormat::Rgba16Float, TargetFormat::Rgba32Float] {
        if probe(format) {
            log::debug!("HDR trail format: {format:?}");
            return Ok(format);
        }
    }
    if allow_fixed_point_fallback {
        log::warn!("no blendable float target available; trails fall back to 8-bit and will clip");
        return Ok(TargetFormat::Rgba8);
    }
    Err(PipelineError::Capability)
}

/// A 2D colour texture usable as both attachment and shader input.
#[derive(Debug)]
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: CanvasSize,
    pub format: TargetFormat,
    id: ResourceId,
}

impl Identified for RenderTarget {
    fn id(&self) -> ResourceId {
        self.id
    }
}

impl RenderTarget {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

pub fn create_render_target(
    gpu: &GpuContext,
    label: &str,
    size: CanvasSize,
    format: TargetFormat,
) -> RenderTarget {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: size.extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: format.to_wgpu(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    RenderTarget {
        texture,
        view,
        size,
        format,
        id: ResourceId::next(),
    }
}

/// Record a clear of `target` to transparent black.
pub fn clear_target(encoder: &mut wgpu::CommandEncoder, target: &RenderTarget) {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Clear Target"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &target.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
}

/// A ping-pong pair of targets, both cleared before first use.
pub fn create_double_target(
    gpu: &GpuContext,
    label: &str,
    size: CanvasSize,
    format: TargetFormat,
) -> DoubleBuffer<RenderTarget> {
    let pair = DoubleBuffer::from_fn(|slot| {
        let suffix = match slot {
            Slot::A => "A",
            Slot::B => "B",
        };
        create_render_target(gpu, &format!("{label} {suffix}"), size, format)
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Clear Double Target"),
        });
    clear_target(&mut encoder, pair.get(Slot::A));
    clear_target(&mut encoder, pair.get(Slot::B));
    gpu.queue.submit(Some(encoder.finish()));

    pair
}

/// One half of the agent state pair.
#[derive(Debug)]
pub struct AgentBuffer {
    pub buffer: wgpu::Buffer,
    id: ResourceId,
}

impl Identified for AgentBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }
}

/// Upload `agents` into both halves of a new state pair.
///
/// An empty population still gets a one-agent buffer so bindings stay valid.
pub fn create_agent_buffers(gpu: &GpuContext, agents: &[Agent]) -> DoubleBuffer<AgentBuffer> {
    let placeholder = [Agent::default()];
    let contents: &[Agent] = if agents.is_empty() { &placeholder } else { agents };

    DoubleBuffer::from_fn(|slot| {
        let label = match slot {
            Slot::A => "Agent Buffer A",
            Slot::B => "Agent Buffer B",
        };
        let buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            });
        AgentBuffer {
            buffer,
            id: ResourceId::next(),
        }
    })
}
