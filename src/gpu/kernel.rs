//! Agent update compute pass.
//!
//! Reads the current half of the agent state pair and the sensing texture,
//! writes the updated agents into the other half. The caller swaps the pair
//! once the pass is recorded.

use bytemuck::{Pod, Zeroable};

use super::resources::{AgentBuffer, RenderTarget};
use super::stages::{check_distinct, PipelineStage};
use super::{shaders, GpuContext, WORKGROUP_SIZE};
use crate::canvas::CanvasSize;
use crate::config::SimConfig;
use crate::double_buffer::DoubleBuffer;
use crate::error::PipelineError;
use crate::palette::MAX_PALETTE;

/// Uniform block of the agent kernel. Layout matches `KernelParams` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KernelParams {
    pub canvas_size: [f32; 2],
    pub texture_size: [f32; 2],
    pub speed: f32,
    /// Radians per second.
    pub rotation_speed: f32,
    /// Radians.
    pub sense_spread: f32,
    pub sense_length: f32,
    pub sense_size: u32,
    /// Whole elapsed seconds, seeds the random turn.
    pub time: u32,
    pub delta_time: f32,
    pub agent_count: u32,
    pub color_divisor: u32,
    pub palette_len: u32,
    pub _pad: [u32; 2],
    pub palette: [[f32; 4]; MAX_PALETTE],
}

impl KernelParams {
    pub fn new(
        config: &SimConfig,
        canvas: CanvasSize,
        sensing: CanvasSize,
        time: u32,
        delta_time: f32,
    ) -> Self {
        let p = &config.agent_params;
        Self {
            canvas_size: canvas.as_vec2(),
            texture_size: sensing.as_vec2(),
            speed: p.speed,
            rotation_speed: p.rotation_speed.to_radians(),
            sense_spread: p.sense_spread.to_radians(),
            sense_length: p.sense_length,
            sense_size: p.sense_size,
            time,
            delta_time,
            agent_count: config.population,
            color_divisor: config.palette.divisor(config.population),
            palette_len: config.palette.len() as u32,
            _pad: [0; 2],
            palette: config.palette.to_gpu(),
        }
    }
}

pub struct KernelInputs<'a> {
    pub agents: &'a DoubleBuffer<AgentBuffer>,
    pub sensing: &'a RenderTarget,
    pub params: KernelParams,
}

pub struct AgentKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
}

impl PipelineStage for AgentKernel {
    type Settings = ();
    type Inputs<'a> = KernelInputs<'a>;

    const NAME: &'static str = "agent kernel";

    fn init(gpu: &GpuContext, _settings: ()) -> Result<Self, PipelineError> {
        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let (pipeline, layout) = gpu.build_checked(Self::NAME, |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Agent Kernel"),
                source: wgpu::ShaderSource::Wgsl(shaders::AGENT_KERNEL.into()),
            });

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Agent Kernel Bind Group Layout"),
                entries: &[
                    storage(0, true),
                    storage(1, false),
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Agent Kernel Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Agent Kernel Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("cs_main"),
                compilation_options: Default::default(),
                cache: None,
            });

            (pipeline, layout)
        })?;

        let params = gpu.uniform_buffer(
            "Agent Kernel Params",
            std::mem::size_of::<KernelParams>() as u64,
        );

        Ok(Self {
            pipeline,
            layout,
            params,
        })
    }

    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        inputs: KernelInputs<'_>,
    ) -> Result<(), PipelineError> {
        let agents = inputs.agents;
        check_distinct(Self::NAME, &[agents.current_id()], agents.other_id())?;

        gpu.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&inputs.params));

        let count = inputs.params.agent_count;
        if count == 0 {
            return Ok(());
        }

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Agent Kernel Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: agents.current().buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: agents.other().buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&inputs.sensing.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.params.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Agent Kernel Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Palette;

    #[test]
    fn params_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 320);
        assert_eq!(std::mem::offset_of!(KernelParams, palette), 64);
    }

    #[test]
    fn params_convert_angles_and_divisor() {
        let config = SimConfig {
            population: 10,
            palette: Palette::default(),
            ..SimConfig::default()
        };
        let canvas = CanvasSize::new(200, 100);
        let params = KernelParams::new(&config, canvas, canvas.sensing(), 3, 0.016);
        assert!((params.rotation_speed - std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(params.color_divisor, 4);
        assert_eq!(params.palette_len, 3);
        assert_eq!(params.texture_size, [100.0, 50.0]);
        assert_eq!(params.time, 3);
    }
}
