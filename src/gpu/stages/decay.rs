//! Exponential falloff of a ping-pong pair.
//!
//! `factor` is the fraction lost over one reference frame of
//! [`REFERENCE_DELTA`] seconds. A stage that tracks frame time scales the
//! loss so trail lifetime does not depend on the refresh rate; the sensing
//! stage never does and loses exactly `factor` per frame.

use bytemuck::{Pod, Zeroable};

use super::{FullscreenPass, PipelineStage, StageIo};
use crate::error::PipelineError;
use crate::gpu::resources::TargetFormat;
use crate::gpu::{shaders, GpuContext};

/// Frame length at which `factor` is lost exactly once.
pub const REFERENCE_DELTA: f32 = 1.0 / 60.0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DecayUniforms {
    retain: f32,
    _pad: [f32; 3],
}

/// Multiplier applied to every texel: `(1 - factor)^frames`.
///
/// `factor == 0` keeps the input bit for bit and `factor >= 1` clears it,
/// whatever the frame length.
pub fn retain(factor: f32, frames: f32) -> f32 {
    if factor <= 0.0 {
        1.0
    } else if factor >= 1.0 {
        0.0
    } else {
        (1.0 - factor).powf(frames.max(0.0))
    }
}

pub struct DecaySettings {
    pub label: &'static str,
    pub format: TargetFormat,
    pub factor: f32,
}

/// `out = max(in * retain, 0)`, read from one half of a pair and written to
/// the other.
pub struct DecayStage {
    pass: FullscreenPass,
    params: wgpu::Buffer,
    factor: f32,
    /// Frame length in reference frames.
    frames: f32,
}

impl DecayStage {
    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn retain(&self) -> f32 {
        retain(self.factor, self.frames)
    }

    pub fn set_factor(&mut self, queue: &wgpu::Queue, factor: f32) {
        self.factor = factor;
        self.upload(queue);
    }

    /// Scale the next passes to a frame of `delta_time` seconds.
    pub fn set_delta_time(&mut self, queue: &wgpu::Queue, delta_time: f32) {
        let frames = delta_time / REFERENCE_DELTA;
        if frames != self.frames {
            self.frames = frames;
            self.upload(queue);
        }
    }

    fn upload(&self, queue: &wgpu::Queue) {
        let uniforms = DecayUniforms {
            retain: self.retain(),
            _pad: [0.0; 3],
        };
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&uniforms));
    }
}

impl PipelineStage for DecayStage {
    type Settings = DecaySettings;
    type Inputs<'a> = StageIo<'a>;

    const NAME: &'static str = "decay";

    fn init(gpu: &GpuContext, settings: DecaySettings) -> Result<Self, PipelineError> {
        let pass = FullscreenPass::new(
            gpu,
            settings.label,
            shaders::DECAY_FRAGMENT,
            1,
            true,
            settings.format.to_wgpu(),
            None,
        )?;
        let params =
            gpu.uniform_buffer(settings.label, std::mem::size_of::<DecayUniforms>() as u64);
        let stage = Self {
            pass,
            params,
            factor: settings.factor,
            frames: 1.0,
        };
        stage.upload(&gpu.queue);
        Ok(stage)
    }

    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        io: StageIo<'_>,
    ) -> Result<(), PipelineError> {
        io.check(Self::NAME)?;
        let bind_group = self
            .pass
            .bind_group(&gpu.device, &[&io.input.view], Some(&self.params));
        self.pass.draw(
            encoder,
            &io.output.view,
            &bind_group,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_factor_is_identity_for_any_frame_length() {
        for frames in [0.0, 0.5, 1.0, 1.98, 40.0] {
            assert_eq!(retain(0.0, frames), 1.0);
        }
    }

    #[test]
    fn full_factor_clears_for_any_frame_length() {
        for frames in [0.0, 0.5, 1.0, 1.98] {
            assert_eq!(retain(1.0, frames), 0.0);
        }
    }

    #[test]
    fn one_reference_frame_loses_factor_once() {
        assert!((retain(0.25, 1.0) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn two_short_frames_match_one_long_frame() {
        let halves = retain(0.1, 0.5) * retain(0.1, 0.5);
        assert!((halves - retain(0.1, 1.0)).abs() < 1e-6);
        assert!((retain(0.1, 2.0) - 0.81).abs() < 1e-6);
    }

    #[test]
    fn stalled_frame_does_not_decay() {
        assert_eq!(retain(0.3, 0.0), 1.0);
    }
}
