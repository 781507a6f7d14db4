//! Final copy of the merged image to the presentation target.

use super::{check_distinct, FullscreenPass, PipelineStage};
use crate::double_buffer::ResourceId;
use crate::error::PipelineError;
use crate::gpu::resources::RenderTarget;
use crate::gpu::{shaders, GpuContext};
use crate::palette::Color;

pub struct DisplaySettings {
    pub format: wgpu::TextureFormat,
    pub background: Color,
}

pub struct DisplayInputs<'a> {
    pub source: &'a RenderTarget,
    pub target: &'a wgpu::TextureView,
    pub target_id: ResourceId,
}

/// Clears to the background colour, then copies every non-zero pixel of the
/// source, clamped to `0..=1`.
pub struct DisplayStage {
    pass: FullscreenPass,
    background: Color,
}

impl DisplayStage {
    pub fn set_background(&mut self, background: Color) {
        self.background = background;
    }

    pub fn background(&self) -> Color {
        self.background
    }
}

impl PipelineStage for DisplayStage {
    type Settings = DisplaySettings;
    type Inputs<'a> = DisplayInputs<'a>;

    const NAME: &'static str = "display";

    fn init(gpu: &GpuContext, settings: DisplaySettings) -> Result<Self, PipelineError> {
        let pass = FullscreenPass::new(
            gpu,
            "Display",
            shaders::DISPLAY_FRAGMENT,
            1,
            false,
            settings.format,
            None,
        )?;
        Ok(Self {
            pass,
            background: settings.background,
        })
    }

    fn update(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        inputs: DisplayInputs<'_>,
    ) -> Result<(), PipelineError> {
        check_distinct(Self::NAME, &[inputs.source.id()], inputs.target_id)?;
        let bind_group = self.pass.bind_group(&gpu.device, &[&inputs.source.view], None);
        self.pass.draw(
            encoder,
            inputs.target,
            &bind_group,
            wgpu::LoadOp::Clear(self.background.to_wgpu()),
        );
        Ok(())
    }
}
