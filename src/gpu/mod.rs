//! GPU device, resources and passes.
//!
//! [`GpuContext`] owns the adapter, device and queue. Everything else in
//! this module is a pass or a resource recorded against it: the agent kernel
//! ([`kernel`]), the agent compositor ([`compositor`]), the full-screen image
//! stages ([`stages`]) and diagnostic readback ([`readback`]).

pub mod compositor;
pub mod kernel;
pub mod readback;
pub mod resources;
pub mod shaders;
pub mod stages;

use crate::error::{GpuError, PipelineError};
use resources::TargetFormat;

pub const WORKGROUP_SIZE: u32 = 256;

/// Adapter, device and queue shared by every pass.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Request an adapter (compatible with `surface` when given) and a device.
    pub async fn new(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        Self::request(instance, surface, false).await
    }

    async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
        force_fallback_adapter: bool,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        // Without this feature the device only exposes the WebGPU baseline,
        // where Rgba32Float is never blendable.
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ants Device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Create a context with no surface, for tests and offscreen use.
    ///
    /// Prefers a hardware adapter on a primary backend and falls back to a
    /// software adapter (llvmpipe, WARP) on any backend.
    pub fn headless() -> Result<Self, GpuError> {
        let primary = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        match pollster::block_on(Self::request(&primary, None, false)) {
            Err(GpuError::NoAdapter) => {
                log::warn!("no hardware adapter, trying a software fallback");
                let any = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                    backends: wgpu::Backends::all(),
                    ..Default::default()
                });
                pollster::block_on(Self::request(&any, None, true))
            }
            result => result,
        }
    }

    /// Whether `format` can be rendered to and blended on this device.
    pub fn supports_hdr_target(&self, format: TargetFormat) -> bool {
        let wgpu_format = format.to_wgpu();
        let features = if self
            .device
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
        {
            self.adapter.get_texture_format_features(wgpu_format)
        } else {
            wgpu_format.guaranteed_format_features(self.device.features())
        };
        features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
            && features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
    }

    /// Run `build` inside a validation error scope.
    ///
    /// Shader compilation and pipeline linking errors are reported as
    /// [`PipelineError::ShaderBuild`] instead of reaching the device's
    /// uncaptured error handler.
    pub fn build_checked<T>(
        &self,
        stage: &'static str,
        build: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, PipelineError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            None => {
                log::debug!("built `{stage}` pipeline");
                Ok(value)
            }
            Some(err) => {
                let diagnostic = err.to_string();
                log::error!("`{stage}` failed to build:\n{diagnostic}");
                Err(PipelineError::ShaderBuild { stage, diagnostic })
            }
        }
    }

    pub fn uniform_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}
