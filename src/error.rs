//! Error types for the Ants pipeline.
//!
//! Initialization errors ([`GpuError`], [`PipelineError::Capability`],
//! [`PipelineError::ShaderBuild`]) abort start-up with a diagnostic. Per-frame
//! invariant breaches ([`PipelineError::PingPongViolation`]) drop a single
//! frame and never bring the application down.

use thiserror::Error;

/// Errors that can occur during GPU initialization or readback.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error(
        "no compatible GPU adapter found; ensure your system has a GPU with \
         Vulkan/Metal/DX12/GL support"
    )]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// Failed to map a buffer for reading.
    #[error("failed to map GPU buffer: {0}")]
    BufferMapping(String),
    /// A cooperative readback ran out of its poll budget.
    #[error("readback did not complete after {0} polls")]
    ReadbackTimeout(u32),
}

/// Errors raised while building or running the render pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Neither half-float nor full-float colour targets are renderable and blendable.
    #[error(
        "no HDR colour format is renderable and blendable on this adapter \
         (tried Rgba16Float, Rgba32Float)"
    )]
    Capability,
    /// A WGSL kernel failed to compile or its pipeline failed to link.
    #[error("failed to build `{stage}` kernel: {diagnostic}")]
    ShaderBuild {
        stage: &'static str,
        diagnostic: String,
    },
    /// A pass was about to read and write the same resource.
    #[error("ping-pong violation in `{stage}`: {resource} is both read and written")]
    PingPongViolation { stage: &'static str, resource: String },
    /// A pass named a blur scale the blur stage does not have.
    #[error("`{stage}` requested blur scale {scale}, but only {available} exist")]
    MissingScale {
        stage: &'static str,
        scale: u32,
        available: u32,
    },
}

/// Errors raised by configuration loading or parameter changes.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The parameter id is not one the simulation knows about.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// The parameter received a value of the wrong kind.
    #[error("parameter `{id}` expects a {expected} value")]
    WrongValueKind { id: &'static str, expected: &'static str },
    /// The value lies outside the accepted range.
    #[error("parameter `{id}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        id: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// The palette must hold between 1 and 16 colours.
    #[error("palette must hold between 1 and {max} colours, got {len}")]
    PaletteSize { len: usize, max: usize },
    /// Failed to read a configuration file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse a configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur when running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Failed to create event loop.
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    /// The render pipeline could not be built.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    /// The configuration was rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The presentation surface cannot hand out frames anymore.
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
