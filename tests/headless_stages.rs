//! Single stages run in isolation on seeded textures.
//!
//! Ignored by default like the full-pipeline scenarios; run with
//! `cargo test -- --ignored` on a machine with any adapter.

use ants::canvas::CanvasSize;
use ants::error::PipelineError;
use ants::gpu::readback::Readback;
use ants::gpu::resources::{create_render_target, RenderTarget, TargetFormat};
use ants::gpu::stages::blur::BlurSettings;
use ants::gpu::stages::decay::{DecaySettings, REFERENCE_DELTA};
use ants::gpu::stages::{BlurPass, BlurStage, DecayStage, PipelineStage, StageIo};
use ants::gpu::GpuContext;

const SIZE: CanvasSize = CanvasSize {
    width: 16,
    height: 8,
};

fn gpu() -> GpuContext {
    GpuContext::headless().unwrap_or_else(|e| panic!("no adapter, not even a fallback: {e}"))
}

/// An Rgba8 target holding a gradient with every byte non-zero.
fn seeded(gpu: &GpuContext) -> (RenderTarget, Vec<u8>) {
    let target = create_render_target(gpu, "Seeded", SIZE, TargetFormat::Rgba8);
    let bytes: Vec<u8> = (0..SIZE.width * SIZE.height * 4)
        .map(|i| 1 + (i * 37 % 254) as u8)
        .collect();
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(SIZE.width * 4),
            rows_per_image: Some(SIZE.height),
        },
        SIZE.extent(),
    );
    (target, bytes)
}

fn read(gpu: &GpuContext, target: &RenderTarget) -> Vec<u8> {
    Readback::texture(gpu, target).wait(&gpu.device).unwrap()
}

/// Run one decay pass from a seeded texture and return both halves.
fn decay_once(factor: f32, delta_time: Option<f32>) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let gpu = gpu();
    let (input, seed) = seeded(&gpu);
    let output = create_render_target(&gpu, "Decay Output", SIZE, TargetFormat::Rgba8);
    let mut stage = DecayStage::init(
        &gpu,
        DecaySettings {
            label: "Decay",
            format: TargetFormat::Rgba8,
            factor: 0.5,
        },
    )
    .unwrap();
    stage.set_factor(&gpu.queue, factor);
    if let Some(dt) = delta_time {
        stage.set_delta_time(&gpu.queue, dt);
    }

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    stage
        .update(&gpu, &mut encoder, StageIo::new(&input, &output))
        .unwrap();
    gpu.queue.submit(Some(encoder.finish()));

    (seed, read(&gpu, &input), read(&gpu, &output))
}

#[test]
#[ignore = "requires a GPU adapter"]
fn zero_decay_copies_every_byte() {
    let (seed, input, output) = decay_once(0.0, None);
    assert_eq!(input, seed);
    assert_eq!(output, seed);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn zero_decay_copies_every_byte_after_a_long_frame() {
    let (seed, _, output) = decay_once(0.0, Some(REFERENCE_DELTA * 3.7));
    assert_eq!(output, seed);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn full_decay_clears_every_byte() {
    let (seed, input, output) = decay_once(1.0, None);
    assert_eq!(input, seed);
    assert!(output.iter().all(|&b| b == 0), "{output:?}");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn decay_scales_with_frame_length() {
    let (seed, _, one) = decay_once(0.5, Some(REFERENCE_DELTA));
    let (_, _, two) = decay_once(0.5, Some(REFERENCE_DELTA * 2.0));
    for ((&s, &a), &b) in seed.iter().zip(&one).zip(&two) {
        let s = s as f32;
        assert!((a as f32 - s * 0.5).abs() <= 1.0, "{s} -> {a}");
        assert!((b as f32 - s * 0.25).abs() <= 1.0, "{s} -> {b}");
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn blur_rejects_a_scale_it_does_not_have() {
    let gpu = gpu();
    let (source, _) = seeded(&gpu);
    let blur = BlurStage::init(
        &gpu,
        BlurSettings {
            canvas: SIZE,
            format: TargetFormat::Rgba8,
            num_scales: 2,
        },
    )
    .unwrap();

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    blur.record(&gpu, &mut encoder, 1, BlurPass::Downscale, &source)
        .unwrap();
    let err = blur
        .record(&gpu, &mut encoder, 2, BlurPass::Vertical, &source)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingScale {
            stage: "blur vertical",
            scale: 2,
            available: 2,
        }
    ));
}
