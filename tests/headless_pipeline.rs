//! End-to-end frames on a headless device.
//!
//! These need an adapter (a software one such as llvmpipe is enough) and are
//! ignored by default. Run them with `cargo test -- --ignored`.

use ants::gpu::resources::TargetFormat;
use ants::prelude::*;

fn headless(config: SimConfig, canvas: CanvasSize) -> Simulation {
    let config = SimConfig {
        allow_fixed_point_fallback: true,
        seed: Some(7),
        ..config
    };
    Simulation::headless(config, canvas)
        .unwrap_or_else(|e| panic!("failed to build headless simulation: {e}"))
}

fn small_config(population: u32) -> SimConfig {
    SimConfig {
        population,
        init_radius: 40.0,
        num_blur_scales: 1,
        ..SimConfig::default()
    }
}

fn f16_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = ((bits >> 10) & 0x1f) as i32;
    let mant = (bits & 0x3ff) as f32;
    match exp {
        0 => sign * mant * 2f32.powi(-24),
        0x1f => {
            if mant == 0.0 {
                sign * f32::INFINITY
            } else {
                f32::NAN
            }
        }
        _ => sign * (1.0 + mant / 1024.0) * 2f32.powi(exp - 15),
    }
}

/// Decode raw texels to one float per channel.
fn channels(format: TargetFormat, bytes: &[u8]) -> Vec<f32> {
    match format {
        TargetFormat::Rgba8 => bytes.iter().map(|&b| b as f32 / 255.0).collect(),
        TargetFormat::Rgba16Float => bytes
            .chunks_exact(2)
            .map(|c| f16_to_f32(u16::from_le_bytes([c[0], c[1]])))
            .collect(),
        TargetFormat::Rgba32Float => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

#[test]
fn f16_decoding() {
    assert_eq!(f16_to_f32(0x0000), 0.0);
    assert_eq!(f16_to_f32(0x3c00), 1.0);
    assert_eq!(f16_to_f32(0xc000), -2.0);
    assert_eq!(f16_to_f32(0x3800), 0.5);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn one_frame_moves_agents_once_and_shows_them() {
    let canvas = CanvasSize::new(256, 256);
    let mut sim = headless(small_config(1000), canvas);

    assert_eq!(sim.frame().unwrap(), FrameOutcome::Rendered);

    let pipeline = sim.pipeline().unwrap();
    assert_eq!(pipeline.agents().swap_count(), 1);
    assert_eq!(sim.dropped_frames(), 0);

    let background = sim.config().background_color.to_array();
    let display = sim.read_texture(sim.display_target().unwrap()).unwrap();
    let lit = display.chunks_exact(4).any(|px| {
        (0..3).any(|c| (px[c] as f32 / 255.0 - background[c]).abs() > 0.02)
    });
    assert!(lit, "no agent reached the display");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn population_is_conserved_and_wrapped() {
    let canvas = CanvasSize::new(200, 120);
    let config = SimConfig {
        init_radius: 300.0,
        ..small_config(777)
    };
    let mut sim = headless(config, canvas);

    for _ in 0..4 {
        sim.frame().unwrap();
    }

    let agents = sim.read_agents().unwrap();
    assert_eq!(agents.len(), 777);
    for agent in &agents {
        assert!(agent.x >= 0.0 && agent.x <= canvas.width as f32, "{agent:?}");
        assert!(agent.y >= 0.0 && agent.y <= canvas.height as f32, "{agent:?}");
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn full_decay_without_agents_leaves_trail_black() {
    let config = SimConfig {
        decay_factor: 1.0,
        ..small_config(0)
    };
    let mut sim = headless(config, CanvasSize::new(128, 96));

    for _ in 0..5 {
        sim.frame().unwrap();
    }

    let pipeline = sim.pipeline().unwrap();
    assert_eq!(pipeline.agents().swap_count(), 5);
    let trail = sim.read_texture(pipeline.current_trail()).unwrap();
    assert!(trail.iter().all(|&b| b == 0));
    let merged = sim.read_texture(pipeline.merged()).unwrap();
    assert!(merged.iter().all(|&b| b == 0));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn zero_decay_never_dims_the_trail() {
    let config = SimConfig {
        decay_factor: 0.0,
        ..small_config(300)
    };
    let mut sim = headless(config, CanvasSize::new(128, 128));

    sim.frame().unwrap();
    let format = sim.pipeline().unwrap().hdr_format();
    let before = channels(
        format,
        &sim.read_texture(sim.pipeline().unwrap().current_trail()).unwrap(),
    );

    sim.frame().unwrap();
    let after = channels(
        format,
        &sim.read_texture(sim.pipeline().unwrap().current_trail()).unwrap(),
    );

    assert_eq!(before.len(), after.len());
    assert!(before.iter().any(|&v| v > 0.0));
    for (b, a) in before.iter().zip(&after) {
        assert!(a >= b, "texel dimmed from {b} to {a}");
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn zero_threshold_passes_the_trail_through() {
    let config = SimConfig {
        saturation_threshold: 0.0,
        ..small_config(200)
    };
    let mut sim = headless(config, CanvasSize::new(96, 96));

    sim.frame().unwrap();
    let pipeline = sim.pipeline().unwrap();
    let trail = sim.read_texture(pipeline.current_trail()).unwrap();
    let bright = sim.read_texture(pipeline.threshold_output()).unwrap();
    assert_eq!(trail, bright);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn max_threshold_clips_sparse_trails() {
    let config = SimConfig {
        saturation_threshold: 2.0,
        ..small_config(100)
    };
    let mut sim = headless(config, CanvasSize::new(128, 128));

    sim.frame().unwrap();
    let pipeline = sim.pipeline().unwrap();
    let bright = sim.read_texture(pipeline.threshold_output()).unwrap();
    assert!(bright.iter().all(|&b| b == 0));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn resize_reallocates_every_target() {
    let mut sim = headless(small_config(500), CanvasSize::new(160, 120));
    sim.frame().unwrap();

    let resized = CanvasSize::new(320, 200);
    sim.request_resize(resized);
    assert_eq!(sim.canvas(), CanvasSize::new(160, 120));
    assert_eq!(sim.frame().unwrap(), FrameOutcome::Rendered);

    let pipeline = sim.pipeline().unwrap();
    assert_eq!(sim.canvas(), resized);
    assert_eq!(pipeline.canvas(), resized);
    assert_eq!(pipeline.current_trail().size, resized);
    assert_eq!(pipeline.current_sensing().size, resized.sensing());
    assert_eq!(pipeline.merged().size, resized);
    assert_eq!(pipeline.blur_sizes(), resized.blur_scales(1));
    assert_eq!(
        pipeline.compositor().projection_sizes(),
        (resized, resized.sensing())
    );
    assert_eq!(sim.display_target().unwrap().size, resized);
    assert_eq!(sim.read_agents().unwrap().len(), 500);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn projection_is_uploaded_only_on_build_and_resize() {
    let canvas = CanvasSize::new(128, 96);
    let mut sim = headless(small_config(200), canvas);
    let uploads = |sim: &Simulation| sim.pipeline().unwrap().compositor().projection_uploads();
    assert_eq!(uploads(&sim), 1);

    for _ in 0..4 {
        sim.frame().unwrap();
    }
    assert_eq!(uploads(&sim), 1);

    sim.request_resize(canvas);
    sim.frame().unwrap();
    assert_eq!(uploads(&sim), 1);

    sim.request_resize(CanvasSize::new(200, 150));
    sim.frame().unwrap();
    sim.frame().unwrap();
    assert_eq!(uploads(&sim), 2);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn pause_freezes_agents_and_clock() {
    let mut sim = headless(small_config(400), CanvasSize::new(128, 128));
    sim.frame().unwrap();
    sim.frame().unwrap();

    assert!(sim.on_pause());
    let frozen = sim.read_agents().unwrap();
    let elapsed = sim.time().elapsed();
    let swaps = sim.pipeline().unwrap().agents().swap_count();

    for _ in 0..3 {
        assert_eq!(sim.frame().unwrap(), FrameOutcome::Rendered);
    }

    assert_eq!(
        bytemuck::cast_slice::<Agent, u8>(&frozen),
        bytemuck::cast_slice::<Agent, u8>(&sim.read_agents().unwrap())
    );
    assert_eq!(sim.time().elapsed(), elapsed);
    assert_eq!(sim.pipeline().unwrap().agents().swap_count(), swaps);

    assert!(!sim.on_pause());
    sim.frame().unwrap();
    assert_eq!(sim.pipeline().unwrap().agents().swap_count(), swaps + 1);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn parameter_changes_are_live_or_reset() {
    let mut sim = headless(small_config(100), CanvasSize::new(64, 64));
    sim.frame().unwrap();

    assert_eq!(
        sim.on_parameter_change("bloomIntensity", 2.5).unwrap(),
        ParamEffect::Live
    );
    assert_eq!(sim.pipeline().unwrap().config().bloom_intensity, 2.5);

    assert_eq!(
        sim.on_parameter_change("nbAgent", 250.0).unwrap(),
        ParamEffect::RequiresReset
    );
    assert_eq!(sim.pipeline().unwrap().population(), 100);
    sim.frame().unwrap();
    assert_eq!(sim.pipeline().unwrap().population(), 250);
    assert_eq!(sim.read_agents().unwrap().len(), 250);

    assert!(matches!(
        sim.on_parameter_change("gravity", 1.0),
        Err(SimulationError::Config(ConfigError::UnknownParameter(_)))
    ));
    assert!(sim.on_parameter_change("decayFactor", 4.0).is_err());
    assert_eq!(sim.config().decay_factor, SimConfig::default().decay_factor);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn reset_respawns_and_clears() {
    let mut sim = headless(small_config(300), CanvasSize::new(96, 96));
    for _ in 0..3 {
        sim.frame().unwrap();
    }

    sim.on_reset();
    sim.frame().unwrap();
    let pipeline = sim.pipeline().unwrap();
    assert_eq!(pipeline.agents().swap_count(), 1);
    assert_eq!(sim.time().frame(), 1);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn agent_readback_completes_cooperatively() {
    let mut sim = headless(small_config(256), CanvasSize::new(128, 128));
    sim.frame().unwrap();

    sim.request_agent_readback();
    assert!(sim.readback_pending());
    for _ in 0..200 {
        if !sim.readback_pending() {
            break;
        }
        sim.frame().unwrap();
    }

    assert!(!sim.readback_pending());
    let [x, y] = sim.last_centroid().expect("centroid after readback");
    assert!((0.0..=128.0).contains(&x));
    assert!((0.0..=128.0).contains(&y));
}
