//! Parses and validates every WGSL kernel with naga, without a GPU.

use ants::config::MAX_BLUR_SCALES;
use ants::gpu::shaders::{self, fullscreen_shader, merge_shader_source};

fn validate(label: &str, source: &str) {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{label} failed to parse:\n{}", e.emit_to_string(source)));
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("{label} failed validation: {e:?}"));
}

#[test]
fn agent_kernel_is_valid() {
    validate("agent kernel", shaders::AGENT_KERNEL);
}

#[test]
fn agent_paint_is_valid() {
    validate("agent paint", shaders::AGENT_PAINT);
}

#[test]
fn fullscreen_stages_are_valid() {
    for (label, fragment) in [
        ("decay", shaders::DECAY_FRAGMENT),
        ("threshold", shaders::THRESHOLD_FRAGMENT),
        ("downscale", shaders::DOWNSCALE_FRAGMENT),
        ("blur", shaders::BLUR_FRAGMENT),
        ("display", shaders::DISPLAY_FRAGMENT),
    ] {
        validate(label, &fullscreen_shader(fragment));
    }
}

#[test]
fn merge_is_valid_for_every_scale_count() {
    for n in 1..=MAX_BLUR_SCALES {
        validate(&format!("merge({n})"), &merge_shader_source(n));
    }
}

#[test]
fn kernel_entry_point_uses_expected_workgroup() {
    let module = naga::front::wgsl::parse_str(shaders::AGENT_KERNEL).unwrap();
    let entry = module
        .entry_points
        .iter()
        .find(|e| e.name == "cs_main")
        .expect("cs_main entry point");
    assert_eq!(entry.workgroup_size, [ants::gpu::WORKGROUP_SIZE, 1, 1]);
}
