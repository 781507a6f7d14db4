//! WGSL sources.
//!
//! Every image stage is a full-screen pass built from [`FULLSCREEN_VERTEX`],
//! the shared texel helpers and a fragment body. Textures are read with
//! `textureLoad` and filtered by hand, so the same shaders work on
//! unfilterable `Rgba32Float` targets.

/// Six vertices covering the viewport as two triangles.
pub const FULLSCREEN_VERTEX: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    return vec4<f32>(corners[vertex_index], 0.0, 1.0);
}
"#;

/// Clamp-to-edge texel fetch and bilinear filtering.
pub const TEXEL_HELPERS: &str = r#"
fn load_clamped(tex: texture_2d<f32>, p: vec2<i32>) -> vec4<f32> {
    let dims = vec2<i32>(textureDimensions(tex));
    return textureLoad(tex, clamp(p, vec2<i32>(0), dims - vec2<i32>(1)), 0);
}

fn sample_bilinear(tex: texture_2d<f32>, uv: vec2<f32>) -> vec4<f32> {
    let dims = vec2<f32>(textureDimensions(tex));
    let p = uv * dims - vec2<f32>(0.5);
    let base = floor(p);
    let f = p - base;
    let i = vec2<i32>(base);
    let a = load_clamped(tex, i);
    let b = load_clamped(tex, i + vec2<i32>(1, 0));
    let c = load_clamped(tex, i + vec2<i32>(0, 1));
    let d = load_clamped(tex, i + vec2<i32>(1, 1));
    return mix(mix(a, b, f.x), mix(c, d, f.x), f.y);
}
"#;

pub const DECAY_FRAGMENT: &str = r#"
struct DecayParams {
    retain: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var<uniform> params: DecayParams;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let color = load_clamped(src, vec2<i32>(pos.xy));
    return max(color * params.retain, vec4<f32>(0.0));
}
"#;

pub const THRESHOLD_FRAGMENT: &str = r#"
struct ThresholdParams {
    threshold: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var<uniform> params: ThresholdParams;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let color = load_clamped(src, vec2<i32>(pos.xy));
    if (max(color.r, max(color.g, color.b)) < params.threshold) {
        return vec4<f32>(0.0);
    }
    return color;
}
"#;

pub const DOWNSCALE_FRAGMENT: &str = r#"
struct ScaleParams {
    dst_size: vec2<f32>,
    direction: vec2<f32>,
}

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var<uniform> params: ScaleParams;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    return sample_bilinear(src, pos.xy / params.dst_size);
}
"#;

/// Separable 9-tap gaussian along `params.direction`.
pub const BLUR_FRAGMENT: &str = r#"
struct ScaleParams {
    dst_size: vec2<f32>,
    direction: vec2<f32>,
}

@group(0) @binding(0) var src: texture_2d<f32>;
@group(0) @binding(1) var<uniform> params: ScaleParams;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let p = vec2<i32>(pos.xy);
    let stride = vec2<i32>(params.direction);
    var sum = load_clamped(src, p) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = stride * i;
        sum = sum + (load_clamped(src, p + offset) + load_clamped(src, p - offset)) * weights[i];
    }
    return sum;
}
"#;

pub const DISPLAY_FRAGMENT: &str = r#"
@group(0) @binding(0) var src: texture_2d<f32>;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let color = load_clamped(src, vec2<i32>(pos.xy));
    if (all(color.rgb == vec3<f32>(0.0))) {
        discard;
    }
    return vec4<f32>(clamp(color.rgb, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
"#;

/// Agent update kernel: three sensors, steer, advance, wrap.
pub const AGENT_KERNEL: &str = r#"
struct KernelParams {
    canvas_size: vec2<f32>,
    texture_size: vec2<f32>,
    speed: f32,
    rotation_speed: f32,
    sense_spread: f32,
    sense_length: f32,
    sense_size: u32,
    time: u32,
    delta_time: f32,
    agent_count: u32,
    color_divisor: u32,
    palette_len: u32,
    _pad0: u32,
    _pad1: u32,
    palette: array<vec4<f32>, 16>,
}

@group(0) @binding(0) var<storage, read> agents_in: array<f32>;
@group(0) @binding(1) var<storage, read_write> agents_out: array<f32>;
@group(0) @binding(2) var sensing: texture_2d<f32>;
@group(0) @binding(3) var<uniform> params: KernelParams;

fn hash(v: u32) -> u32 {
    let state = v * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn random01(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

fn class_color(index: u32) -> vec3<f32> {
    let class_index = min(index / max(params.color_divisor, 1u), params.palette_len - 1u);
    return params.palette[class_index].rgb;
}

fn sense(pos: vec2<f32>, angle: f32, color: vec3<f32>) -> f32 {
    let dir = vec2<f32>(cos(angle), sin(angle));
    let perp = vec2<f32>(-dir.y, dir.x);
    let center = pos + dir * params.sense_length;
    let to_texel = params.texture_size / params.canvas_size;
    let dims = vec2<i32>(textureDimensions(sensing));
    let n = i32(params.sense_size);
    var total = 0.0;
    for (var i = -n; i <= n; i = i + 1) {
        let p = vec2<i32>(floor((center + perp * f32(i)) * to_texel));
        let wrapped = ((p % dims) + dims) % dims;
        total = total + dot(textureLoad(sensing, wrapped, 0).rgb, color);
    }
    return total;
}

@compute @workgroup_size(256)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let index = id.x;
    if (index >= params.agent_count) {
        return;
    }

    let base = index * 3u;
    var pos = vec2<f32>(agents_in[base], agents_in[base + 1u]);
    var angle = agents_in[base + 2u];
    let color = class_color(index);

    let ahead = sense(pos, angle, color);
    let left = sense(pos, angle - params.sense_spread, color);
    let right = sense(pos, angle + params.sense_spread, color);
    let turn = params.rotation_speed * params.delta_time;

    if (ahead > left && ahead > right) {
        // keep heading
    } else if (ahead < left && ahead < right) {
        let r = random01(hash(index) ^ hash(params.time + 0x9e3779b9u));
        angle = angle + (r * 2.0 - 1.0) * turn;
    } else if (left > right) {
        angle = angle - turn;
    } else if (right > left) {
        angle = angle + turn;
    }

    pos = pos + vec2<f32>(cos(angle), sin(angle)) * params.speed * params.delta_time;
    pos = pos - params.canvas_size * floor(pos / params.canvas_size);

    agents_out[base] = pos.x;
    agents_out[base + 1u] = pos.y;
    agents_out[base + 2u] = angle;
}
"#;

/// Instanced point rendering of agents into a trail or sensing target.
pub const AGENT_PAINT: &str = r#"
struct PaintParams {
    projection: mat4x4<f32>,
    scale: f32,
    color_factor: f32,
    color_divisor: u32,
    palette_len: u32,
    palette: array<vec4<f32>, 16>,
}

@group(0) @binding(0) var<uniform> params: PaintParams;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(
    @builtin(instance_index) instance_index: u32,
    @location(0) position: vec2<f32>,
    @location(1) angle: f32,
) -> VertexOutput {
    let class_index = min(instance_index / max(params.color_divisor, 1u), params.palette_len - 1u);
    var out: VertexOutput;
    out.clip_position = params.projection * vec4<f32>(position * params.scale, 0.0, 1.0);
    let rgb = params.palette[class_index].rgb * params.color_factor;
    out.color = vec4<f32>(rgb, params.color_factor);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Assemble a full-screen pass from a fragment body.
pub fn fullscreen_shader(fragment: &str) -> String {
    format!("{FULLSCREEN_VERTEX}{TEXEL_HELPERS}{fragment}")
}

/// Merge kernel for `num_scales` blur levels.
///
/// Bindings: 0 is the original trail, `1..=n` the blurred scales, `n + 1`
/// the uniform block with the bloom intensity and per-scale weights.
pub fn merge_shader_source(num_scales: u32) -> String {
    let n = num_scales.max(1);
    let mut bindings = String::new();
    let mut accumulate = String::new();
    for i in 0..n {
        bindings.push_str(&format!(
            "@group(0) @binding({}) var scale{i}: texture_2d<f32>;\n",
            i + 1
        ));
        accumulate.push_str(&format!(
            "    blurred = blurred + sample_bilinear(scale{i}, uv) * params.weights[{i}].x;\n"
        ));
    }

    let fragment = format!(
        r#"
struct MergeParams {{
    bloom_intensity: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
    weights: array<vec4<f32>, {n}>,
}}

@group(0) @binding(0) var original: texture_2d<f32>;
{bindings}@group(0) @binding({params_binding}) var<uniform> params: MergeParams;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {{
    let uv = pos.xy / vec2<f32>(textureDimensions(original));
    var blurred = vec4<f32>(0.0);
{accumulate}    return load_clamped(original, vec2<i32>(pos.xy)) + blurred * params.bloom_intensity;
}}
"#,
        params_binding = n + 1,
    );

    fullscreen_shader(&fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_source_binds_every_scale() {
        let src = merge_shader_source(3);
        for i in 0..3 {
            assert!(src.contains(&format!("var scale{i}: texture_2d<f32>")));
        }
        assert!(!src.contains("scale3"));
        assert!(src.contains("@binding(4) var<uniform> params"));
        assert!(src.contains("array<vec4<f32>, 3>"));
    }

    #[test]
    fn fullscreen_shader_has_both_entry_points() {
        let src = fullscreen_shader(DECAY_FRAGMENT);
        assert!(src.contains("fn vs_main"));
        assert!(src.contains("fn fs_main"));
        assert!(src.contains("fn load_clamped"));
    }
}
