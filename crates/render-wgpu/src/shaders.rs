/// Instanced model parts: player palette, flash highlight, shadow lookup.
///
/// `params` is `[player, material, flash, elapsed]`.
pub const INSTANCE_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    light_dir: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
@group(0) @binding(1)
var shadow_map: texture_depth_2d;
@group(0) @binding(2)
var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) params: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) light_clip: vec4<f32>,
    @location(2) params: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * world_pos;
    out.world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.light_clip = uniforms.light_view_proj * world_pos;
    out.params = instance.params;
    return out;
}

fn player_color(player: u32) -> vec3<f32> {
    var palette = array<vec3<f32>, 8>(
        vec3<f32>(0.70, 0.70, 0.70),
        vec3<f32>(0.20, 0.45, 0.90),
        vec3<f32>(0.85, 0.20, 0.20),
        vec3<f32>(0.25, 0.70, 0.30),
        vec3<f32>(0.90, 0.75, 0.20),
        vec3<f32>(0.60, 0.30, 0.80),
        vec3<f32>(0.20, 0.75, 0.75),
        vec3<f32>(0.90, 0.50, 0.20),
    );
    return palette[player % 8u];
}

fn shadow_factor(light_clip: vec4<f32>) -> f32 {
    let ndc = light_clip.xyz / light_clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, ndc.y * -0.5 + 0.5);
    let lit = textureSampleCompareLevel(shadow_map, shadow_sampler, uv, ndc.z - 0.002);
    let outside = uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0;
    return select(lit, 1.0, outside);
}

fn shade(in: VertexOutput) -> vec3<f32> {
    let base = player_color(u32(in.params.x));
    let tint = 1.0 - 0.12 * f32(u32(in.params.y) % 4u);
    let diffuse = max(dot(in.world_normal, normalize(uniforms.light_dir.xyz)), 0.0);
    let lighting = 0.3 + diffuse * 0.7 * shadow_factor(in.light_clip);
    let color = base * tint * lighting;
    // Flash pulses towards white.
    let pulse = 0.5 + 0.5 * sin(uniforms.light_dir.w * 12.0);
    return mix(color, vec3<f32>(1.0, 1.0, 1.0), in.params.z * pulse * 0.6);
}

@fragment
fn fs_opaque(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(shade(in), 1.0);
}

@fragment
fn fs_alpha(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(shade(in), 0.55);
}
"#;

/// Depth-only pass from the light's point of view.
pub const SHADOW_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    light_dir: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
};

@vertex
fn vs_shadow(@location(0) position: vec3<f32>, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    return uniforms.light_view_proj * model * vec4<f32>(position, 1.0);
}
"#;

/// Line grid on the ground plane.
pub const GRID_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    light_dir: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct GridVertex {
    @location(0) position: vec3<f32>,
    @location(1) color: vec4<f32>,
};

struct GridOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_grid(vertex: GridVertex) -> GridOutput {
    var out: GridOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(vertex.position, 1.0);
    out.color = vertex.color;
    return out;
}

@fragment
fn fs_grid(in: GridOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;
