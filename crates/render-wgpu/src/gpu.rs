use crate::batch::{Batch, FrameBatches};
use crate::camera::FlyCamera;
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use skirmish_assets::MeshData;
use skirmish_common::ItemType;
use skirmish_instancing::InstanceRegistry;
use skirmish_render::{DrawBackend, InstanceVertex, InstancedDraw, Technique};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADOW_SIZE: u32 = 2048;
const MIN_INSTANCE_CAPACITY: usize = 256;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    2 => Float32x4,
    3 => Float32x4,
    4 => Float32x4,
    5 => Float32x4,
    6 => Float32x4,
];
const GRID_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    /// xyz towards the light, w is elapsed seconds.
    light_dir: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct MeshVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct GridVertex {
    position: [f32; 3],
    color: [f32; 4],
}

struct PartMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

fn grid_mesh(half_extent: i32, spacing: f32) -> Vec<GridVertex> {
    let color = [0.35, 0.38, 0.32, 1.0];
    let extent = half_extent as f32 * spacing;
    let mut verts = Vec::with_capacity((half_extent as usize * 2 + 1) * 4);
    for i in -half_extent..=half_extent {
        let offset = i as f32 * spacing;
        verts.push(GridVertex { position: [-extent, 0.0, offset], color });
        verts.push(GridVertex { position: [extent, 0.0, offset], color });
        verts.push(GridVertex { position: [offset, 0.0, -extent], color });
        verts.push(GridVertex { position: [offset, 0.0, extent], color });
    }
    verts
}

/// Orthographic light covering a square around `focus`.
fn light_view_projection(light_dir: Vec3, focus: Vec3, half_extent: f32) -> Mat4 {
    let eye = focus + light_dir.normalize() * (half_extent * 2.0);
    let view = Mat4::look_at_rh(eye, focus, Vec3::Y);
    let proj = Mat4::orthographic_rh(
        -half_extent,
        half_extent,
        -half_extent,
        half_extent,
        0.1,
        half_extent * 4.0,
    );
    proj * view
}

fn mesh_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &MESH_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        },
    ]
}

fn depth_state(write: bool, bias: wgpu::DepthBiasState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: Default::default(),
        bias,
    }
}

struct PartPipeline<'a> {
    label: &'a str,
    fragment: &'a str,
    blend: wgpu::BlendState,
    cull: wgpu::Face,
    depth_write: bool,
}

/// wgpu backend for instanced model parts.
///
/// Call [`WgpuInstanceRenderer::sync_meshes`] after models finish
/// loading, hand the renderer to the submitter as a [`DrawBackend`], then
/// call [`WgpuInstanceRenderer::render`].
pub struct WgpuInstanceRenderer {
    opaque_pipeline: wgpu::RenderPipeline,
    /// Back faces first, then front faces.
    alpha_pipelines: [wgpu::RenderPipeline; 2],
    shadow_pipeline: wgpu::RenderPipeline,
    grid_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    shadow_bind_group: wgpu::BindGroup,
    main_bind_group: wgpu::BindGroup,
    shadow_view: wgpu::TextureView,
    meshes: HashMap<(ItemType, usize), PartMesh>,
    grid_vertex_buffer: wgpu::Buffer,
    grid_vertex_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    frame: FrameBatches,
    depth_texture: wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
    light_dir: Vec3,
    elapsed: f32,
}

impl WgpuInstanceRenderer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform_buffer"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                light_view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                light_dir: [0.0, 1.0, 0.0, 0.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_bind_group_layout"),
            entries: &[uniform_entry],
        });
        let main_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("main_bind_group_layout"),
            entries: &[
                uniform_entry,
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let shadow_view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("shadow_map"),
                size: wgpu::Extent3d {
                    width: SHADOW_SIZE,
                    height: SHADOW_SIZE,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&Default::default());
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_bind_group"),
            layout: &shadow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let main_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("main_bind_group"),
            layout: &main_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let main_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("main_pipeline_layout"),
            bind_group_layouts: &[&main_layout],
            push_constant_ranges: &[],
        });
        let shadow_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&shadow_layout],
            push_constant_ranges: &[],
        });

        let instance_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("instance_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::INSTANCE_SHADER.into()),
        });
        let part_pipeline = |desc: PartPipeline<'_>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&main_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &instance_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &mesh_layouts(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &instance_shader,
                    entry_point: Some(desc.fragment),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(desc.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(desc.cull),
                    ..Default::default()
                },
                depth_stencil: Some(depth_state(desc.depth_write, Default::default())),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        };

        let opaque_pipeline = part_pipeline(PartPipeline {
            label: "opaque_pipeline",
            fragment: "fs_opaque",
            blend: wgpu::BlendState::REPLACE,
            cull: wgpu::Face::Back,
            depth_write: true,
        });
        let alpha_pipelines = [
            part_pipeline(PartPipeline {
                label: "alpha_back_pipeline",
                fragment: "fs_alpha",
                blend: wgpu::BlendState::ALPHA_BLENDING,
                cull: wgpu::Face::Front,
                depth_write: false,
            }),
            part_pipeline(PartPipeline {
                label: "alpha_front_pipeline",
                fragment: "fs_alpha",
                blend: wgpu::BlendState::ALPHA_BLENDING,
                cull: wgpu::Face::Back,
                depth_write: false,
            }),
        ];

        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SHADOW_SHADER.into()),
        });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow_pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: Some("vs_shadow"),
                compilation_options: Default::default(),
                buffers: &mesh_layouts(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(depth_state(
                true,
                wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            )),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let grid_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grid_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::GRID_SHADER.into()),
        });
        let grid_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grid_pipeline"),
            layout: Some(&main_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &grid_shader,
                entry_point: Some("vs_grid"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<GridVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &GRID_ATTRIBUTES,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &grid_shader,
                entry_point: Some("fs_grid"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(depth_state(true, Default::default())),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let grid_verts = grid_mesh(64, 2.0);
        let grid_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid_vertex_buffer"),
            contents: bytemuck::cast_slice(&grid_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            opaque_pipeline,
            alpha_pipelines,
            shadow_pipeline,
            grid_pipeline,
            uniform_buffer,
            shadow_bind_group,
            main_bind_group,
            shadow_view,
            meshes: HashMap::new(),
            grid_vertex_buffer,
            grid_vertex_count: grid_verts.len() as u32,
            instance_buffer: Self::create_instance_buffer(device, MIN_INSTANCE_CAPACITY),
            instance_capacity: MIN_INSTANCE_CAPACITY,
            frame: FrameBatches::new(),
            depth_texture: Self::create_depth_texture(device, width, height),
            surface_format,
            light_dir: Vec3::new(0.3, 1.0, 0.5).normalize(),
            elapsed: 0.0,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn frame(&self) -> &FrameBatches {
        &self.frame
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    /// Uploads part meshes of models that became ready since the last call.
    /// Returns how many parts were uploaded.
    pub fn sync_meshes(&mut self, device: &wgpu::Device, registry: &InstanceRegistry) -> usize {
        let mut uploaded = 0;
        for model in registry.models() {
            for index in 0..model.parts().len() {
                let key = (model.item_type(), index);
                if self.meshes.contains_key(&key) {
                    continue;
                }
                let Some(mesh) = model.mesh(index) else {
                    continue;
                };
                if let Some(part) = Self::upload_mesh(device, mesh) {
                    self.meshes.insert(key, part);
                    uploaded += 1;
                }
            }
        }
        if uploaded > 0 {
            tracing::debug!(uploaded, total = self.meshes.len(), "part meshes uploaded");
        }
        uploaded
    }

    /// Drops every uploaded mesh, e.g. when a level is unloaded.
    pub fn clear_meshes(&mut self) {
        self.meshes.clear();
    }

    fn upload_mesh(device: &wgpu::Device, mesh: &MeshData) -> Option<PartMesh> {
        if mesh.indices.is_empty() {
            return None;
        }
        let vertices: Vec<MeshVertex> = mesh
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| MeshVertex {
                position: *position,
                normal: mesh.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            })
            .collect();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("part_vertex_buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("part_index_buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Some(PartMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }

    /// Render one frame from the batches collected since `begin_frame`.
    pub fn render(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, view: &wgpu::TextureView, camera: &FlyCamera) {
        let focus = Vec3::new(camera.position.x, 0.0, camera.position.z);
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: camera.view_projection().to_cols_array_2d(),
                light_view_proj: light_view_projection(self.light_dir, focus, 80.0).to_cols_array_2d(),
                light_dir: self.light_dir.extend(self.elapsed).to_array(),
            }),
        );

        let staging = self.frame.staging();
        if staging.len() > self.instance_capacity {
            self.instance_capacity = staging.len().next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(device, self.instance_capacity);
            tracing::debug!(capacity = self.instance_capacity, "instance buffer grown");
        }
        if !staging.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(staging));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_pipeline(&self.shadow_pipeline);
            pass.set_bind_group(0, &self.shadow_bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for batch in self.frame.for_technique(Technique::ShadowMap) {
                self.draw_batch(&mut pass, batch);
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.42,
                            g: 0.55,
                            b: 0.68,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_bind_group(0, &self.main_bind_group, &[]);
            pass.set_pipeline(&self.grid_pipeline);
            pass.set_vertex_buffer(0, self.grid_vertex_buffer.slice(..));
            pass.draw(0..self.grid_vertex_count, 0..1);

            pass.set_pipeline(&self.opaque_pipeline);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for batch in self.frame.for_technique(Technique::HardwareInstancing) {
                self.draw_batch(&mut pass, batch);
            }

            for batch in self.frame.for_technique(Technique::AlphaBlended) {
                let pipeline = &self.alpha_pipelines[(batch.pass as usize).min(1)];
                pass.set_pipeline(pipeline);
                self.draw_batch(&mut pass, batch);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_batch(&self, pass: &mut wgpu::RenderPass<'_>, batch: &Batch) {
        let Some(mesh) = self.meshes.get(&(batch.item_type, batch.part)) else {
            tracing::trace!(item_type = %batch.item_type, part = batch.part, "no mesh uploaded, batch skipped");
            return;
        };
        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, batch.instances());
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: (capacity * std::mem::size_of::<InstanceVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

impl DrawBackend for WgpuInstanceRenderer {
    fn begin_frame(&mut self) {
        self.frame.begin_frame();
    }

    fn draw_instanced(&mut self, draw: &InstancedDraw<'_>) {
        self.frame.push(draw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_four_vertices_per_line_pair() {
        assert_eq!(grid_mesh(2, 1.0).len(), 20);
    }

    #[test]
    fn light_projection_covers_focus() {
        let vp = light_view_projection(Vec3::new(0.3, 1.0, 0.5), Vec3::new(10.0, 0.0, -5.0), 40.0);
        let clip = vp * Vec3::new(10.0, 0.0, -5.0).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn gpu_layouts_match_shader_inputs() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 24);
        assert_eq!(std::mem::size_of::<Uniforms>(), 144);
        assert_eq!(mesh_layouts()[1].array_stride, 80);
    }
}
