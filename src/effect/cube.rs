//! The spinning lit cube scene effect.

use super::scene::{box_mesh, AmbientLight, PerspectiveCamera, PointLight, SceneVertex};
use super::{GpuContext, OUTPUT_FORMAT};
use glam::{Mat4, Vec2, Vec3};
use std::borrow::Cow;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CUBE_SHADER: &str = r#"
struct SceneUniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    light_position: vec4<f32>,
    light_color: vec4<f32>,
    ambient: vec4<f32>,
}

@group(0) @binding(0) var<uniform> u: SceneUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    let world = u.model * vec4<f32>(position, 1.0);
    out.world_position = world.xyz;
    out.normal = normalize((u.model * vec4<f32>(normal, 0.0)).xyz);
    out.clip_position = u.view_proj * world;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = vec3<f32>(0.5, 0.5, 0.5);
    let n = normalize(in.normal);
    let to_light = normalize(u.light_position.xyz - in.world_position);
    let diffuse = u.light_color.rgb * u.light_color.w * max(dot(n, to_light), 0.0);
    return vec4<f32>(base * (u.ambient.rgb + diffuse), 1.0);
}
"#;

/// Per-frame animation state of the cube.
///
/// The position is derived from the rotation angles with the original demo's
/// placeholder formula; it is a visual wobble, not a physical transform, and
/// is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinState {
    pub rotation: Vec2,
    pub position: Vec3,
}

impl SpinState {
    /// Per-frame rotation increments in radians.
    pub const STEP: Vec2 = Vec2::new(0.02, 0.03);

    pub fn new() -> Self {
        let rotation = Vec2::ZERO;
        Self {
            rotation,
            position: Vec3::new(rotation.x.sin(), rotation.y.cos(), 0.0),
        }
    }

    /// Advances one frame: fixed rotation increments, position re-derived
    /// as `(sin(rotation.x), cos(rotation.y))`.
    pub fn advance(&mut self) {
        self.rotation += Self::STEP;
        self.position.x = self.rotation.x.sin();
        self.position.y = self.rotation.y.cos();
    }

    /// Model matrix for the current state.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
    }
}

impl Default for SpinState {
    fn default() -> Self {
        Self::new()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    light_position: [f32; 4],
    light_color: [f32; 4],
    ambient: [f32; 4],
}

/// Renders one box mesh under an ambient and a point light.
pub struct CubeEffect {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    camera: PerspectiveCamera,
    ambient: AmbientLight,
    light: PointLight,
    spin: SpinState,
    aspect: f32,
}

impl CubeEffect {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Cube Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(CUBE_SHADER)),
            });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Cube Bind Group Layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Cube Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Cube Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[SceneVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: OUTPUT_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        let (vertices, indices) = box_mesh();
        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cube Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cube Indices"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cube Uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cube Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let depth_view = Self::create_depth_view(ctx, width, height);

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            uniform_buffer,
            bind_group,
            depth_view,
            camera: PerspectiveCamera::default(),
            ambient: AmbientLight::default(),
            light: PointLight::default(),
            spin: SpinState::new(),
            aspect: width as f32 / height as f32,
        }
    }

    fn create_depth_view(ctx: &GpuContext, width: u32, height: u32) -> wgpu::TextureView {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Cube Depth"),
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
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Steps the spin animation by one frame.
    pub fn advance(&mut self) {
        self.spin.advance();
    }

    /// Recreates the depth buffer for a new target size.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        self.depth_view = Self::create_depth_view(ctx, width, height);
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Encodes the scene pass for this frame.
    pub fn encode(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) {
        let uniforms = SceneUniforms {
            view_proj: self.camera.view_proj(self.aspect).to_cols_array_2d(),
            model: self.spin.model_matrix().to_cols_array_2d(),
            light_position: self.light.position.extend(1.0).to_array(),
            light_color: self.light.color.extend(self.light.intensity).to_array(),
            ambient: self.ambient.color.extend(1.0).to_array(),
        };
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cube Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_formula_holds(state: &SpinState) {
        assert!((state.position.x - state.rotation.x.sin()).abs() < 1e-6);
        assert!((state.position.y - state.rotation.y.cos()).abs() < 1e-6);
        assert_eq!(state.position.z, 0.0);
    }

    #[test]
    fn test_spin_initial_state() {
        let state = SpinState::new();
        assert_eq!(state.rotation, Vec2::ZERO);
        assert_formula_holds(&state);
    }

    #[test]
    fn test_spin_single_step() {
        let mut state = SpinState::new();
        state.advance();
        assert!((state.rotation.x - 0.02).abs() < 1e-6);
        assert!((state.rotation.y - 0.03).abs() < 1e-6);
        assert_formula_holds(&state);
    }

    #[test]
    fn test_spin_hundred_steps_monotonic() {
        let mut state = SpinState::new();
        let mut previous = state.rotation;
        for _ in 0..100 {
            state.advance();
            assert!((state.rotation.x - previous.x - 0.02).abs() < 1e-5);
            assert!((state.rotation.y - previous.y - 0.03).abs() < 1e-5);
            assert!(state.rotation.x > previous.x);
            assert!(state.rotation.y > previous.y);
            assert_formula_holds(&state);
            previous = state.rotation;
        }
        assert!((state.rotation.x - 2.0).abs() < 1e-4);
        assert!((state.rotation.y - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_model_matrix_translates_to_position() {
        let mut state = SpinState::new();
        for _ in 0..7 {
            state.advance();
        }
        let m = state.model_matrix();
        let origin = m.transform_point3(glam::Vec3::ZERO);
        assert!((origin - state.position).length() < 1e-5);
    }
}
