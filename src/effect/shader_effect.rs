//! Fullscreen shader effects over the camera texture.

use super::{translate_glsl, EffectDescriptor, EffectError, GpuContext, OUTPUT_FORMAT};
use crate::frame::{EffectVertex, VideoFrame};
use std::borrow::Cow;
use std::fs;
use std::time::Instant;
use wgpu::util::DeviceExt;

/// Vertex shader shared by all fullscreen effects.
///
/// The texture coordinate is the raw vertex position; clip-space position is
/// `1 - 2 * position`, so the visible region maps to uv [0, 1] on both axes.
const VERTEX_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.uv = position;
    out.clip_position = vec4<f32>(1.0 - 2.0 * position, 0.0, 1.0);
    return out;
}
"#;

/// Channel inversion: `1 - rgb`, alpha forced to 1.
const INVERT_FRAGMENT: &str = r#"
@group(0) @binding(0) var t_camera: texture_2d<f32>;
@group(0) @binding(1) var s_camera: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(vec3<f32>(1.0) - textureSample(t_camera, s_camera, uv).rgb, 1.0);
}
"#;

/// Constant-color overlay; the overlay alpha is the blend weight.
const OVERLAY_FRAGMENT: &str = r#"
struct EffectUniforms {
    time: f32,
    width: f32,
    height: f32,
    seed: f32,
    overlay: vec4<f32>,
}

@group(0) @binding(0) var t_camera: texture_2d<f32>;
@group(0) @binding(1) var s_camera: sampler;
@group(0) @binding(2) var<uniform> u: EffectUniforms;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let base = textureSample(t_camera, s_camera, uv).rgb;
    return vec4<f32>(mix(base, u.overlay.rgb, u.overlay.a), 1.0);
}
"#;

/// Uniforms available to every fullscreen effect.
///
/// Custom GLSL shaders may bind the camera texture and sampler at group 0
/// bindings 0 and 1 and this block at binding 2; the interpolated uv arrives
/// at location 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EffectUniforms {
    pub time: f32,
    pub width: f32,
    pub height: f32,
    pub seed: f32,
    pub overlay: [f32; 4],
}

/// A fullscreen effect: one pipeline, the shared triangle, the camera texture.
pub struct ShaderEffect {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    camera_texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    overlay: [f32; 4],
    clear_color: wgpu::Color,
    started: Instant,
}

impl ShaderEffect {
    /// Compiles and links the effect's shader program. Fails before any frame
    /// is drawn if the fragment source does not survive validation.
    pub fn new(ctx: &GpuContext, descriptor: &EffectDescriptor) -> Result<Self, EffectError> {
        let (fragment_wgsl, fragment_entry_point, overlay) = match descriptor {
            EffectDescriptor::Invert => (Cow::Borrowed(INVERT_FRAGMENT), "fs_main", [0.0; 4]),
            EffectDescriptor::Overlay { color } => {
                (Cow::Borrowed(OVERLAY_FRAGMENT), "fs_main", *color)
            }
            EffectDescriptor::Fragment { path } => {
                let glsl = fs::read_to_string(path).map_err(|source| EffectError::Io {
                    path: path.clone(),
                    source,
                })?;
                (Cow::Owned(translate_glsl(&glsl)?), "main", [0.0; 4])
            }
            EffectDescriptor::Cube => unreachable!("cube is not a fullscreen shader effect"),
        };

        // The inversion screen cleared to solid blue; keep that as its
        // background. The other effects clear to black.
        let clear_color = match descriptor {
            EffectDescriptor::Invert => wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 1.0,
                a: 1.0,
            },
            _ => wgpu::Color::BLACK,
        };

        let vertex_module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Effect Vertex Shader"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(VERTEX_SHADER)),
            });

        let fragment_module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Effect Fragment Shader"),
                source: wgpu::ShaderSource::Wgsl(fragment_wgsl),
            });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Effect Bind Group Layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Effect Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Effect Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some("vs_main"),
                    buffers: &[EffectVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(fragment_entry_point),
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
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Effect Triangle"),
                contents: bytemuck::cast_slice(EffectVertex::VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let uniforms = EffectUniforms {
            time: 0.0,
            width: 0.0,
            height: 0.0,
            seed: 0.0,
            overlay,
        };
        let uniform_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Effect Uniforms"),
                contents: bytemuck::cast_slice(&[uniforms]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Camera Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Placeholder until the first camera frame lands.
        let camera_texture = Self::create_camera_texture(ctx, 1, 1);
        let bind_group = Self::create_bind_group(
            ctx,
            &bind_group_layout,
            &camera_texture,
            &sampler,
            &uniform_buffer,
        );

        Ok(Self {
            pipeline,
            vertex_buffer,
            bind_group_layout,
            uniform_buffer,
            sampler,
            camera_texture,
            bind_group,
            overlay,
            clear_color,
            started: Instant::now(),
        })
    }

    fn create_camera_texture(ctx: &GpuContext, width: u32, height: u32) -> wgpu::Texture {
        ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Camera Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_bind_group(
        ctx: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        camera_texture: &wgpu::Texture,
        sampler: &wgpu::Sampler,
        uniform_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        let camera_view = camera_texture.create_view(&wgpu::TextureViewDescriptor::default());
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&camera_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Writes a camera frame into the input texture, recreating it if the
    /// frame size changed.
    pub fn upload_frame(&mut self, ctx: &GpuContext, frame: &VideoFrame) {
        let rgba = frame.to_rgba();
        if self.camera_texture.width() != rgba.width || self.camera_texture.height() != rgba.height
        {
            self.camera_texture = Self::create_camera_texture(ctx, rgba.width, rgba.height);
            self.bind_group = Self::create_bind_group(
                ctx,
                &self.bind_group_layout,
                &self.camera_texture,
                &self.sampler,
                &self.uniform_buffer,
            );
        }

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.camera_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(rgba.width * 4),
                rows_per_image: Some(rgba.height),
            },
            wgpu::Extent3d {
                width: rgba.width,
                height: rgba.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Updates the overlay blend color; takes effect on the next frame.
    pub fn set_overlay(&mut self, color: [f32; 4]) {
        self.overlay = color;
    }

    /// Encodes the clear-bind-draw pass for this frame.
    pub fn encode(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) {
        let uniforms = EffectUniforms {
            time: self.started.elapsed().as_secs_f32(),
            width: width as f32,
            height: height as f32,
            seed: rand::random::<f32>(),
            overlay: self.overlay,
        };
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Effect Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..3, 0..1);
    }
}
