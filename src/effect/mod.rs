//! The configurable frame-effect renderer.
//!
//! One renderer component covers every effect variant: the fullscreen shader
//! effects (color inversion, color overlay, user-supplied GLSL) and the
//! spinning-cube scene. The variant is selected by an [`EffectDescriptor`] at
//! construction time and cannot change afterwards; swapping effects means
//! building a new renderer.

mod cube;
mod gpu_context;
mod scene;
mod shader_effect;

pub use cube::{CubeEffect, SpinState};
pub use gpu_context::GpuContext;
pub use shader_effect::{EffectUniforms, ShaderEffect};

use crate::frame::{PixelFormat, VideoFrame};
use anyhow::Result;
use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::ShaderStage;
use std::path::PathBuf;
use thiserror::Error;

/// Texture format of the effect output target.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Selects which effect a renderer runs.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectDescriptor {
    /// Invert the camera image's color channels.
    Invert,
    /// Blend a constant color over the camera image; `color[3]` is the blend
    /// weight.
    Overlay { color: [f32; 4] },
    /// A user-supplied GLSL fragment shader applied to the camera image.
    Fragment { path: PathBuf },
    /// The spinning lit cube scene. Ignores the camera feed.
    Cube,
}

/// Errors raised while building an effect.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("failed to read shader {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("shader parse error: {0}")]
    Parse(String),
    #[error("shader validation error: {0}")]
    Validate(String),
}

/// Converts a GLSL fragment shader to WGSL, validating it on the way.
///
/// Compilation problems surface here as [`EffectError`]; nothing is handed to
/// the GPU before validation passes.
pub fn translate_glsl(glsl: &str) -> Result<String, EffectError> {
    let mut frontend = Frontend::default();
    let options = Options::from(ShaderStage::Fragment);
    let module = frontend
        .parse(&options, glsl)
        .map_err(|e| EffectError::Parse(format!("{:?}", e)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    let info = validator
        .validate(&module)
        .map_err(|e| EffectError::Validate(format!("{:?}", e)))?;

    naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
        .map_err(|e| EffectError::Validate(format!("{:?}", e)))
}

/// The render target every effect draws into.
///
/// Effects always render at a fixed resolution into this texture; the window
/// surface scales it to fit. Keeping the target separate from the swapchain
/// lets the same pass drive the window, PNG snapshots, and headless runs.
struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Effect Output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }
}

enum EffectImpl {
    Shader(ShaderEffect),
    Scene(CubeEffect),
}

/// Renders one effect into its output target, frame by frame.
pub struct EffectRenderer {
    target: RenderTarget,
    effect: EffectImpl,
    readback_buffer: Option<wgpu::Buffer>,
}

impl EffectRenderer {
    /// Builds the effect selected by the descriptor. Shader translation and
    /// validation failures are reported here, before any frame is drawn.
    pub fn new(
        ctx: &GpuContext,
        descriptor: &EffectDescriptor,
        width: u32,
        height: u32,
    ) -> Result<Self, EffectError> {
        let target = RenderTarget::new(ctx, width.max(1), height.max(1));
        let effect = match descriptor {
            EffectDescriptor::Cube => {
                EffectImpl::Scene(CubeEffect::new(ctx, target.width, target.height))
            }
            other => EffectImpl::Shader(ShaderEffect::new(ctx, other)?),
        };
        Ok(Self {
            target,
            effect,
            readback_buffer: None,
        })
    }

    /// Advances per-frame animation state. A no-op for the shader effects,
    /// which are pure functions of the current camera texture.
    pub fn advance(&mut self) {
        if let EffectImpl::Scene(cube) = &mut self.effect {
            cube.advance();
        }
    }

    /// Uploads a new camera frame into the effect's input texture.
    pub fn upload_frame(&mut self, ctx: &GpuContext, frame: &VideoFrame) {
        if let EffectImpl::Shader(shader) = &mut self.effect {
            shader.upload_frame(ctx, frame);
        }
    }

    /// Updates the overlay blend color. Ignored by other effects.
    pub fn set_overlay(&mut self, color: [f32; 4]) {
        if let EffectImpl::Shader(shader) = &mut self.effect {
            shader.set_overlay(color);
        }
    }

    /// Resizes the output target.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.target.width && height == self.target.height {
            return;
        }
        self.target = RenderTarget::new(ctx, width, height);
        self.readback_buffer = None;
        if let EffectImpl::Scene(cube) = &mut self.effect {
            cube.resize(ctx, width, height);
        }
    }

    /// Encodes this frame's clear-bind-draw pass into the output target.
    pub fn render(&mut self, ctx: &GpuContext, encoder: &mut wgpu::CommandEncoder) {
        match &mut self.effect {
            EffectImpl::Shader(shader) => {
                shader.encode(ctx, encoder, &self.target.view, self.target.width, self.target.height)
            }
            EffectImpl::Scene(cube) => cube.encode(ctx, encoder, &self.target.view),
        }
    }

    /// View of the most recently rendered output.
    pub fn output_view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    /// Output target dimensions.
    pub fn size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }

    /// Renders one frame and reads the result back to the CPU.
    ///
    /// Drives the photo capture command and the headless frames mode.
    pub fn render_offscreen(&mut self, ctx: &GpuContext) -> Result<VideoFrame> {
        let (width, height) = (self.target.width, self.target.height);

        // Readback rows must be 256-byte aligned.
        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = (unpadded_bytes_per_row + 255) & !255;
        let buffer_size = (padded_bytes_per_row * height) as wgpu::BufferAddress;

        if self
            .readback_buffer
            .as_ref()
            .map(|b| b.size() != buffer_size)
            .unwrap_or(true)
        {
            self.readback_buffer = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback Buffer"),
                size: buffer_size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }));
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Offscreen Encoder"),
            });
        self.render(ctx, &mut encoder);

        let readback = self.readback_buffer.as_ref().unwrap();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        receiver.recv()??;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        readback.unmap();

        Ok(VideoFrame::from_data(width, height, PixelFormat::Rgba, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_valid_glsl() {
        let glsl = r#"
            #version 450
            layout(location = 0) in vec2 uv;
            layout(location = 0) out vec4 color;
            void main() {
                color = vec4(uv, 0.0, 1.0);
            }
        "#;
        let wgsl = translate_glsl(glsl).expect("valid shader should translate");
        assert!(wgsl.contains("fn main"));
    }

    #[test]
    fn test_translate_rejects_broken_glsl() {
        let err = translate_glsl("void main( {").unwrap_err();
        assert!(matches!(err, EffectError::Parse(_)));
    }

    #[test]
    fn test_translate_rejects_undeclared_symbol() {
        // Shader is syntactically fine but references an undeclared symbol.
        let glsl = r#"
            #version 450
            layout(location = 0) out vec4 color;
            void main() {
                color = missing_value;
            }
        "#;
        assert!(translate_glsl(glsl).is_err());
    }

    #[test]
    fn test_descriptor_equality() {
        assert_eq!(EffectDescriptor::Invert, EffectDescriptor::Invert);
        assert_ne!(
            EffectDescriptor::Overlay {
                color: [1.0, 0.0, 0.0, 0.5]
            },
            EffectDescriptor::Cube
        );
    }
}
