//! Video frame types and the fullscreen-triangle geometry.

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use std::path::Path;

/// Supported pixel formats for video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB with 8 bits per channel (24 bits per pixel)
    Rgb,
    /// RGBA with 8 bits per channel (32 bits per pixel)
    Rgba,
}

impl PixelFormat {
    /// Returns the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

/// A video frame containing image data.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of the frame data
    pub format: PixelFormat,
    /// Raw pixel data
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Creates a new zeroed video frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; size],
        }
    }

    /// Creates a video frame from existing data.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Creates a single-color RGBA frame. Used for the no-camera fallback view.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self::from_data(width, height, PixelFormat::Rgba, data)
    }

    /// Decodes an image file into an RGBA frame.
    pub fn from_image(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to open image {:?}", path))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_data(
            width,
            height,
            PixelFormat::Rgba,
            img.into_raw(),
        ))
    }

    /// Encodes this frame as a PNG file.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let rgba = self.to_rgba();
        let img = image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
            .ok_or_else(|| anyhow!("Frame data does not match {}x{}", rgba.width, rgba.height))?;
        img.save(path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    /// Converts this frame to RGBA format.
    pub fn to_rgba(&self) -> VideoFrame {
        if self.format == PixelFormat::Rgba {
            return self.clone();
        }

        let pixel_count = (self.width as usize) * (self.height as usize);
        let mut rgba_data = vec![0u8; pixel_count * 4];

        // RGB -> RGBA: add alpha=255, no color conversion needed
        for i in 0..pixel_count {
            rgba_data[i * 4] = self.data[i * 3];
            rgba_data[i * 4 + 1] = self.data[i * 3 + 1];
            rgba_data[i * 4 + 2] = self.data[i * 3 + 2];
            rgba_data[i * 4 + 3] = 255;
        }

        VideoFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba,
            data: rgba_data,
        }
    }
}

/// Vertex of the fullscreen effect triangle.
///
/// Only a 2D position is stored; the vertex shader derives the texture
/// coordinate from it and maps it to clip space as `1 - 2 * position`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct EffectVertex {
    pub position: [f32; 2],
}

impl EffectVertex {
    /// Three vertices whose `1 - 2 * position` images cover the viewport.
    pub const VERTICES: &'static [EffectVertex] = &[
        EffectVertex { position: [-2.0, 0.0] },
        EffectVertex { position: [0.0, -2.0] },
        EffectVertex { position: [2.0, 2.0] },
    ];

    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<EffectVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_rgba_conversion() {
        let rgb_data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
        let frame = VideoFrame::from_data(2, 2, PixelFormat::Rgb, rgb_data);
        let rgba_frame = frame.to_rgba();

        assert_eq!(rgba_frame.format, PixelFormat::Rgba);
        assert_eq!(rgba_frame.data.len(), 16);
        // Check first pixel (red)
        assert_eq!(&rgba_frame.data[0..4], &[255, 0, 0, 255]);
        // Check second pixel (green)
        assert_eq!(&rgba_frame.data[4..8], &[0, 255, 0, 255]);
    }

    #[test]
    fn test_solid_frame() {
        let frame = VideoFrame::solid(4, 2, [10, 20, 30, 255]);
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        assert_eq!(&frame.data[4..8], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_triangle_covers_viewport() {
        // Map each vertex through the vertex shader's clip-space formula and
        // check that every corner of the [-1, 1]^2 viewport lies inside (or on
        // the boundary of) the resulting triangle.
        let clip: Vec<[f32; 2]> = EffectVertex::VERTICES
            .iter()
            .map(|v| [1.0 - 2.0 * v.position[0], 1.0 - 2.0 * v.position[1]])
            .collect();

        let edge = |a: [f32; 2], b: [f32; 2], p: [f32; 2]| -> f32 {
            (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
        };

        for corner in [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]] {
            let e0 = edge(clip[0], clip[1], corner);
            let e1 = edge(clip[1], clip[2], corner);
            let e2 = edge(clip[2], clip[0], corner);
            let inside = (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0)
                || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0);
            assert!(inside, "viewport corner {:?} not covered", corner);
        }
    }
}
