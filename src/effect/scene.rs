//! Scene primitives for the cube effect: camera, lights, box mesh.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// A perspective camera looking at a fixed target.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub eye: Vec3,
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(2.0, 5.0, 5.0),
            target: Vec3::ZERO,
            fov_y: 70f32.to_radians(),
            znear: 0.01,
            zfar: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    /// Combined projection-view matrix for the given aspect ratio.
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.znear, self.zfar);
        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        proj * view
    }
}

/// Uniform background illumination.
#[derive(Debug, Clone)]
pub struct AmbientLight {
    pub color: Vec3,
}

impl Default for AmbientLight {
    fn default() -> Self {
        // 0x101010
        Self {
            color: Vec3::splat(16.0 / 255.0),
        }
    }
}

/// A point light emitting equally in all directions.
#[derive(Debug, Clone)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 100.0, 300.0),
            color: Vec3::ONE,
            intensity: 2.0,
        }
    }
}

/// Vertex of the box mesh.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl SceneVertex {
    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SceneVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// A unit box centered at the origin, four vertices per face so normals stay
/// flat.
pub fn box_mesh() -> (Vec<SceneVertex>, Vec<u16>) {
    const H: f32 = 0.5;
    // (normal, four corners counter-clockwise seen from outside)
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        (
            [0.0, 0.0, 1.0],
            [[-H, -H, H], [H, -H, H], [H, H, H], [-H, H, H]],
        ),
        (
            [0.0, 0.0, -1.0],
            [[H, -H, -H], [-H, -H, -H], [-H, H, -H], [H, H, -H]],
        ),
        (
            [1.0, 0.0, 0.0],
            [[H, -H, H], [H, -H, -H], [H, H, -H], [H, H, H]],
        ),
        (
            [-1.0, 0.0, 0.0],
            [[-H, -H, -H], [-H, -H, H], [-H, H, H], [-H, H, -H]],
        ),
        (
            [0.0, 1.0, 0.0],
            [[-H, H, H], [H, H, H], [H, H, -H], [-H, H, -H]],
        ),
        (
            [0.0, -1.0, 0.0],
            [[-H, -H, -H], [H, -H, -H], [H, -H, H], [-H, -H, H]],
        ),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, corners)) in faces.iter().enumerate() {
        let base = (face * 4) as u16;
        for corner in corners {
            vertices.push(SceneVertex {
                position: *corner,
                normal: *normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_mesh_shape() {
        let (vertices, indices) = box_mesh();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        for v in &vertices {
            let n = Vec3::from_array(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_view_proj_is_finite() {
        let camera = PerspectiveCamera::default();
        let m = camera.view_proj(16.0 / 9.0);
        assert!(m.to_cols_array().iter().all(|x| x.is_finite()));
    }
}
