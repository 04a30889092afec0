//! CPU-side mesh and material data plus the vertex layout uploaded to the GPU.

use cgmath::Point3;

use crate::data_structures::bounds::BoundingBox;

/// Neutral gray (`0xcccccc`) used when the engine reports no colour.
pub const DEFAULT_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    /// Zero when the mesh came without normals; the shader then skips diffuse lighting.
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Solid surface material. STEP parts carry at most one colour per shell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: [f32; 3],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR,
        }
    }
}

/// Triangle mesh of one converted solid or shell.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn num_elements(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Local-space bounds of all positions.
    pub fn bounding_box(&self) -> BoundingBox {
        self.positions
            .iter()
            .map(|&p| Point3::from(p))
            .collect()
    }

    /// Interleaved vertex data for the GPU.
    pub fn vertices(&self) -> Vec<ModelVertex> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, &position)| ModelVertex {
                position,
                normal: self
                    .normals
                    .as_ref()
                    .and_then(|normals| normals.get(i))
                    .copied()
                    .unwrap_or_default(),
                color: self.material.color,
            })
            .collect()
    }
}
