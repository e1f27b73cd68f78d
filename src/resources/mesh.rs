use bytemuck::{Pod, Zeroable};

use crate::codec::{BinaryCodec, ByteReader, ByteWriter};
use crate::errors::{CorruptDataError, Result};
use crate::loader::GpuUploader;
use crate::resources::{ResourceId, ResourcePayload, ResourceType};

/// Interleaved vertex as stored in library mesh files.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

/// Mesh payload: index and vertex buffers plus the exported paths of the
/// textures its material uses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub indices: Vec<u32>,
    pub vertices: Vec<Vertex>,
    pub material_paths: Vec<String>,
}

impl Mesh {
    #[must_use]
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, material_paths: Vec<String>) -> Self {
        Self {
            indices,
            vertices,
            material_paths,
        }
    }

    /// Axis-aligned bounds of the vertex positions, `None` for an empty mesh.
    #[must_use]
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(mut min, mut max), v| {
            for axis in 0..3 {
                min[axis] = min[axis].min(v.position[axis]);
                max[axis] = max[axis].max(v.position[axis]);
            }
            (min, max)
        }))
    }
}

// Layout:
// [u32 index_count][u32 vertex_count][u32 material_count]
// [indices][vertices][material_path_lengths][material_path_bytes]
impl BinaryCodec for Mesh {
    fn serialize(&self) -> Vec<u8> {
        let path_bytes: usize = self.material_paths.iter().map(String::len).sum();
        let mut w = ByteWriter::with_capacity(
            12 + self.indices.len() * 4
                + self.vertices.len() * std::mem::size_of::<Vertex>()
                + self.material_paths.len() * 4
                + path_bytes,
        );

        w.count(self.indices.len());
        w.count(self.vertices.len());
        w.count(self.material_paths.len());

        w.pod_slice(&self.indices);
        w.pod_slice(&self.vertices);
        for path in &self.material_paths {
            w.count(path.len());
        }
        for path in &self.material_paths {
            w.bytes(path.as_bytes());
        }
        w.finish()
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, CorruptDataError> {
        let mut r = ByteReader::new(bytes, ResourceType::Mesh);

        let index_count = r.count()?;
        let vertex_count = r.count()?;
        let material_count = r.count()?;

        let indices = r.pod_vec::<u32>(index_count)?;
        let vertices = r.pod_vec::<Vertex>(vertex_count)?;
        let lengths = r.pod_vec::<u32>(material_count)?;

        let mut material_paths = Vec::with_capacity(material_count);
        for len in lengths {
            material_paths.push(r.string(len as usize)?);
        }
        r.finish()?;

        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(CorruptDataError::new(
                ResourceType::Mesh,
                format!("index {bad} out of range for {vertex_count} vertices"),
            ));
        }

        Ok(Self {
            indices,
            vertices,
            material_paths,
        })
    }
}

impl ResourcePayload for Mesh {
    const KIND: ResourceType = ResourceType::Mesh;

    fn upload(&self, uuid: ResourceId, uploader: &mut dyn GpuUploader) -> Result<()> {
        uploader.upload_mesh(uuid, self)
    }
}
