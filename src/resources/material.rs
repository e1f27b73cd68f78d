use crate::codec::{BinaryCodec, ByteReader, ByteWriter};
use crate::errors::{CorruptDataError, Result};
use crate::loader::GpuUploader;
use crate::resources::{ResourceId, ResourcePayload, ResourceType};

/// Texture binding points of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    Diffuse,
    Normal,
    Occlusion,
    Emissive,
    Specular,
}

impl TextureSlot {
    fn to_u32(self) -> u32 {
        match self {
            Self::Diffuse => 0,
            Self::Normal => 1,
            Self::Occlusion => 2,
            Self::Emissive => 3,
            Self::Specular => 4,
        }
    }

    fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Diffuse,
            1 => Self::Normal,
            2 => Self::Occlusion,
            3 => Self::Emissive,
            4 => Self::Specular,
            _ => return None,
        })
    }
}

/// Material payload: texture slots bound to texture ids, plus scalar terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub textures: Vec<(TextureSlot, ResourceId)>,
    pub diffuse_color: [f32; 4],
    pub specular_color: [f32; 4],
    pub emissive_color: [f32; 4],
    pub shininess: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            textures: Vec::new(),
            diffuse_color: [1.0, 1.0, 1.0, 1.0],
            specular_color: [0.0, 0.0, 0.0, 1.0],
            emissive_color: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.5,
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

impl Material {
    #[must_use]
    pub fn texture(&self, slot: TextureSlot) -> Option<ResourceId> {
        self.textures
            .iter()
            .find_map(|&(s, id)| (s == slot).then_some(id))
    }

    /// Binds `texture` to `slot`, replacing any previous binding.
    pub fn set_texture(&mut self, slot: TextureSlot, texture: ResourceId) {
        self.textures.retain(|&(s, _)| s != slot);
        if !texture.is_none() {
            self.textures.push((slot, texture));
        }
    }
}

impl BinaryCodec for Material {
    fn serialize(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(4 + self.textures.len() * 12 + 60);
        w.count(self.textures.len());
        for &(slot, id) in &self.textures {
            w.u32(slot.to_u32());
            w.u64(id.0);
        }
        w.f32s(&self.diffuse_color);
        w.f32s(&self.specular_color);
        w.f32s(&self.emissive_color);
        w.f32(self.shininess);
        w.f32(self.roughness);
        w.f32(self.metalness);
        w.finish()
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, CorruptDataError> {
        let mut r = ByteReader::new(bytes, ResourceType::Material);

        let count = r.count()?;
        // Each binding takes 12 bytes; refuse absurd counts before allocating.
        if count.saturating_mul(12) > r.remaining() {
            return Err(r.corrupt(format!("{count} texture bindings exceed buffer")));
        }
        let mut textures = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = r.u32()?;
            let slot =
                TextureSlot::from_u32(raw).ok_or_else(|| r.corrupt(format!("unknown slot {raw}")))?;
            let id = ResourceId(r.u64()?);
            textures.push((slot, id));
        }

        let material = Self {
            textures,
            diffuse_color: r.f32_array()?,
            specular_color: r.f32_array()?,
            emissive_color: r.f32_array()?,
            shininess: r.f32()?,
            roughness: r.f32()?,
            metalness: r.f32()?,
        };
        r.finish()?;
        Ok(material)
    }
}

impl ResourcePayload for Material {
    const KIND: ResourceType = ResourceType::Material;

    fn upload(&self, uuid: ResourceId, uploader: &mut dyn GpuUploader) -> Result<()> {
        uploader.upload_material(uuid, self)
    }
}
