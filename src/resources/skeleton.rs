use crate::codec::{BinaryCodec, ByteReader, ByteWriter};
use crate::errors::{CorruptDataError, Result};
use crate::loader::GpuUploader;
use crate::resources::{ResourceId, ResourcePayload, ResourceType};

const ROOT_PARENT: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Index of the parent joint, `None` for a root.
    pub parent: Option<u32>,
    /// Column-major bind-pose transform, in model space.
    pub transform: [f32; 16],
}

/// Skeleton payload: joints ordered so that a parent always precedes its
/// children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
}

impl Skeleton {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }
}

// Layout:
// [joint_count][name_len × n][parent × n][transform f32×16 × n][name bytes]
impl BinaryCodec for Skeleton {
    fn serialize(&self) -> Vec<u8> {
        let n = self.joints.len();
        let names: usize = self.joints.iter().map(|j| j.name.len()).sum();
        let mut w = ByteWriter::with_capacity(4 + n * (8 + 64) + names);

        w.count(n);
        for j in &self.joints {
            w.count(j.name.len());
        }
        for j in &self.joints {
            w.u32(j.parent.unwrap_or(ROOT_PARENT));
        }
        for j in &self.joints {
            w.f32s(&j.transform);
        }
        for j in &self.joints {
            w.bytes(j.name.as_bytes());
        }
        w.finish()
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, CorruptDataError> {
        let mut r = ByteReader::new(bytes, ResourceType::Skeleton);

        let n = r.count()?;
        let name_lengths = r.pod_vec::<u32>(n)?;
        let parents = r.pod_vec::<u32>(n)?;
        let transforms = r.pod_vec::<[f32; 16]>(n)?;

        let mut joints = Vec::with_capacity(n);
        for (index, ((len, parent), transform)) in name_lengths
            .into_iter()
            .zip(parents)
            .zip(transforms)
            .enumerate()
        {
            let parent = if parent == ROOT_PARENT {
                None
            } else if (parent as usize) < index {
                Some(parent)
            } else {
                return Err(r.corrupt(format!(
                    "joint {index} has parent {parent} that does not precede it"
                )));
            };
            joints.push(Joint {
                name: r.string(len as usize)?,
                parent,
                transform,
            });
        }
        r.finish()?;

        Ok(Self { joints })
    }
}

impl ResourcePayload for Skeleton {
    const KIND: ResourceType = ResourceType::Skeleton;

    fn upload(&self, uuid: ResourceId, uploader: &mut dyn GpuUploader) -> Result<()> {
        uploader.upload_skeleton(uuid, self)
    }
}
