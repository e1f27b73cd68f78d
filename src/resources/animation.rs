use crate::codec::{BinaryCodec, ByteReader, ByteWriter};
use crate::errors::{CorruptDataError, Result};
use crate::loader::GpuUploader;
use crate::resources::{ResourceId, ResourcePayload, ResourceType};

/// Pose of one node at one keyframe.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub translation: [f32; 3],
    /// Quaternion, `[x, y, z, w]`.
    pub rotation: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrame {
    pub frame: f32,
    pub channels: Vec<Channel>,
}

/// Animation payload: a clip sampled into keyframes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub name: String,
    pub keyframes: Vec<KeyFrame>,
    pub frames: f32,
    pub frames_per_second: f32,
}

impl Animation {
    /// Clip length in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        if self.frames_per_second > 0.0 {
            self.frames / self.frames_per_second
        } else {
            0.0
        }
    }
}

// Layout:
// [name_len][keyframe_count][frames][fps][name]
// per keyframe: [frame][channel_count]
// per channel:  [name_len][name][translation f32×3][rotation f32×4]
impl BinaryCodec for Animation {
    fn serialize(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        w.count(self.name.len());
        w.count(self.keyframes.len());
        w.f32(self.frames);
        w.f32(self.frames_per_second);
        w.bytes(self.name.as_bytes());

        for key in &self.keyframes {
            w.f32(key.frame);
            w.count(key.channels.len());
            for channel in &key.channels {
                w.count(channel.name.len());
                w.bytes(channel.name.as_bytes());
                w.f32s(&channel.translation);
                w.f32s(&channel.rotation);
            }
        }
        w.finish()
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, CorruptDataError> {
        let mut r = ByteReader::new(bytes, ResourceType::Animation);

        let name_len = r.count()?;
        let keyframe_count = r.count()?;
        let frames = r.f32()?;
        let frames_per_second = r.f32()?;
        let name = r.string(name_len)?;

        // A keyframe needs at least 8 bytes.
        if keyframe_count.saturating_mul(8) > r.remaining() {
            return Err(r.corrupt(format!("{keyframe_count} keyframes exceed buffer")));
        }

        let mut keyframes = Vec::with_capacity(keyframe_count);
        for _ in 0..keyframe_count {
            let frame = r.f32()?;
            let channel_count = r.count()?;
            if channel_count.saturating_mul(32) > r.remaining() {
                return Err(r.corrupt(format!("{channel_count} channels exceed buffer")));
            }
            let mut channels = Vec::with_capacity(channel_count);
            for _ in 0..channel_count {
                let len = r.count()?;
                channels.push(Channel {
                    name: r.string(len)?,
                    translation: r.f32_array()?,
                    rotation: r.f32_array()?,
                });
            }
            keyframes.push(KeyFrame { frame, channels });
        }
        r.finish()?;

        Ok(Self {
            name,
            keyframes,
            frames,
            frames_per_second,
        })
    }
}

impl ResourcePayload for Animation {
    const KIND: ResourceType = ResourceType::Animation;

    fn upload(&self, uuid: ResourceId, uploader: &mut dyn GpuUploader) -> Result<()> {
        uploader.upload_animation(uuid, self)
    }
}
