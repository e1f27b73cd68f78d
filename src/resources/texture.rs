use crate::codec::{BinaryCodec, ByteReader, ByteWriter};
use crate::errors::{CorruptDataError, Result};
use crate::loader::GpuUploader;
use crate::resources::{ResourceId, ResourcePayload, ResourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Sampler state stored with the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSampling {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub generate_mipmaps: bool,
}

impl Default for TextureSampling {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            generate_mipmaps: true,
        }
    }
}

/// Texture payload: tightly packed 8-bit pixels, row-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub sampling: TextureSampling,
    pub pixels: Vec<u8>,
}

impl Texture {
    #[must_use]
    pub fn new(width: u32, height: u32, channels: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            sampling: TextureSampling::default(),
            pixels,
        }
    }

    /// A `size`×`size` RGB checkerboard made of `cells`×`cells` squares.
    #[must_use]
    pub fn checkerboard(size: u32, cells: u32) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity((size * size * 3) as usize);
        for y in 0..size {
            for x in 0..size {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                let c = if on { 255 } else { 0 };
                pixels.extend_from_slice(&[c, c, c]);
            }
        }
        let mut texture = Self::new(size, size, 3, pixels);
        texture.sampling.min_filter = FilterMode::Nearest;
        texture.sampling.mag_filter = FilterMode::Nearest;
        texture
    }

    /// A 1×1 texture of a single color.
    #[must_use]
    pub fn solid(rgba: [u8; 4]) -> Self {
        let mut texture = Self::new(1, 1, 4, rgba.to_vec());
        texture.sampling.generate_mipmaps = false;
        texture
    }

    #[must_use]
    pub fn expected_len(width: u32, height: u32, channels: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(channels as usize)
    }
}

fn wrap_to_u32(mode: WrapMode) -> u32 {
    match mode {
        WrapMode::Repeat => 0,
        WrapMode::ClampToEdge => 1,
        WrapMode::MirroredRepeat => 2,
    }
}

fn filter_to_u32(mode: FilterMode) -> u32 {
    match mode {
        FilterMode::Nearest => 0,
        FilterMode::Linear => 1,
    }
}

// Layout:
// [width][height][channels][wrap_s][wrap_t][min_filter][mag_filter][mipmaps]
// [pixel_len][pixels]
impl BinaryCodec for Texture {
    fn serialize(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(36 + self.pixels.len());
        w.u32(self.width);
        w.u32(self.height);
        w.u32(self.channels);
        w.u32(wrap_to_u32(self.sampling.wrap_s));
        w.u32(wrap_to_u32(self.sampling.wrap_t));
        w.u32(filter_to_u32(self.sampling.min_filter));
        w.u32(filter_to_u32(self.sampling.mag_filter));
        w.u32(u32::from(self.sampling.generate_mipmaps));
        w.count(self.pixels.len());
        w.bytes(&self.pixels);
        w.finish()
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, CorruptDataError> {
        let mut r = ByteReader::new(bytes, ResourceType::Texture);

        let width = r.u32()?;
        let height = r.u32()?;
        let channels = r.u32()?;
        if !(1..=4).contains(&channels) {
            return Err(r.corrupt(format!("unsupported channel count {channels}")));
        }

        let wrap = |r: &ByteReader<'_>, v: u32| match v {
            0 => Ok(WrapMode::Repeat),
            1 => Ok(WrapMode::ClampToEdge),
            2 => Ok(WrapMode::MirroredRepeat),
            _ => Err(r.corrupt(format!("unknown wrap mode {v}"))),
        };
        let filter = |r: &ByteReader<'_>, v: u32| match v {
            0 => Ok(FilterMode::Nearest),
            1 => Ok(FilterMode::Linear),
            _ => Err(r.corrupt(format!("unknown filter mode {v}"))),
        };

        let v = r.u32()?;
        let wrap_s = wrap(&r, v)?;
        let v = r.u32()?;
        let wrap_t = wrap(&r, v)?;
        let v = r.u32()?;
        let min_filter = filter(&r, v)?;
        let v = r.u32()?;
        let mag_filter = filter(&r, v)?;
        let generate_mipmaps = match r.u32()? {
            0 => false,
            1 => true,
            v => return Err(r.corrupt(format!("invalid mipmap flag {v}"))),
        };

        let pixel_len = r.count()?;
        if Texture::expected_len(width, height, channels) != Some(pixel_len) {
            return Err(r.corrupt(format!(
                "{pixel_len} pixel bytes do not match {width}x{height}x{channels}"
            )));
        }
        let pixels = r.take(pixel_len)?.to_vec();
        r.finish()?;

        Ok(Self {
            width,
            height,
            channels,
            sampling: TextureSampling {
                wrap_s,
                wrap_t,
                min_filter,
                mag_filter,
                generate_mipmaps,
            },
            pixels,
        })
    }
}

impl ResourcePayload for Texture {
    const KIND: ResourceType = ResourceType::Texture;

    fn upload(&self, uuid: ResourceId, uploader: &mut dyn GpuUploader) -> Result<()> {
        uploader.upload_texture(uuid, self)
    }
}
