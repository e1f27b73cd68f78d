use std::path::Path;

use image::GenericImageView;
use rustc_hash::FxHashSet;

use crate::codec::{BinaryCodec, MAX_SECTION_LEN};
use crate::errors::{ImportError, Result};
use crate::fingerprint::Fingerprint;
use crate::importer::{Importer, Staged};
use crate::meta::{ImportKind, ImportOptions, META_VERSION};
use crate::resources::{ResourceType, Texture};

/// Decodes an image file into an 8-bit texture payload: RGBA if the image
/// carries alpha, RGB otherwise.
pub(crate) fn decode_image(source: &Path, bytes: &[u8]) -> std::result::Result<Texture, ImportError> {
    let image = image::load_from_memory(bytes).map_err(|e| ImportError::decompose(source, e))?;
    let (width, height) = image.dimensions();
    let channels: u32 = if image.color().has_alpha() { 4 } else { 3 };
    if Texture::expected_len(width, height, channels).is_none_or(|len| len > MAX_SECTION_LEN) {
        return Err(ImportError::decompose(
            source,
            format!("{width}x{height} image exceeds the library format"),
        ));
    }
    let texture = if channels == 4 {
        Texture::new(width, height, 4, image.into_rgba8().into_raw())
    } else {
        Texture::new(width, height, 3, image.into_rgb8().into_raw())
    };
    Ok(texture)
}

impl Importer {
    pub(super) fn import_texture(
        &self,
        source: &Path,
        bytes: &[u8],
        fingerprint: Fingerprint,
        previous: Option<&ImportOptions>,
    ) -> Result<ImportOptions> {
        let texture = decode_image(source, bytes)?;

        let uuid = match previous {
            Some(p) if p.importer == ImportKind::Texture => p.uuid,
            _ => self.fresh_id(&mut FxHashSet::default()),
        };
        let target = self
            .config
            .textures_dir()
            .join(format!("{uuid}.{}", ResourceType::Texture.library_extension()));

        let staged = Staged::new(&*self.fs, target);
        staged.write(staged.path(), &texture.serialize())?;

        let record = ImportOptions {
            version: META_VERSION,
            uuid,
            importer: ImportKind::Texture,
            source_path: source.to_path_buf(),
            exported_path: staged.target().to_path_buf(),
            fingerprint,
            children: Vec::new(),
        };
        self.commit(staged, record.clone(), previous)?;
        log::debug!(
            "Texture {} decoded: {}x{}, {} channels.",
            source.display(),
            texture.width,
            texture.height,
            texture.channels
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(image: &image::DynamicImage) -> Vec<u8> {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn opaque_image_keeps_three_channels() {
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            3,
            2,
            image::Rgb([10, 20, 30]),
        ));
        let texture = decode_image(Path::new("a.png"), &png(&image)).unwrap();
        assert_eq!((texture.width, texture.height, texture.channels), (3, 2, 3));
        assert_eq!(&texture.pixels[..3], &[10, 20, 30]);
        assert_eq!(texture.pixels.len(), 18);
    }

    #[test]
    fn alpha_image_keeps_four_channels() {
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            2,
            image::Rgba([1, 2, 3, 4]),
        ));
        let texture = decode_image(Path::new("a.png"), &png(&image)).unwrap();
        assert_eq!(texture.channels, 4);
        assert_eq!(&texture.pixels[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn garbage_is_a_decompose_error() {
        let err = decode_image(Path::new("bad.png"), b"not an image").unwrap_err();
        assert!(matches!(err, ImportError::Decompose { .. }));
    }
}
