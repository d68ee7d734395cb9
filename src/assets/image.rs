use anyhow::Context;
use image::RgbaImage;

use super::provider::{Source, top_source};
use super::resolver::{Decoder, LoadContext};
use super::{Asset, AssetKind};

/// A decoded RGBA8 image kept in CPU memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub pixels: RgbaImage,
}

impl Asset for Image {
    const KIND: AssetKind = AssetKind::Image;
}

impl Image {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn from_memory(bytes: &[u8]) -> anyhow::Result<Self> {
        let decoded = image::load_from_memory(bytes).context("decoding image")?;
        Ok(Self::new(decoded.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    type Output = Image;

    fn decode(&self, _ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Image> {
        let source = top_source(sources)?;
        let origin = source.origin().to_string();
        Image::from_memory(&source.read_to_vec()?).with_context(|| format!("reading {origin}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn png_bytes_decode_to_rgba() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 40]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let decoded = Image::from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(decoded.pixels.get_pixel(2, 1).0, [10, 20, 30, 40]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(Image::from_memory(b"not a png").is_err());
    }
}
