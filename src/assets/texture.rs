use std::fmt;
use std::sync::Arc;

use super::image::Image;
use super::provider::Source;
use super::resolver::{Decoder, LoadContext};
use super::{Asset, AssetKind};
use crate::renderer::{Device, TextureDesc, TextureFormat, TextureId};

/// A texture living on the device. Destroyed when its last handle goes.
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub label: String,
    device: Arc<dyn Device>,
}

impl Texture {
    /// Uploads `pixels` as a new device texture.
    pub fn upload(device: &Arc<dyn Device>, desc: &TextureDesc<'_>, pixels: &[u8]) -> anyhow::Result<Self> {
        let id = device.create_texture(desc, pixels)?;
        Ok(Self {
            id,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            label: desc.label.to_string(),
            device: Arc::clone(device),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Asset for Texture {
    const KIND: AssetKind = AssetKind::Texture;

    fn dispose(&self) -> anyhow::Result<()> {
        log::trace!("destroying texture `{}` ({:?})", self.label, self.id);
        self.device.destroy_texture(self.id)
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("size", &(self.width, self.height))
            .field("format", &self.format)
            .finish()
    }
}

/// Uploads the [`Image`] of the same name. Reads no raw sources itself.
pub struct TextureDecoder;

impl Decoder for TextureDecoder {
    type Output = Texture;

    fn needs_sources(&self) -> bool {
        false
    }

    fn decode(&self, ctx: &LoadContext<'_>, _sources: Vec<Source>) -> anyhow::Result<Texture> {
        let image = ctx.get::<Image>(ctx.name())?;
        let desc = TextureDesc {
            label: ctx.name(),
            width: image.width(),
            height: image.height(),
            format: TextureFormat::Rgba8,
        };
        Texture::upload(ctx.device(), &desc, image.pixels.as_raw())
    }
}
