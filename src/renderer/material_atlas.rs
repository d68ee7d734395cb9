//! Fixed-size material tiles packed into RGBA atlases.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use image::Rgba;
use log::debug;
use serde::Deserialize;

use super::Device;
use super::atlas::{AtlasPacker, check_fits};
use crate::assets::provider::{Source, top_source};
use crate::assets::{Asset, AssetKind, Decoder, Image, LoadContext, SharedHandle, Texture};
use crate::error::{AssetError, AssetResult};

pub const TILE_WIDTH: u32 = 48;
pub const TILE_HEIGHT: u32 = 16;

/// One committed material atlas: its texture and the UV offset of every
/// tile it holds, keyed by the tile's index in the packing call.
#[derive(Debug)]
pub struct MaterialAtlas {
    texture: SharedHandle<Texture>,
    offsets: HashMap<usize, (f32, f32)>,
}

impl MaterialAtlas {
    pub fn texture(&self) -> &SharedHandle<Texture> {
        &self.texture
    }

    /// UV offset `(s, t)` of the tile's top-left corner.
    pub fn get(&self, index: usize) -> Option<(f32, f32)> {
        self.offsets.get(&index).copied()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.offsets.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Size of one tile in UV units.
    pub fn tile_uv_size(&self) -> (f32, f32) {
        (TILE_WIDTH as f32 / self.texture.width as f32, TILE_HEIGHT as f32 / self.texture.height as f32)
    }
}

/// Packs `tiles` in order, opening a new atlas whenever one fills up.
///
/// Every tile must be `TILE_WIDTH`×`TILE_HEIGHT`. Tiles flagged in `opaque`
/// get their alpha forced to 255; a missing flag means translucent.
pub fn pack_materials(
    device: &Arc<dyn Device>,
    capacity: (u32, u32),
    tiles: &[SharedHandle<Image>],
    opaque: &[bool],
) -> AssetResult<Vec<MaterialAtlas>> {
    for (index, tile) in tiles.iter().enumerate() {
        if (tile.width(), tile.height()) != (TILE_WIDTH, TILE_HEIGHT) {
            return Err(AssetError::InvalidTile {
                item: format!("tile {index}"),
                width: tile.width(),
                height: tile.height(),
                expected_width: TILE_WIDTH,
                expected_height: TILE_HEIGHT,
            });
        }
    }
    check_fits("material tile", TILE_WIDTH, TILE_HEIGHT, capacity)?;

    let mut packer = AtlasPacker::<Rgba<u8>>::new(Arc::clone(device), capacity, "materials");
    for (index, tile) in tiles.iter().enumerate() {
        if opaque.get(index).copied().unwrap_or(false) {
            let mut pixels = tile.pixels.clone();
            for pixel in pixels.pixels_mut() {
                pixel.0[3] = 255;
            }
            packer.add(index.to_string(), &pixels)?;
        } else {
            packer.add(index.to_string(), &tile.pixels)?;
        }
    }

    // Items come back in add order, so the running count is the tile index.
    let mut next_index = 0;
    let atlases: Vec<MaterialAtlas> = packer
        .finish()?
        .atlases
        .into_iter()
        .map(|atlas| {
            let offsets = atlas
                .items
                .iter()
                .map(|item| {
                    let entry = (next_index, item.uv_offset());
                    next_index += 1;
                    entry
                })
                .collect();
            MaterialAtlas { texture: atlas.texture, offsets }
        })
        .collect();

    debug!("packed {} material tile(s) into {} atlas(es)", tiles.len(), atlases.len());
    Ok(atlases)
}

// ── MaterialAtlasSet asset ────────────────────────────────────────────────────

/// Every atlas of one material description, with the tile names in index
/// order. Loaded from TOML:
///
/// ```toml
/// size = [512, 512]         # optional, overrides the configured capacity
/// folder = "tiles/terrain"  # optional, every `.png` below it in name order
/// folder_opaque = true
///
/// [[tiles]]
/// path = "tiles/water.png"
/// opaque = false
/// ```
///
/// Listed tiles come first, then the folder's.
#[derive(Debug)]
pub struct MaterialAtlasSet {
    pub atlases: Vec<MaterialAtlas>,
    pub names: Vec<String>,
}

impl Asset for MaterialAtlasSet {
    const KIND: AssetKind = AssetKind::MaterialAtlas;
}

impl MaterialAtlasSet {
    pub fn lookup(&self, index: usize) -> Option<(&MaterialAtlas, (f32, f32))> {
        self.atlases.iter().find_map(|atlas| atlas.get(index).map(|uv| (atlas, uv)))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[derive(Deserialize)]
struct TileEntry {
    path: String,
    #[serde(default)]
    opaque: bool,
}

#[derive(Deserialize)]
struct MaterialAtlasFile {
    #[serde(default)]
    tiles: Vec<TileEntry>,
    folder: Option<String>,
    #[serde(default = "default_true")]
    folder_opaque: bool,
    size: Option<[u32; 2]>,
}

fn default_true() -> bool {
    true
}

pub struct MaterialAtlasDecoder {
    pub capacity: (u32, u32),
}

impl Decoder for MaterialAtlasDecoder {
    type Output = MaterialAtlasSet;

    fn decode(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<MaterialAtlasSet> {
        let text = top_source(sources)?.read_to_string()?;
        let file: MaterialAtlasFile =
            toml::from_str(&text).with_context(|| format!("parsing material atlas `{}`", ctx.name()))?;

        let mut entries: Vec<(String, bool)> = file.tiles.into_iter().map(|t| (t.path, t.opaque)).collect();
        if let Some(folder) = &file.folder {
            let listed = ctx.cache().provider().list(folder)?;
            entries.extend(
                listed
                    .into_iter()
                    .filter(|name| name.to_ascii_lowercase().ends_with(".png"))
                    .map(|name| (name, file.folder_opaque)),
            );
        }

        let mut names = Vec::with_capacity(entries.len());
        let mut tiles = Vec::with_capacity(entries.len());
        let mut opaque = Vec::with_capacity(entries.len());
        for (name, is_opaque) in entries {
            tiles.push(ctx.get::<Image>(&name).with_context(|| format!("resolving tile `{name}`"))?);
            opaque.push(is_opaque);
            names.push(name);
        }

        let capacity = file.size.map_or(self.capacity, |[w, h]| (w, h));
        let atlases = pack_materials(ctx.device(), capacity, &tiles, &opaque)?;
        Ok(MaterialAtlasSet { atlases, names })
    }
}
