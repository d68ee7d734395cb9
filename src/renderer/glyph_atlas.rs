//! Bitmap fonts packed into shared single-channel coverage atlases.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Context;
use image::{GrayImage, Luma, Pixel, imageops};
use log::{debug, warn};
use serde::Deserialize;

use super::Device;
use super::atlas::{AtlasPacker, ItemId, PackedItem, check_fits};
use crate::assets::provider::{Source, top_source};
use crate::assets::{Asset, AssetKind, Decoder, Font, Glyph, LoadContext, SharedHandle};
use crate::error::{AssetError, AssetResult};

// ── PackedFont ────────────────────────────────────────────────────────────────

/// A glyph's metrics and, unless it is blank, its atlas placement.
#[derive(Clone, Debug)]
pub struct PackedGlyph {
    /// `None` for zero-size glyphs such as the space.
    pub item: Option<PackedItem>,
    pub width: u32,
    pub height: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub x_advance: u32,
}

#[derive(Clone, Debug, Default)]
pub struct PackedFont {
    pub line_height: u32,
    pub glyphs: HashMap<char, PackedGlyph>,
}

impl PackedFont {
    pub fn glyph(&self, ch: char) -> Option<&PackedGlyph> {
        self.glyphs.get(&ch)
    }
}

// ── pack_glyphs ───────────────────────────────────────────────────────────────

/// Packs every glyph the fonts define within `ranges`, keyed by font key.
///
/// Fonts are packed smallest line height first. All glyph sizes are checked
/// against `capacity` before anything is uploaded, so an oversize glyph
/// fails the call with no texture created. Glyph regions are checked
/// against their sheet and font keys must be unique.
pub fn pack_glyphs(
    device: &Arc<dyn Device>,
    capacity: (u32, u32),
    fonts: &[(String, SharedHandle<Font>)],
    ranges: &[RangeInclusive<u32>],
) -> AssetResult<HashMap<String, PackedFont>> {
    let codepoints: BTreeSet<char> = ranges
        .iter()
        .flat_map(|range| range.clone().filter_map(char::from_u32))
        .collect();

    let mut seen = HashSet::with_capacity(fonts.len());
    if let Some((key, _)) = fonts.iter().find(|(key, _)| !seen.insert(key.as_str())) {
        return Err(AssetError::DuplicateFont { key: key.clone() });
    }

    let mut order: Vec<&(String, SharedHandle<Font>)> = fonts.iter().collect();
    order.sort_by_key(|(_, font)| font.line_height);

    // ── 1. Validate regions and sizes ────────────────────────────────────
    for (key, font) in &order {
        let (sheet_width, sheet_height) = (font.sheet.width(), font.sheet.height());
        for glyph in codepoints.iter().filter_map(|ch| font.glyph(*ch)) {
            let item = format!("{key}/{:?}", glyph.id);
            if !glyph.fits_in(sheet_width, sheet_height) {
                return Err(AssetError::InvalidGlyph {
                    item,
                    x: glyph.x,
                    y: glyph.y,
                    width: glyph.width,
                    height: glyph.height,
                    sheet_width,
                    sheet_height,
                });
            }
            check_fits(&item, glyph.width, glyph.height, capacity)?;
        }
    }

    // ── 2. Pack ──────────────────────────────────────────────────────────
    let mut packer = AtlasPacker::<Luma<u8>>::new(Arc::clone(device), capacity, "glyphs");
    // Per font in `order`: each glyph with its item, if it has one.
    let mut placed: Vec<Vec<(&Glyph, Option<ItemId>)>> = Vec::with_capacity(order.len());

    for (key, font) in &order {
        let mut glyphs = Vec::new();
        for glyph in codepoints.iter().filter_map(|ch| font.glyph(*ch)) {
            let id = if glyph.width == 0 || glyph.height == 0 {
                None
            } else {
                let coverage = coverage(&font.sheet.pixels, glyph.x, glyph.y, glyph.width, glyph.height);
                Some(packer.add(format!("{key}/{:?}", glyph.id), &coverage)?)
            };
            glyphs.push((glyph, id));
        }
        if glyphs.is_empty() {
            warn!("font `{key}` defines none of the requested codepoints");
        }
        placed.push(glyphs);
    }

    let mut items: Vec<Option<PackedItem>> = packer.finish()?.into_items().into_iter().map(Some).collect();

    // ── 3. Assemble ──────────────────────────────────────────────────────
    let mut packed: HashMap<String, PackedFont> = HashMap::with_capacity(order.len());
    for ((key, font), glyphs) in order.iter().zip(placed) {
        let glyphs = glyphs
            .into_iter()
            .map(|(glyph, id)| {
                let item = id.and_then(|ItemId(i)| items.get_mut(i).and_then(Option::take));
                let packed = PackedGlyph {
                    item,
                    width: glyph.width,
                    height: glyph.height,
                    x_offset: glyph.x_offset,
                    y_offset: glyph.y_offset,
                    x_advance: glyph.x_advance,
                };
                (glyph.id, packed)
            })
            .collect();
        packed.insert(key.clone(), PackedFont { line_height: font.line_height, glyphs });
    }

    debug!(
        "packed {} glyph(s) from {} font(s)",
        packed.values().map(|font| font.glyphs.len()).sum::<usize>(),
        packed.len()
    );
    Ok(packed)
}

/// Crops a glyph region and turns it into alpha coverage: the sheet's alpha
/// scaled by its brightness, so both white-on-transparent and
/// white-on-black sheets work.
fn coverage(sheet: &image::RgbaImage, x: u32, y: u32, width: u32, height: u32) -> GrayImage {
    let region = imageops::crop_imm(sheet, x, y, width, height).to_image();
    GrayImage::from_fn(width, height, |px, py| {
        let pixel = region.get_pixel(px, py);
        let Luma([luma]) = pixel.to_luma();
        let alpha = pixel.0[3];
        Luma([(u16::from(luma) * u16::from(alpha) / 255) as u8])
    })
}

// ── GlyphAtlas asset ──────────────────────────────────────────────────────────

/// Fonts packed together, loaded from a TOML description:
///
/// ```toml
/// fonts = ["fonts/small.json", "fonts/large.json"]
/// ranges = [[32, 126], [0x410, 0x44f]]   # inclusive codepoints, default printable ASCII
/// size = [256, 256]                      # optional, overrides the configured capacity
/// ```
#[derive(Debug)]
pub struct GlyphAtlas {
    pub fonts: HashMap<String, PackedFont>,
}

impl Asset for GlyphAtlas {
    const KIND: AssetKind = AssetKind::GlyphAtlas;
}

impl GlyphAtlas {
    pub fn font(&self, key: &str) -> Option<&PackedFont> {
        self.fonts.get(key)
    }
}

#[derive(Deserialize)]
struct GlyphAtlasFile {
    fonts: Vec<String>,
    #[serde(default = "printable_ascii")]
    ranges: Vec<[u32; 2]>,
    size: Option<[u32; 2]>,
}

fn printable_ascii() -> Vec<[u32; 2]> {
    vec![[0x20, 0x7e]]
}

pub struct GlyphAtlasDecoder {
    pub capacity: (u32, u32),
}

impl Decoder for GlyphAtlasDecoder {
    type Output = GlyphAtlas;

    fn decode(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<GlyphAtlas> {
        let text = top_source(sources)?.read_to_string()?;
        let file: GlyphAtlasFile =
            toml::from_str(&text).with_context(|| format!("parsing glyph atlas `{}`", ctx.name()))?;

        let fonts = file
            .fonts
            .iter()
            .map(|name| ctx.get::<Font>(name).map(|font| (name.clone(), font)))
            .collect::<AssetResult<Vec<_>>>()?;
        let ranges: Vec<RangeInclusive<u32>> = file.ranges.iter().map(|[lo, hi]| *lo..=*hi).collect();
        let capacity = file.size.map_or(self.capacity, |[w, h]| (w, h));

        Ok(GlyphAtlas { fonts: pack_glyphs(ctx.device(), capacity, &fonts, &ranges)? })
    }
}
