use std::collections::HashMap;

use anyhow::{Context, ensure};
use serde::Deserialize;

use super::handle::SharedHandle;
use super::image::Image;
use super::provider::{Source, top_source};
use super::resolver::{Decoder, LoadContext};
use super::{Asset, AssetKind};

// ── Glyph ────────────────────────────────────────────────────────────────────

/// Metrics for a single character and its region in the font sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// The Unicode character this glyph represents.
    pub id: char,
    /// Top-left pixel X of the glyph region in the sheet.
    pub x: u32,
    /// Top-left pixel Y of the glyph region in the sheet.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Horizontal offset applied when rendering (may be negative).
    pub x_offset: i32,
    /// Vertical offset applied when rendering (may be negative).
    pub y_offset: i32,
    /// How far to advance the cursor after drawing this glyph.
    pub x_advance: u32,
}

impl Glyph {
    /// Whether the glyph region lies inside a `width`×`height` sheet.
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

// ── Font ─────────────────────────────────────────────────────────────────────

/// A bitmap font: glyph metrics plus the sheet image they are cut from.
///
/// The sheet is an ordinary cached [`Image`]; fonts sharing a sheet share
/// one decode.
#[derive(Debug)]
pub struct Font {
    pub glyphs: HashMap<char, Glyph>,
    /// Vertical distance between successive baselines in pixels.
    pub line_height: u32,
    pub sheet: SharedHandle<Image>,
}

impl Asset for Font {
    const KIND: AssetKind = AssetKind::Font;
}

impl Font {
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&ch)
    }
}

/// A parsed font descriptor whose sheet has not been resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    pub sheet: String,
    pub line_height: u32,
    pub glyphs: HashMap<char, Glyph>,
}

impl FontDescriptor {
    /// Parses either descriptor layout:
    ///
    /// ```json
    /// { "sheet": "fonts/mono.png", "line_height": 16,
    ///   "glyphs": [ { "id": 65, "x": 0, "y": 0, "width": 8, "height": 16,
    ///                 "x_offset": 0, "y_offset": 0, "x_advance": 9 } ] }
    /// ```
    ///
    /// or the grid layout keyed by character, where the advance is the glyph
    /// width and the line height defaults to the tallest glyph:
    ///
    /// ```json
    /// { "sheet": "fonts/mono.png", "glyphs": { "A": { "x": 0, "y": 0, "w": 8, "h": 16 } } }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFont = serde_json::from_str(json)?;

        let glyphs: HashMap<char, Glyph> = match raw.glyphs {
            RawGlyphs::List(list) => list
                .into_iter()
                .filter_map(|g| {
                    // Skip any code-point that isn't a valid Unicode scalar value.
                    char::from_u32(g.id).map(|ch| {
                        (ch, Glyph {
                            id: ch,
                            x: g.x,
                            y: g.y,
                            width: g.width,
                            height: g.height,
                            x_offset: g.x_offset,
                            y_offset: g.y_offset,
                            x_advance: g.x_advance,
                        })
                    })
                })
                .collect(),
            RawGlyphs::Grid(grid) => grid
                .into_iter()
                .filter_map(|(key, entry)| {
                    let mut chars = key.chars();
                    let ch = chars.next()?;
                    if chars.next().is_some() {
                        return None;
                    }
                    Some((ch, Glyph {
                        id: ch,
                        x: entry.x,
                        y: entry.y,
                        width: entry.w,
                        height: entry.h,
                        x_offset: 0,
                        y_offset: 0,
                        x_advance: entry.w,
                    }))
                })
                .collect(),
        };

        let line_height = raw
            .line_height
            .unwrap_or_else(|| glyphs.values().map(|g| g.height).max().unwrap_or(0));

        Ok(Self { sheet: raw.sheet, line_height, glyphs })
    }

    /// Every glyph region must lie inside a `width`×`height` sheet.
    pub fn check_bounds(&self, width: u32, height: u32) -> anyhow::Result<()> {
        for glyph in self.glyphs.values() {
            ensure!(
                glyph.fits_in(width, height),
                "glyph {:?} at ({}, {}) size {}x{} lies outside the {width}x{height} sheet `{}`",
                glyph.id,
                glyph.x,
                glyph.y,
                glyph.width,
                glyph.height,
                self.sheet
            );
        }
        Ok(())
    }
}

// ── Raw (JSON-facing) types ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawGlyph {
    /// Unicode code point (e.g. 65 for 'A').
    id: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    #[serde(default)]
    x_offset: i32,
    #[serde(default)]
    y_offset: i32,
    x_advance: u32,
}

#[derive(Deserialize)]
struct GridEntry {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGlyphs {
    List(Vec<RawGlyph>),
    Grid(HashMap<String, GridEntry>),
}

#[derive(Deserialize)]
struct RawFont {
    sheet: String,
    line_height: Option<u32>,
    glyphs: RawGlyphs,
}

// ── FontDecoder ───────────────────────────────────────────────────────────────

pub struct FontDecoder;

impl Decoder for FontDecoder {
    type Output = Font;

    fn decode(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Font> {
        let json = top_source(sources)?.read_to_string()?;
        let descriptor =
            FontDescriptor::from_json(&json).with_context(|| format!("parsing font `{}`", ctx.name()))?;

        let sheet = ctx
            .get::<Image>(&descriptor.sheet)
            .with_context(|| format!("resolving sheet of font `{}`", ctx.name()))?;
        descriptor.check_bounds(sheet.width(), sheet.height())?;

        Ok(Font { glyphs: descriptor.glyphs, line_height: descriptor.line_height, sheet })
    }
}
