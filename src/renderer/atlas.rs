use std::sync::Arc;

use image::{ImageBuffer, Luma, Pixel, Rgba, imageops};
use log::debug;

use super::{Device, TextureDesc, TextureFormat};
use crate::assets::{SharedHandle, Texture};
use crate::error::{AssetError, AssetResult};

// ── PackedRect ────────────────────────────────────────────────────────────────

/// Pixel rectangle inside an atlas.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PackedRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &PackedRect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

// ── Shelf packing (pure, GPU-free) ───────────────────────────────────────────

/// Row-by-row placement cursor over a fixed-size area.
///
/// Items go left to right; an item that would cross the right edge starts a
/// new row below the tallest item of the current one. An item that would
/// cross the bottom edge is refused and the cursor is left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shelf {
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    row_height: u32,
}

impl Shelf {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, x: 0, y: 0, row_height: 0 }
    }

    /// `false` when no empty shelf could ever hold a `w`×`h` item.
    pub fn fits_capacity(&self, w: u32, h: u32) -> bool {
        w <= self.width && h <= self.height
    }

    /// Places a `w`×`h` item, or returns `None` when this shelf is full.
    pub fn place(&mut self, w: u32, h: u32) -> Option<PackedRect> {
        let (mut x, mut y, mut row_height) = (self.x, self.y, self.row_height);
        if x + w > self.width {
            x = 0;
            y += row_height;
            row_height = 0;
        }
        if x + w > self.width || y + h > self.height {
            return None;
        }

        self.x = x + w;
        self.y = y;
        self.row_height = row_height.max(h);
        Some(PackedRect { x, y, width: w, height: h })
    }
}

/// Fails with [`AssetError::AtlasTooSmall`] if an item can never fit.
pub fn check_fits(key: &str, width: u32, height: u32, capacity: (u32, u32)) -> AssetResult<()> {
    if Shelf::new(capacity.0, capacity.1).fits_capacity(width, height) {
        return Ok(());
    }
    Err(AssetError::AtlasTooSmall {
        item: key.to_string(),
        width,
        height,
        capacity_width: capacity.0,
        capacity_height: capacity.1,
    })
}

// ── Atlas pixels ──────────────────────────────────────────────────────────────

/// Pixel types an atlas bitmap can hold, with the device format they map to.
pub trait AtlasPixel: Pixel<Subpixel = u8> + 'static {
    const FORMAT: TextureFormat;
}

impl AtlasPixel for Luma<u8> {
    const FORMAT: TextureFormat = TextureFormat::R8;
}

impl AtlasPixel for Rgba<u8> {
    const FORMAT: TextureFormat = TextureFormat::Rgba8;
}

// ── Packed output ─────────────────────────────────────────────────────────────

/// One packed source image. Each item keeps its atlas texture alive.
#[derive(Clone, Debug)]
pub struct PackedItem {
    pub key: String,
    pub rect: PackedRect,
    pub texture: SharedHandle<Texture>,
}

impl PackedItem {
    /// Normalised `(min, max)` texture coordinates of the item.
    pub fn uv(&self) -> ([f32; 2], [f32; 2]) {
        let (tw, th) = (self.texture.width as f32, self.texture.height as f32);
        (
            [self.rect.x as f32 / tw, self.rect.y as f32 / th],
            [self.rect.right() as f32 / tw, self.rect.bottom() as f32 / th],
        )
    }

    /// Normalised top-left corner.
    pub fn uv_offset(&self) -> (f32, f32) {
        let ([s, t], _) = self.uv();
        (s, t)
    }
}

#[derive(Debug)]
pub struct CommittedAtlas {
    pub texture: SharedHandle<Texture>,
    /// In the order they were added.
    pub items: Vec<PackedItem>,
}

/// Index of an item within its packing run, in add order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemId(pub usize);

/// Everything one packing run committed.
#[derive(Debug, Default)]
pub struct PackRun {
    pub atlases: Vec<CommittedAtlas>,
}

impl PackRun {
    pub fn items(&self) -> impl Iterator<Item = &PackedItem> {
        self.atlases.iter().flat_map(|atlas| atlas.items.iter())
    }

    /// All items in add order; `ItemId(i)` is the `i`-th entry.
    pub fn into_items(self) -> Vec<PackedItem> {
        self.atlases.into_iter().flat_map(|atlas| atlas.items).collect()
    }

    pub fn item_count(&self) -> usize {
        self.atlases.iter().map(|atlas| atlas.items.len()).sum()
    }
}

// ── AtlasPacker ───────────────────────────────────────────────────────────────

struct Session<P: AtlasPixel> {
    bitmap: ImageBuffer<P, Vec<u8>>,
    shelf: Shelf,
    placements: Vec<(String, PackedRect)>,
}

/// A packing run: fills fixed-capacity bitmaps, sealing each one when it
/// overflows, and uploads every sealed bitmap when the run finishes.
///
/// Items are placed in the order they are added. Nothing reaches the device
/// before `finish`, so a failed `add` leaves no texture behind. If an upload
/// fails, the textures created so far are released with the packer.
pub struct AtlasPacker<P: AtlasPixel> {
    device: Arc<dyn Device>,
    capacity: (u32, u32),
    label: String,
    session: Option<Session<P>>,
    sealed: Vec<Session<P>>,
    added: usize,
}

impl<P: AtlasPixel> AtlasPacker<P> {
    pub fn new(device: Arc<dyn Device>, capacity: (u32, u32), label: impl Into<String>) -> Self {
        Self { device, capacity, label: label.into(), session: None, sealed: Vec::new(), added: 0 }
    }

    pub fn capacity(&self) -> (u32, u32) {
        self.capacity
    }

    /// Copies `image` into the current atlas, sealing it first if full.
    pub fn add(&mut self, key: impl Into<String>, image: &ImageBuffer<P, Vec<u8>>) -> AssetResult<ItemId> {
        let key = key.into();
        let (w, h) = image.dimensions();
        check_fits(&key, w, h, self.capacity)?;

        let rect = match self.session_mut().shelf.place(w, h) {
            Some(rect) => rect,
            None => {
                self.seal();
                // A fresh shelf holds anything that passed `check_fits`.
                self.session_mut().shelf.place(w, h).ok_or_else(|| AssetError::AtlasTooSmall {
                    item: key.clone(),
                    width: w,
                    height: h,
                    capacity_width: self.capacity.0,
                    capacity_height: self.capacity.1,
                })?
            }
        };

        let session = self.session_mut();
        imageops::replace(&mut session.bitmap, image, i64::from(rect.x), i64::from(rect.y));
        session.placements.push((key, rect));

        let id = ItemId(self.added);
        self.added += 1;
        Ok(id)
    }

    fn session_mut(&mut self) -> &mut Session<P> {
        let (width, height) = self.capacity;
        self.session.get_or_insert_with(|| Session {
            bitmap: ImageBuffer::new(width, height),
            shelf: Shelf::new(width, height),
            placements: Vec::new(),
        })
    }

    /// Closes the current bitmap, if it holds anything. The next `add` starts
    /// a new one.
    pub fn seal(&mut self) {
        if let Some(session) = self.session.take()
            && !session.placements.is_empty()
        {
            self.sealed.push(session);
        }
    }

    /// Number of bitmaps the run holds so far, sealed or open.
    pub fn atlas_count(&self) -> usize {
        self.sealed.len() + usize::from(self.session.as_ref().is_some_and(|s| !s.placements.is_empty()))
    }

    /// Uploads every bitmap of the run and hands back the committed atlases.
    pub fn finish(mut self) -> AssetResult<PackRun> {
        self.seal();
        let mut atlases = Vec::with_capacity(self.sealed.len());
        for (n, session) in std::mem::take(&mut self.sealed).into_iter().enumerate() {
            atlases.push(self.upload(n, session)?);
        }
        Ok(PackRun { atlases })
    }

    fn upload(&self, n: usize, session: Session<P>) -> AssetResult<CommittedAtlas> {
        let label = format!("{}#{n}", self.label);
        let desc = TextureDesc {
            label: &label,
            width: self.capacity.0,
            height: self.capacity.1,
            format: P::FORMAT,
        };
        let texture = Texture::upload(&self.device, &desc, session.bitmap.as_raw()).map_err(AssetError::device)?;
        let texture = SharedHandle::from_asset(texture);

        debug!("committed atlas `{label}` with {} item(s)", session.placements.len());
        let items = session
            .placements
            .into_iter()
            .map(|(key, rect)| PackedItem { key, rect, texture: texture.retain() })
            .collect();
        Ok(CommittedAtlas { texture, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shelf_wraps_then_overflows() {
        let mut shelf = Shelf::new(64, 64);
        assert_eq!(shelf.place(40, 40), Some(PackedRect { x: 0, y: 0, width: 40, height: 40 }));
        assert_eq!(shelf.place(40, 40), None);
        // A refused item leaves the cursor where it was.
        assert_eq!(shelf.place(20, 20), Some(PackedRect { x: 40, y: 0, width: 20, height: 20 }));
    }

    #[test]
    fn shelf_starts_new_row_below_tallest_item() {
        let mut shelf = Shelf::new(32, 32);
        shelf.place(16, 8).unwrap();
        shelf.place(16, 12).unwrap();
        assert_eq!(shelf.place(4, 4), Some(PackedRect { x: 0, y: 12, width: 4, height: 4 }));
    }

    #[test]
    fn shelf_placements_never_overlap_or_leave_bounds() {
        let mut shelf = Shelf::new(100, 60);
        let sizes = [(30, 10), (50, 20), (25, 5), (10, 30), (60, 10), (40, 15), (33, 7), (1, 1)];
        let placed: Vec<PackedRect> = sizes.iter().filter_map(|&(w, h)| shelf.place(w, h)).collect();

        assert!(placed.len() >= 6);
        for (i, a) in placed.iter().enumerate() {
            assert!(a.right() <= 100 && a.bottom() <= 60, "{a:?} out of bounds");
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn oversize_check_names_the_item() {
        assert!(check_fits("ok", 64, 64, (64, 64)).is_ok());
        match check_fits("big", 65, 1, (64, 64)) {
            Err(AssetError::AtlasTooSmall { item, width, .. }) => assert_eq!((item.as_str(), width), ("big", 65)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
