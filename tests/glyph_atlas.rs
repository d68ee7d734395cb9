mod common;

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use jassets::AssetError;
use jassets::assets::{Font, Glyph, Image, MemoryProvider, SharedHandle};
use jassets::renderer::TextureFormat;
use jassets::renderer::glyph_atlas::{GlyphAtlas, pack_glyphs};

use common::{headless, png, standard_cache, texel};

// ── helpers ───────────────────────────────────────────────────────────────────

/// 8×6 sheet: an opaque white 'A' at x 0..4, a half-transparent white 'B'
/// at x 4..8.
fn sheet() -> RgbaImage {
    RgbaImage::from_fn(8, 6, |x, _| if x < 4 { Rgba([255, 255, 255, 255]) } else { Rgba([255, 255, 255, 128]) })
}

fn font_json(sheet: &str, line_height: u32) -> String {
    format!(
        r#"{{ "sheet": "{sheet}", "line_height": {line_height}, "glyphs": [
            {{ "id": 65, "x": 0, "y": 0, "width": 4, "height": 6, "x_offset": 0, "y_offset": 1, "x_advance": 5 }},
            {{ "id": 66, "x": 4, "y": 0, "width": 4, "height": 6, "x_offset": 0, "y_offset": 1, "x_advance": 5 }},
            {{ "id": 32, "x": 0, "y": 0, "width": 0, "height": 0, "x_offset": 0, "y_offset": 0, "x_advance": 3 }}
        ] }}"#
    )
}

fn provider() -> Arc<MemoryProvider> {
    Arc::new(
        MemoryProvider::new()
            .with("fonts/sheet.png", png(&sheet()))
            .with("fonts/large.json", font_json("fonts/sheet.png", 12))
            .with("fonts/small.json", font_json("fonts/sheet.png", 8)),
    )
}

// ── pack_glyphs ───────────────────────────────────────────────────────────────

#[test]
fn glyphs_become_alpha_coverage() {
    let (device, dyn_device) = headless();
    let cache = standard_cache(provider(), Arc::clone(&dyn_device));
    let font = cache.get::<Font>("fonts/small.json").unwrap();

    let packed = pack_glyphs(&dyn_device, (16, 16), &[("small".to_string(), font)], &[0x20..=0x7e]).unwrap();
    let small = &packed["small"];
    assert_eq!(small.line_height, 8);
    assert_eq!(small.glyphs.len(), 3);

    let space = small.glyph(' ').unwrap();
    assert!(space.item.is_none());
    assert_eq!(space.x_advance, 3);

    let a = small.glyph('A').unwrap().item.as_ref().unwrap();
    let b = small.glyph('B').unwrap().item.as_ref().unwrap();
    assert!(SharedHandle::ptr_eq(&a.texture, &b.texture));

    let texture = device.texture(a.texture.id).unwrap();
    assert_eq!(texture.format, TextureFormat::R8);
    assert_eq!(texture.pixels[texel(16, a.rect.x + 1, a.rect.y + 1, 1)], 255);
    assert_eq!(texture.pixels[texel(16, b.rect.x + 1, b.rect.y + 1, 1)], 128);
}

#[test]
fn smaller_fonts_are_packed_first() {
    let (_, dyn_device) = headless();
    let cache = standard_cache(provider(), Arc::clone(&dyn_device));
    let fonts = [
        ("large".to_string(), cache.get::<Font>("fonts/large.json").unwrap()),
        ("small".to_string(), cache.get::<Font>("fonts/small.json").unwrap()),
    ];

    let packed = pack_glyphs(&dyn_device, (64, 64), &fonts, &[65..=66]).unwrap();
    let small_a = packed["small"].glyph('A').unwrap().item.as_ref().unwrap();
    let large_a = packed["large"].glyph('A').unwrap().item.as_ref().unwrap();
    assert_eq!((small_a.rect.x, small_a.rect.y), (0, 0));
    assert_eq!(large_a.rect.x, 8);
    // Codepoints outside the ranges are left out.
    assert!(packed["small"].glyph(' ').is_none());
}

#[test]
fn overflowing_glyphs_spill_into_another_atlas() {
    let (device, dyn_device) = headless();
    let cache = standard_cache(provider(), Arc::clone(&dyn_device));
    let font = cache.get::<Font>("fonts/small.json").unwrap();

    let packed = pack_glyphs(&dyn_device, (4, 6), &[("small".to_string(), font)], &[65..=66]).unwrap();
    let a = packed["small"].glyph('A').unwrap().item.as_ref().unwrap();
    let b = packed["small"].glyph('B').unwrap().item.as_ref().unwrap();
    assert!(!SharedHandle::ptr_eq(&a.texture, &b.texture));
    assert_eq!(device.textures_created(), 2);
}

#[test]
fn oversize_glyph_fails_the_whole_run() {
    let (device, dyn_device) = headless();
    let cache = standard_cache(provider(), Arc::clone(&dyn_device));
    let font = cache.get::<Font>("fonts/small.json").unwrap();

    let err = pack_glyphs(&dyn_device, (4, 4), &[("small".to_string(), font)], &[65..=66]).unwrap_err();
    assert!(matches!(err, AssetError::AtlasTooSmall { height: 6, capacity_height: 4, .. }));
    assert_eq!(device.textures_created(), 0);
}

/// A font over the 8×6 sheet whose only glyph is the given region.
fn hand_built_font(x: u32, y: u32, width: u32, height: u32) -> SharedHandle<Font> {
    let glyph = Glyph { id: 'A', x, y, width, height, x_offset: 0, y_offset: 0, x_advance: width };
    SharedHandle::unmanaged(Font {
        glyphs: HashMap::from([('A', glyph)]),
        line_height: 6,
        sheet: SharedHandle::unmanaged(Image::new(sheet())),
    })
}

#[test]
fn glyph_outside_its_sheet_fails_before_upload() {
    let (device, dyn_device) = headless();
    for (x, y) in [(6, 0), (u32::MAX, 0), (0, u32::MAX - 1)] {
        let font = hand_built_font(x, y, 4, 4);
        let err = pack_glyphs(&dyn_device, (16, 16), &[("bad".to_string(), font)], &[65..=65]).unwrap_err();
        match err {
            AssetError::InvalidGlyph { item, sheet_width, sheet_height, .. } => {
                assert_eq!((item.as_str(), sheet_width, sheet_height), ("bad/'A'", 8, 6));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(device.textures_created(), 0);
}

#[test]
fn font_json_with_overflowing_coordinates_fails_to_load() {
    let json = r#"{ "sheet": "fonts/sheet.png", "glyphs": [
        { "id": 65, "x": 4294967295, "y": 0, "width": 2, "height": 2, "x_advance": 2 } ] }"#;
    let provider = provider();
    provider.insert("fonts/broken.json", json);
    let (_, dyn_device) = headless();
    let cache = standard_cache(provider, dyn_device);

    let err = cache.get::<Font>("fonts/broken.json").unwrap_err();
    assert!(matches!(err, AssetError::LoadFailed { .. }), "{err}");
    assert!(!cache.contains("fonts/broken.json", jassets::AssetKind::Font));
}

#[test]
fn duplicate_font_keys_are_rejected() {
    let (device, dyn_device) = headless();
    let fonts = [("mono".to_string(), hand_built_font(0, 0, 4, 6)), ("mono".to_string(), hand_built_font(4, 0, 4, 6))];

    let err = pack_glyphs(&dyn_device, (16, 16), &fonts, &[65..=65]).unwrap_err();
    assert!(matches!(err, AssetError::DuplicateFont { ref key } if key == "mono"), "{err}");
    assert_eq!(device.textures_created(), 0);
}

// ── GlyphAtlas asset ──────────────────────────────────────────────────────────

#[test]
fn glyph_atlas_loads_from_its_description() {
    let provider = provider();
    provider.insert(
        "ui/fonts.toml",
        "fonts = [\"fonts/small.json\", \"fonts/large.json\"]\nranges = [[65, 66]]\nsize = [32, 32]\n",
    );
    let (device, dyn_device) = headless();
    let cache = standard_cache(provider, dyn_device);

    let atlas = cache.get::<GlyphAtlas>("ui/fonts.toml").unwrap();
    assert_eq!(atlas.fonts.len(), 2);
    assert_eq!(atlas.font("fonts/large.json").unwrap().glyphs.len(), 2);
    assert_eq!(device.live_textures(), 1);

    drop(atlas);
    assert_eq!(device.live_textures(), 0);
    assert!(cache.live_entries().is_empty());
}

#[test]
fn font_with_missing_sheet_fails_to_load() {
    let provider = Arc::new(MemoryProvider::new().with("lonely.json", font_json("nowhere.png", 8)));
    let (_, dyn_device) = headless();
    let cache = standard_cache(provider, dyn_device);

    let err = cache.get::<Font>("lonely.json").unwrap_err();
    assert!(matches!(err, AssetError::LoadFailed { .. }));
    assert!(err.to_string().contains("resolving sheet of font `lonely.json`"), "{err}");

    let mut chain = Vec::new();
    let mut current: Option<&dyn std::error::Error> = Some(&err);
    while let Some(e) = current {
        chain.push(e.to_string());
        current = e.source();
    }
    assert!(chain.iter().any(|message| message.contains("image:nowhere.png")), "{chain:?}");
}
