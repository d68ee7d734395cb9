// ── Tests ─────────────────────────────────────────────────────────────────────

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use jassets::assets::{SharedHandle, Texture};
use jassets::renderer::atlas::{PackedItem, PackedRect};
use jassets::renderer::glyph_atlas::{PackedFont, PackedGlyph};
use jassets::renderer::text::*;
use jassets::renderer::{Device, TextureDesc, TextureFormat};

// ── helpers ───────────────────────────────────────────────────────────────

fn atlas_texture(device: &Arc<dyn Device>, label: &str) -> SharedHandle<Texture> {
    let desc = TextureDesc { label, width: 512, height: 512, format: TextureFormat::R8 };
    SharedHandle::from_asset(Texture::upload(device, &desc, &vec![0; desc.byte_len()]).unwrap())
}

fn glyph(texture: &SharedHandle<Texture>, ch: char, x: u32, width: u32, advance: u32) -> PackedGlyph {
    PackedGlyph {
        item: Some(PackedItem {
            key: ch.to_string(),
            rect: PackedRect { x, y: 0, width, height: 20 },
            texture: texture.retain(),
        }),
        width,
        height: 20,
        x_offset: 1,
        y_offset: 2,
        x_advance: advance,
    }
}

/// Glyphs 'A' and 'B' packed into one 512×512 atlas, plus a blank space.
///
/// 'A': atlas (x=0,  y=0, w=14, h=20), offset=(1,2), advance=16
/// 'B': atlas (x=16, y=0, w=13, h=20), offset=(1,2), advance=15
/// ' ': no placement, advance=8
/// line_height=24
fn make_font() -> PackedFont {
    let (_, device) = common::headless();
    let texture = atlas_texture(&device, "glyphs#0");
    let mut glyphs = HashMap::new();
    glyphs.insert('A', glyph(&texture, 'A', 0, 14, 16));
    glyphs.insert('B', glyph(&texture, 'B', 16, 13, 15));
    glyphs.insert(' ', PackedGlyph { item: None, width: 0, height: 0, x_offset: 0, y_offset: 0, x_advance: 8 });
    PackedFont { line_height: 24, glyphs }
}

/// The one batch a single-atlas font produces.
fn mesh(text: &str, font: &PackedFont, start: Vec2, size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let mut batches = generate_text_mesh(text, font, start, size);
    match batches.len() {
        0 => (Vec::new(), Vec::new()),
        1 => {
            let batch = batches.remove(0);
            (batch.vertices, batch.indices)
        }
        n => panic!("expected one batch, got {n}"),
    }
}

// ── generate_text_mesh ────────────────────────────────────────────────────

#[test]
fn mesh_empty_string_returns_no_batches() {
    let font = make_font();
    assert!(generate_text_mesh("", &font, [0.0, 0.0], 24.0).is_empty());
}

#[test]
fn mesh_two_chars_produce_8_vertices_and_12_indices() {
    let font = make_font();
    let (verts, indices) = mesh("AB", &font, [0.0, 0.0], 24.0);
    assert_eq!(verts.len(), 8);
    assert_eq!(indices.len(), 12);
}

#[test]
fn mesh_vertex_positions_correct_all_corners() {
    // scale=1, start=[10,20], 'A': x_offset=1, y_offset=2, w=14, h=20
    // TL=(11,22), TR=(25,22), BL=(11,42), BR=(25,42)
    let font = make_font();
    let (verts, _) = mesh("A", &font, [10.0, 20.0], 24.0);
    let corners: Vec<[f32; 2]> = verts.iter().map(|v| v.position).collect();
    assert_eq!(corners, [[11.0, 22.0], [25.0, 22.0], [11.0, 42.0], [25.0, 42.0]]);
}

#[test]
fn mesh_uvs_come_from_the_atlas_placement() {
    // 'B': atlas x=16, w=13, h=20; texture 512×512
    let font = make_font();
    let (verts, _) = mesh("B", &font, [0.0, 0.0], 24.0);
    assert!((verts[0].tex_coords[0] - 16.0 / 512.0).abs() < 1e-6); // TL.u
    assert!((verts[0].tex_coords[1] - 0.0).abs() < 1e-6); // TL.v
    assert!((verts[1].tex_coords[0] - 29.0 / 512.0).abs() < 1e-6); // TR.u
    assert!((verts[2].tex_coords[1] - 20.0 / 512.0).abs() < 1e-6); // BL.v
}

#[test]
fn mesh_second_char_indices_offset_by_4() {
    let font = make_font();
    let (_, indices) = mesh("AB", &font, [0.0, 0.0], 24.0);
    assert_eq!(&indices[..6], &[0, 1, 2, 1, 3, 2]);
    assert_eq!(&indices[6..], &[4, 5, 6, 5, 7, 6]);
}

#[test]
fn mesh_blank_glyph_advances_without_geometry() {
    // 'A' advance=16, ' ' advance=8, 'B' x_offset=1 → B's TL.x = 25
    let font = make_font();
    let (verts, _) = mesh("A B", &font, [0.0, 0.0], 24.0);
    assert_eq!(verts.len(), 8);
    assert!((verts[4].position[0] - 25.0).abs() < 1e-5, "got {}", verts[4].position[0]);
}

#[test]
fn mesh_newline_resets_x_and_advances_y() {
    let font = make_font();
    let (verts, _) = mesh("A\nA", &font, [5.0, 10.0], 24.0);
    assert_eq!(verts.len(), 8);
    // Second 'A' TL: x = 5 + 1 = 6, y = 10 + 24 + 2 = 36
    assert_eq!(verts[4].position, [6.0, 36.0]);
}

#[test]
fn mesh_unknown_char_is_skipped() {
    let font = make_font();
    let (verts, indices) = mesh("ZA", &font, [0.0, 0.0], 24.0);
    assert_eq!(verts.len(), 4);
    assert_eq!(indices.len(), 6);
}

#[test]
fn mesh_scale_factor_applies_to_positions_not_uvs() {
    // font_size=48 with line_height=24 → scale=2; 'A' width=14 → quad_w=28
    let font = make_font();
    let (verts_1x, _) = mesh("A", &font, [0.0, 0.0], 24.0);
    let (verts_2x, _) = mesh("A", &font, [0.0, 0.0], 48.0);
    let quad_w = verts_2x[1].position[0] - verts_2x[0].position[0];
    assert!((quad_w - 28.0).abs() < 1e-5, "expected quad_w=28, got {quad_w}");
    assert_eq!(verts_1x[1].tex_coords, verts_2x[1].tex_coords);
}

#[test]
fn mesh_zero_line_height_returns_empty() {
    let font = PackedFont { line_height: 0, glyphs: HashMap::new() };
    assert!(generate_text_mesh("A", &font, [0.0, 0.0], 24.0).is_empty());
}

#[test]
fn glyphs_on_two_atlases_make_two_batches() {
    let (_, device) = common::headless();
    let first = atlas_texture(&device, "glyphs#0");
    let second = atlas_texture(&device, "glyphs#1");
    let mut glyphs = HashMap::new();
    glyphs.insert('a', glyph(&first, 'a', 0, 10, 11));
    glyphs.insert('b', glyph(&second, 'b', 0, 10, 11));
    let font = PackedFont { line_height: 24, glyphs };

    let batches = generate_text_mesh("abba", &font, [0.0, 0.0], 24.0);
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].texture, first.id);
    assert_eq!(batches[1].texture, second.id);
    assert_eq!(batches[0].vertices.len(), 8);
    assert_eq!(batches[1].indices, [0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
    // Last 'a' sits after three advances.
    assert_eq!(batches[0].vertices[4].position[0], 34.0);
}

// ── measure_text ──────────────────────────────────────────────────────────

#[test]
fn measure_takes_the_widest_line() {
    let font = make_font();
    assert_eq!(measure_text("AB\nA", &font, 24.0), 31.0);
    assert_eq!(measure_text("A B", &font, 48.0), 78.0);
    assert_eq!(measure_text("", &font, 24.0), 0.0);
}
