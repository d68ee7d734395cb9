use super::TextureId;
use super::glyph_atlas::PackedFont;

// ── Vec2 / Vertex ─────────────────────────────────────────────────────────────

/// Screen-space 2D position `[x, y]` in pixels.
pub type Vec2 = [f32; 2];

/// A single vertex produced by [`generate_text_mesh`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Screen-space position in pixels.
    pub position: [f32; 2],
    /// Normalised atlas texture coordinates in `[0, 1]`.
    pub tex_coords: [f32; 2],
}

/// Geometry drawn with one atlas texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBatch {
    pub texture: TextureId,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

// ── generate_text_mesh ────────────────────────────────────────────────────────

/// Convert `text` into quads, one batch per atlas texture the glyphs use.
///
/// # Layout
/// Each renderable character produces **4 vertices** and **6 indices**
/// (two counter-clockwise triangles, Y-axis pointing down):
///
/// ```text
/// 0──1
/// │ /│
/// 2──3
/// triangles: (0,1,2) and (1,3,2)
/// ```
///
/// Batches appear in the order their texture is first used.
///
/// # Parameters
/// - `start_pos`: top-left origin of the text block in screen pixels.
/// - `font_size`: desired line height in pixels.  All glyph dimensions are
///   scaled uniformly by `font_size / font.line_height`.
///
/// # Skipping rules
/// - `'\n'` resets the X cursor to `start_pos.x` and advances Y by one
///   scaled line height; it produces no geometry.
/// - Characters absent from the font are skipped.
/// - Blank glyphs (no atlas placement) only advance the cursor.
/// - Returns no batches when `font.line_height` is zero.
pub fn generate_text_mesh(text: &str, font: &PackedFont, start_pos: Vec2, font_size: f32) -> Vec<TextBatch> {
    if font.line_height == 0 {
        return Vec::new();
    }

    let scale = font_size / font.line_height as f32;
    let mut batches: Vec<TextBatch> = Vec::new();

    let mut current_x = start_pos[0];
    let mut current_y = start_pos[1];

    for ch in text.chars() {
        if ch == '\n' {
            current_x = start_pos[0];
            current_y += font.line_height as f32 * scale;
            continue;
        }

        let Some(glyph) = font.glyph(ch) else {
            continue;
        };

        if let Some(item) = &glyph.item {
            let quad_x = current_x + glyph.x_offset as f32 * scale;
            let quad_y = current_y + glyph.y_offset as f32 * scale;
            let quad_w = glyph.width as f32 * scale;
            let quad_h = glyph.height as f32 * scale;
            let ([u0, v0], [u1, v1]) = item.uv();

            let texture = item.texture.id;
            let batch = match batches.iter().position(|b| b.texture == texture) {
                Some(i) => &mut batches[i],
                None => {
                    batches.push(TextBatch { texture, vertices: Vec::new(), indices: Vec::new() });
                    let last = batches.len() - 1;
                    &mut batches[last]
                }
            };

            let base = batch.vertices.len() as u32;

            // Four corners in reading order: top-left, top-right, bottom-left, bottom-right.
            batch.vertices.push(Vertex { position: [quad_x,          quad_y         ], tex_coords: [u0, v0] });
            batch.vertices.push(Vertex { position: [quad_x + quad_w, quad_y         ], tex_coords: [u1, v0] });
            batch.vertices.push(Vertex { position: [quad_x,          quad_y + quad_h], tex_coords: [u0, v1] });
            batch.vertices.push(Vertex { position: [quad_x + quad_w, quad_y + quad_h], tex_coords: [u1, v1] });

            // Two CCW triangles (Y-down): TL-TR-BL, TR-BR-BL.
            batch.indices.extend_from_slice(&[base, base + 1, base + 2, base + 1, base + 3, base + 2]);
        }

        current_x += glyph.x_advance as f32 * scale;
    }

    batches
}

/// Width in pixels of the widest line of `text`.
pub fn measure_text(text: &str, font: &PackedFont, font_size: f32) -> f32 {
    if font.line_height == 0 {
        return 0.0;
    }
    let scale = font_size / font.line_height as f32;
    text.split('\n')
        .map(|line| {
            line.chars()
                .filter_map(|ch| font.glyph(ch))
                .map(|glyph| glyph.x_advance as f32 * scale)
                .sum::<f32>()
        })
        .fold(0.0, f32::max)
}
