pub mod atlas;
pub mod glyph_atlas;
pub mod headless;
pub mod material_atlas;
pub mod text;
pub mod wgpu_device;

pub use headless::HeadlessDevice;
pub use wgpu_device::WgpuDevice;

// ── Device object ids ─────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u64);

// ── Descriptors ───────────────────────────────────────────────────────────────

/// Pixel layouts the asset layer uploads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single 8-bit channel, used for glyph coverage.
    R8,
    /// 8-bit RGBA, sRGB.
    Rgba8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rgba8 => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl TextureDesc<'_> {
    /// Byte length a tightly packed pixel buffer for this texture must have.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    /// One module carrying both entry points.
    Combined,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderDesc<'a> {
    pub label: &'a str,
    pub stage: ShaderStage,
    /// WGSL source text.
    pub source: &'a str,
}

// ── Device ────────────────────────────────────────────────────────────────────

/// Opaque device-resource operations.
///
/// Every `create_*` hands back an id that stays valid until the matching
/// `destroy_*`. Destroying an id twice is an error.
pub trait Device: Send + Sync {
    fn create_texture(&self, desc: &TextureDesc<'_>, pixels: &[u8]) -> anyhow::Result<TextureId>;
    fn destroy_texture(&self, id: TextureId) -> anyhow::Result<()>;

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> anyhow::Result<ShaderId>;
    fn destroy_shader(&self, id: ShaderId) -> anyhow::Result<()>;

    fn create_program(&self, label: &str, shaders: &[ShaderId]) -> anyhow::Result<ProgramId>;
    fn destroy_program(&self, id: ProgramId) -> anyhow::Result<()>;
}
