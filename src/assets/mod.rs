//! Asset loading: the managed cache, its shared handles, the resolver chain
//! that picks a decoder per request, and the built-in decoders.

pub mod blob;
pub mod cache;
pub mod config;
pub mod font;
pub mod handle;
pub mod image;
pub mod provider;
pub mod resolver;
pub mod shader;
pub mod texture;

use std::fmt;
use std::str::FromStr;

pub use blob::Blob;
pub use cache::{AssetCache, CacheStats};
pub use config::Config;
pub use font::{Font, Glyph};
pub use handle::{SharedHandle, WeakHandle};
pub use self::image::Image;
pub use provider::{DirProvider, MemoryProvider, Provider, Source};
pub use resolver::{Decoder, LoadContext, ResolverChain};
pub use shader::{Program, Shader};
pub use texture::Texture;

// ── AssetKind ─────────────────────────────────────────────────────────────────

/// Type tag of a cacheable resource. Part of every [`ResourceKey`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Blob,
    Config,
    Image,
    Texture,
    Shader,
    Program,
    Font,
    GlyphAtlas,
    MaterialAtlas,
}

impl AssetKind {
    pub const ALL: [AssetKind; 9] = [
        AssetKind::Blob,
        AssetKind::Config,
        AssetKind::Image,
        AssetKind::Texture,
        AssetKind::Shader,
        AssetKind::Program,
        AssetKind::Font,
        AssetKind::GlyphAtlas,
        AssetKind::MaterialAtlas,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Blob => "blob",
            AssetKind::Config => "config",
            AssetKind::Image => "image",
            AssetKind::Texture => "texture",
            AssetKind::Shader => "shader",
            AssetKind::Program => "program",
            AssetKind::Font => "font",
            AssetKind::GlyphAtlas => "glyph_atlas",
            AssetKind::MaterialAtlas => "material_atlas",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("unknown asset kind `{s}`"))
    }
}

// ── ResourceKey ───────────────────────────────────────────────────────────────

/// Identity of one cache slot: the resource name plus the requested type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub name: String,
    pub kind: AssetKind,
}

impl ResourceKey {
    pub fn new(name: impl Into<String>, kind: AssetKind) -> Self {
        Self { name: name.into(), kind }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

// ── Asset ─────────────────────────────────────────────────────────────────────

/// A type the cache can hold.
pub trait Asset: Send + Sync + 'static {
    const KIND: AssetKind;

    /// Frees device-side objects. Runs exactly once, when the last
    /// [`SharedHandle`] to this asset is released.
    fn dispose(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
