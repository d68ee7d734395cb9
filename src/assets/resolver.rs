use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::cache::AssetCache;
use super::provider::Source;
use super::{Asset, AssetKind, ResourceKey, SharedHandle};
use crate::error::AssetResult;
use crate::renderer::Device;
use crate::settings::AssetConfig;

// ── LoadContext ───────────────────────────────────────────────────────────────

/// What a decoder sees while it runs: the key being loaded and the cache it
/// may call back into for dependencies.
pub struct LoadContext<'a> {
    pub(crate) key: &'a ResourceKey,
    pub(crate) cache: &'a AssetCache,
}

impl<'a> LoadContext<'a> {
    pub fn name(&self) -> &'a str {
        &self.key.name
    }

    pub fn key(&self) -> &'a ResourceKey {
        self.key
    }

    pub fn cache(&self) -> &'a AssetCache {
        self.cache
    }

    pub fn device(&self) -> &'a Arc<dyn Device> {
        self.cache.device()
    }

    /// Loads a dependency through the same cache.
    pub fn get<T: Asset>(&self, name: &str) -> AssetResult<SharedHandle<T>> {
        self.cache.get(name)
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Turns raw sources into a typed asset.
pub trait Decoder: Send + Sync + 'static {
    type Output: Asset;

    /// Decoders that build purely from other cached assets return `false`;
    /// the cache then skips the provider entirely.
    fn needs_sources(&self) -> bool {
        true
    }

    fn decode(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Self::Output>;
}

pub(crate) trait ErasedDecoder: Send + Sync {
    fn output_type(&self) -> TypeId;
    fn output_name(&self) -> &'static str;
    fn needs_sources(&self) -> bool;
    fn decode_erased(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Box<dyn Any + Send>>;
}

struct Erased<D>(D);

impl<D: Decoder> ErasedDecoder for Erased<D> {
    fn output_type(&self) -> TypeId {
        TypeId::of::<D::Output>()
    }

    fn output_name(&self) -> &'static str {
        std::any::type_name::<D::Output>()
    }

    fn needs_sources(&self) -> bool {
        self.0.needs_sources()
    }

    fn decode_erased(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Box<dyn Any + Send>> {
        Ok(Box::new(self.0.decode(ctx, sources)?))
    }
}

/// A registered decoder, shared between the tables of a [`ResolverChain`].
#[derive(Clone)]
pub struct DecoderRef(Arc<dyn ErasedDecoder>);

impl DecoderRef {
    pub fn new<D: Decoder>(decoder: D) -> Self {
        Self(Arc::new(Erased(decoder)))
    }

    /// Type name of what this decoder produces.
    pub fn output_name(&self) -> &'static str {
        self.0.output_name()
    }

    pub(crate) fn erased(&self) -> &dyn ErasedDecoder {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for DecoderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DecoderRef").field(&self.output_name()).finish()
    }
}

// ── ResolverChain ─────────────────────────────────────────────────────────────

/// Picks the decoder for a request. Tables are tried in a fixed order:
/// requested kind, then file extension, then the caller's explicit key.
/// Immutable once built, so sharing it across threads needs no locking.
#[derive(Default, Debug)]
pub struct ResolverChain {
    by_kind: HashMap<AssetKind, DecoderRef>,
    by_extension: HashMap<String, DecoderRef>,
    by_key: HashMap<String, DecoderRef>,
}

impl ResolverChain {
    pub fn builder() -> ResolverChainBuilder {
        ResolverChainBuilder::default()
    }

    /// The built-in decoders, with atlas capacities taken from `config`.
    pub fn standard(config: &AssetConfig) -> Self {
        use super::blob::BlobDecoder;
        use super::config::ConfigDecoder;
        use super::font::FontDecoder;
        use super::image::ImageDecoder;
        use super::shader::{ProgramDecoder, ShaderDecoder};
        use super::texture::TextureDecoder;
        use crate::renderer::ShaderStage;
        use crate::renderer::glyph_atlas::GlyphAtlasDecoder;
        use crate::renderer::material_atlas::MaterialAtlasDecoder;

        let [gw, gh] = config.glyph_atlas_size;
        let [mw, mh] = config.material_atlas_size;

        Self::builder()
            .kind(BlobDecoder)
            .kind(ConfigDecoder)
            .kind(ImageDecoder)
            .kind(TextureDecoder)
            .kind(ProgramDecoder)
            .kind(FontDecoder)
            .kind(GlyphAtlasDecoder { capacity: (gw, gh) })
            .kind(MaterialAtlasDecoder { capacity: (mw, mh) })
            .extension("wgsl", ShaderDecoder { stage: ShaderStage::Combined })
            .extension("vert", ShaderDecoder { stage: ShaderStage::Vertex })
            .extension("vs", ShaderDecoder { stage: ShaderStage::Vertex })
            .extension("frag", ShaderDecoder { stage: ShaderStage::Fragment })
            .extension("fs", ShaderDecoder { stage: ShaderStage::Fragment })
            .build()
    }

    /// First match wins; `None` is an ordinary "not found".
    pub fn resolve(&self, name: &str, kind: AssetKind, key: Option<&str>) -> Option<&DecoderRef> {
        if let Some(decoder) = self.by_kind.get(&kind) {
            return Some(decoder);
        }
        if let Some(decoder) = extension_of(name).and_then(|ext| self.by_extension.get(&ext)) {
            return Some(decoder);
        }
        key.and_then(|key| self.by_key.get(key))
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

#[derive(Default)]
pub struct ResolverChainBuilder {
    chain: ResolverChain,
}

impl ResolverChainBuilder {
    /// Registers `decoder` for its output's [`AssetKind`].
    pub fn kind<D: Decoder>(mut self, decoder: D) -> Self {
        self.chain.by_kind.insert(<D::Output as Asset>::KIND, DecoderRef::new(decoder));
        self
    }

    /// Registers `decoder` for names ending in `.ext` (case-insensitive).
    pub fn extension<D: Decoder>(mut self, ext: &str, decoder: D) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.chain.by_extension.insert(ext, DecoderRef::new(decoder));
        self
    }

    /// Registers `decoder` under an explicit key passed to
    /// [`AssetCache::get_with`].
    pub fn key<D: Decoder>(mut self, key: impl Into<String>, decoder: D) -> Self {
        self.chain.by_key.insert(key.into(), DecoderRef::new(decoder));
        self
    }

    pub fn build(self) -> ResolverChain {
        self.chain
    }
}
