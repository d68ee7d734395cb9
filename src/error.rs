use thiserror::Error;

use crate::assets::ResourceKey;

/// Boxed source error carried by load and device failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type AssetResult<T> = Result<T, AssetError>;

// ── AssetError ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AssetError {
    /// No decoder resolves the key, or the decoder needs raw data and the
    /// provider has none. Callers may fall back to another name.
    #[error("resource `{key}` not found")]
    NotFound { key: ResourceKey },

    /// The decoder (or the device upload behind it) failed. Nothing is
    /// cached, so the next request decodes again from scratch.
    #[error("failed to load `{key}`: {source}")]
    LoadFailed {
        key: ResourceKey,
        #[source]
        source: BoxError,
    },

    #[error("`{key}` resolves to a decoder producing `{found}`, expected `{expected}`")]
    TypeMismatch {
        key: ResourceKey,
        expected: &'static str,
        found: &'static str,
    },

    /// A decoder asked the cache for the very key it is decoding.
    #[error("cyclic load of `{key}`")]
    Cycle { key: ResourceKey },

    #[error("`{item}` ({width}x{height}) can never fit a {capacity_width}x{capacity_height} atlas")]
    AtlasTooSmall {
        item: String,
        width: u32,
        height: u32,
        capacity_width: u32,
        capacity_height: u32,
    },

    #[error("material tile `{item}` is {width}x{height}, expected {expected_width}x{expected_height}")]
    InvalidTile {
        item: String,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// A glyph region reaches past the edge of its font sheet.
    #[error("glyph `{item}` at ({x}, {y}) size {width}x{height} lies outside the {sheet_width}x{sheet_height} sheet")]
    InvalidGlyph {
        item: String,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        sheet_width: u32,
        sheet_height: u32,
    },

    #[error("font `{key}` is listed twice in one glyph packing run")]
    DuplicateFont { key: String },

    #[error("access to a released `{type_name}` handle")]
    UseAfterRelease { type_name: &'static str },

    #[error("device error: {0}")]
    Device(#[source] BoxError),
}

impl AssetError {
    pub(crate) fn load_failed(key: &ResourceKey, source: impl Into<BoxError>) -> Self {
        Self::LoadFailed { key: key.clone(), source: source.into() }
    }

    pub(crate) fn device(source: anyhow::Error) -> Self {
        Self::Device(source.into())
    }

    /// `true` for the "try another name" class of failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
