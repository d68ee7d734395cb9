pub mod assets;
pub mod error;
pub mod renderer;
pub mod settings;

pub use assets::{AssetCache, AssetKind, ResourceKey, SharedHandle};
pub use error::{AssetError, AssetResult};
