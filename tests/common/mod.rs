#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use jassets::assets::{AssetCache, MemoryProvider, ResolverChain};
use jassets::renderer::{Device, HeadlessDevice};
use jassets::settings::AssetConfig;

/// A device to inspect plus the same device as the cache sees it.
pub fn headless() -> (Arc<HeadlessDevice>, Arc<dyn Device>) {
    let device = Arc::new(HeadlessDevice::new());
    let dyn_device: Arc<dyn Device> = device.clone();
    (device, dyn_device)
}

/// Built-in decoders over an in-memory provider.
pub fn standard_cache(provider: Arc<MemoryProvider>, device: Arc<dyn Device>) -> AssetCache {
    AssetCache::new(provider, ResolverChain::standard(&AssetConfig::default()), device)
}

pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(rgba))
}

pub fn png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png).unwrap();
    bytes
}

/// Byte offset of pixel `(x, y)` in a tightly packed texture.
pub fn texel(width: u32, x: u32, y: u32, bytes_per_pixel: usize) -> usize {
    (y as usize * width as usize + x as usize) * bytes_per_pixel
}
