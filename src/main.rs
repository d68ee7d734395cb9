use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use jassets::assets::{AssetCache, AssetKind, Blob, Config, Font, Image, Program, Shader, Texture};
use jassets::renderer::glyph_atlas::GlyphAtlas;
use jassets::renderer::material_atlas::MaterialAtlasSet;
use jassets::renderer::{Device, HeadlessDevice, WgpuDevice};
use jassets::settings::{AssetRequest, CliArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let config = args.asset_config()?;
    let device: Arc<dyn Device> = if args.gpu {
        Arc::new(WgpuDevice::headless().context("opening GPU device")?)
    } else {
        Arc::new(HeadlessDevice::new())
    };

    let cache = AssetCache::from_config(&config, device);
    info!("asset roots: {:?}", config.roots);

    let mut failed = 0;
    for request in &args.assets {
        match describe(&cache, request) {
            Ok(report) => info!("{request}: {report}"),
            Err(err) => {
                error!("{request}: {err:#}");
                failed += 1;
            }
        }
    }

    let stats = cache.stats();
    info!(
        "{} request(s), {failed} failed; {} load(s), {} hit(s)",
        args.assets.len(),
        stats.loads,
        stats.hits
    );
    drop(cache);

    if failed > 0 {
        anyhow::bail!("{failed} asset(s) failed to load");
    }
    Ok(())
}

/// Loads one resource and summarises it. The handle is released on return.
fn describe(cache: &AssetCache, request: &AssetRequest) -> anyhow::Result<String> {
    let name = request.name.as_str();
    let report = match request.kind {
        AssetKind::Blob => {
            let blob = cache.get::<Blob>(name)?;
            format!("{} bytes", blob.0.len())
        }
        AssetKind::Config => {
            let config = cache.get::<Config>(name)?;
            format!("{} top-level key(s)", config.table().len())
        }
        AssetKind::Image => {
            let image = cache.get::<Image>(name)?;
            format!("{}x{} RGBA", image.width(), image.height())
        }
        AssetKind::Texture => {
            let texture = cache.get::<Texture>(name)?;
            format!("{:?} {}x{} {:?}", texture.id, texture.width, texture.height, texture.format)
        }
        AssetKind::Shader => {
            let shader = cache.get::<Shader>(name)?;
            format!("{:?} {:?}", shader.id, shader.stage)
        }
        AssetKind::Program => {
            let program = cache.get::<Program>(name)?;
            format!("{:?} linking {} shader(s)", program.id, program.shaders.len())
        }
        AssetKind::Font => {
            let font = cache.get::<Font>(name)?;
            format!("{} glyph(s), line height {}", font.glyphs.len(), font.line_height)
        }
        AssetKind::GlyphAtlas => {
            let atlas = cache.get::<GlyphAtlas>(name)?;
            let mut fonts: Vec<String> = atlas
                .fonts
                .iter()
                .map(|(key, font)| format!("{key} ({} glyphs)", font.glyphs.len()))
                .collect();
            fonts.sort();
            fonts.join(", ")
        }
        AssetKind::MaterialAtlas => {
            let set = cache.get::<MaterialAtlasSet>(name)?;
            format!("{} tile(s) in {} atlas(es)", set.names.len(), set.atlases.len())
        }
    };
    Ok(report)
}
