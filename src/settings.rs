use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use crate::assets::AssetKind;

// ── AssetConfig ───────────────────────────────────────────────────────────────

/// Asset layer settings, usually read from `assets.toml`:
///
/// ```toml
/// roots = ["assets", "mods/hd"]   # later roots override earlier ones
/// glyph_atlas_size = [512, 512]
/// material_atlas_size = [1024, 1024]
/// ```
///
/// Missing keys keep their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub roots: Vec<PathBuf>,
    pub glyph_atlas_size: [u32; 2],
    pub material_atlas_size: [u32; 2],
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("assets")],
            glyph_atlas_size: [512, 512],
            material_atlas_size: [1024, 1024],
        }
    }
}

impl AssetConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("parsing asset configuration")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

// ── CliArgs ───────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "jassets")]
#[command(about = "Loads assets through the cache and reports what they produced")]
pub struct CliArgs {
    /// Asset configuration file. Defaults apply when omitted.
    #[arg(long, short = 'c', env = "JASSETS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Asset root directory; repeat to overlay. Replaces the configured roots.
    #[arg(long = "root", short = 'r')]
    pub roots: Vec<PathBuf>,

    /// Upload to a real GPU instead of the in-memory device.
    #[arg(long)]
    pub gpu: bool,

    /// Resources to load, written `kind:name` (e.g. `texture:ui/panel.png`).
    #[arg(required = true, value_parser = clap::value_parser!(AssetRequest))]
    pub assets: Vec<AssetRequest>,
}

impl CliArgs {
    /// The configuration file (or the defaults) with CLI overrides applied.
    pub fn asset_config(&self) -> anyhow::Result<AssetConfig> {
        let mut config = match &self.config {
            Some(path) => AssetConfig::load(path)?,
            None => AssetConfig::default(),
        };
        if !self.roots.is_empty() {
            config.roots = self.roots.clone();
        }
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRequest {
    pub kind: AssetKind,
    pub name: String,
}

impl FromStr for AssetRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| format!("`{s}` is not of the form kind:name"))?;
        if name.is_empty() {
            return Err(format!("`{s}` has an empty name"));
        }
        Ok(Self { kind: kind.parse()?, name: name.to_string() })
    }
}

impl fmt::Display for AssetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
