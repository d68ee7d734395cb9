use std::fmt;
use std::sync::Arc;

use anyhow::{Context, ensure};
use serde::Deserialize;

use super::handle::SharedHandle;
use super::provider::{Source, top_source};
use super::resolver::{Decoder, LoadContext};
use super::{Asset, AssetKind};
use crate::renderer::{Device, ProgramId, ShaderDesc, ShaderId, ShaderStage};

// ── Shader ────────────────────────────────────────────────────────────────────

pub struct Shader {
    pub id: ShaderId,
    pub stage: ShaderStage,
    pub label: String,
    device: Arc<dyn Device>,
}

impl Asset for Shader {
    const KIND: AssetKind = AssetKind::Shader;

    fn dispose(&self) -> anyhow::Result<()> {
        self.device.destroy_shader(self.id)
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("label", &self.label)
            .finish()
    }
}

/// Compiles WGSL text. Registered per file extension, which fixes the stage.
pub struct ShaderDecoder {
    pub stage: ShaderStage,
}

impl Decoder for ShaderDecoder {
    type Output = Shader;

    fn decode(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Shader> {
        let source = top_source(sources)?.read_to_string()?;
        let desc = ShaderDesc { label: ctx.name(), stage: self.stage, source: &source };
        let id = ctx.device().create_shader(&desc)?;
        Ok(Shader {
            id,
            stage: self.stage,
            label: ctx.name().to_string(),
            device: Arc::clone(ctx.device()),
        })
    }
}

// ── Program ───────────────────────────────────────────────────────────────────

/// Linked shaders. Holds its shaders alive for as long as it lives.
pub struct Program {
    pub id: ProgramId,
    pub label: String,
    pub shaders: Vec<SharedHandle<Shader>>,
    device: Arc<dyn Device>,
}

impl Asset for Program {
    const KIND: AssetKind = AssetKind::Program;

    fn dispose(&self) -> anyhow::Result<()> {
        self.device.destroy_program(self.id)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("shaders", &self.shaders.iter().map(|s| s.label.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// ```toml
/// label = "sprites"           # optional, defaults to the resource name
/// shaders = ["sprite.vert", "sprite.frag"]
/// ```
#[derive(Deserialize)]
struct ProgramFile {
    label: Option<String>,
    shaders: Vec<String>,
}

pub struct ProgramDecoder;

impl Decoder for ProgramDecoder {
    type Output = Program;

    fn decode(&self, ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Program> {
        let text = top_source(sources)?.read_to_string()?;
        let file: ProgramFile = toml::from_str(&text).with_context(|| format!("parsing program `{}`", ctx.name()))?;
        ensure!(!file.shaders.is_empty(), "program `{}` lists no shaders", ctx.name());

        let shaders = file
            .shaders
            .iter()
            .map(|name| ctx.get::<Shader>(name).with_context(|| format!("resolving shader `{name}`")))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let label = file.label.unwrap_or_else(|| ctx.name().to_string());
        let ids: Vec<ShaderId> = shaders.iter().map(|shader| shader.id).collect();
        let id = ctx.device().create_program(&label, &ids)?;
        Ok(Program { id, label, shaders, device: Arc::clone(ctx.device()) })
    }
}
