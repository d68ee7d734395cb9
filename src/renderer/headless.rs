use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use anyhow::{bail, ensure};
use parking_lot::Mutex;

use super::{Device, ProgramId, ShaderDesc, ShaderId, ShaderStage, TextureDesc, TextureFormat, TextureId};

/// CPU copy of an uploaded texture.
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessTexture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

/// A [`Device`] that keeps every object in memory.
///
/// Used by the CLI when no GPU is requested and by the tests, which inspect
/// the uploaded pixels and count live objects to check disposal.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: AtomicU64,
    textures: Mutex<HashMap<TextureId, HeadlessTexture>>,
    shaders: Mutex<HashMap<ShaderId, ShaderStage>>,
    programs: Mutex<HashMap<ProgramId, Vec<ShaderId>>>,
    textures_created: AtomicUsize,
    /// Refuse uploads once this many textures are live.
    texture_limit: Option<usize>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that fails `create_texture` once `limit` textures are live,
    /// the way a GPU out of memory would.
    pub fn with_texture_limit(limit: usize) -> Self {
        Self { texture_limit: Some(limit), ..Self::default() }
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn texture(&self, id: TextureId) -> Option<HeadlessTexture> {
        self.textures.lock().get(&id).cloned()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    /// Textures ever created, destroyed or not.
    pub fn textures_created(&self) -> usize {
        self.textures_created.load(Ordering::Relaxed)
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.lock().len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.lock().len()
    }
}

impl Device for HeadlessDevice {
    fn create_texture(&self, desc: &TextureDesc<'_>, pixels: &[u8]) -> anyhow::Result<TextureId> {
        ensure!(desc.width > 0 && desc.height > 0, "texture `{}` has zero size", desc.label);
        ensure!(
            pixels.len() == desc.byte_len(),
            "texture `{}`: {} bytes supplied, {} expected",
            desc.label,
            pixels.len(),
            desc.byte_len()
        );

        let mut textures = self.textures.lock();
        if let Some(limit) = self.texture_limit {
            ensure!(textures.len() < limit, "out of texture memory uploading `{}`", desc.label);
        }

        let id = TextureId(self.next());
        textures.insert(
            id,
            HeadlessTexture {
                label: desc.label.to_string(),
                width: desc.width,
                height: desc.height,
                format: desc.format,
                pixels: pixels.to_vec(),
            },
        );
        self.textures_created.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> anyhow::Result<()> {
        if self.textures.lock().remove(&id).is_none() {
            bail!("destroying unknown texture {id:?}");
        }
        Ok(())
    }

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> anyhow::Result<ShaderId> {
        ensure!(!desc.source.trim().is_empty(), "shader `{}` is empty", desc.label);
        let id = ShaderId(self.next());
        self.shaders.lock().insert(id, desc.stage);
        Ok(id)
    }

    fn destroy_shader(&self, id: ShaderId) -> anyhow::Result<()> {
        if self.shaders.lock().remove(&id).is_none() {
            bail!("destroying unknown shader {id:?}");
        }
        Ok(())
    }

    fn create_program(&self, label: &str, shaders: &[ShaderId]) -> anyhow::Result<ProgramId> {
        ensure!(!shaders.is_empty(), "program `{label}` has no shaders");
        {
            let known = self.shaders.lock();
            if let Some(missing) = shaders.iter().find(|id| !known.contains_key(id)) {
                bail!("program `{label}` links unknown shader {missing:?}");
            }
        }
        let id = ProgramId(self.next());
        self.programs.lock().insert(id, shaders.to_vec());
        Ok(id)
    }

    fn destroy_program(&self, id: ProgramId) -> anyhow::Result<()> {
        if self.programs.lock().remove(&id).is_none() {
            bail!("destroying unknown program {id:?}");
        }
        Ok(())
    }
}
