use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, bail, ensure};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use super::{Device, ProgramId, ShaderDesc, ShaderId, TextureDesc, TextureFormat, TextureId};

/// [`Device`] backed by a wgpu device and queue.
///
/// Programs are the list of their shader modules; pipelines are built by the
/// renderer from [`Self::with_shader_module`] once it knows its vertex layout.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: AtomicU64,
    textures: Mutex<HashMap<TextureId, wgpu::Texture>>,
    shaders: Mutex<HashMap<ShaderId, wgpu::ShaderModule>>,
    programs: Mutex<HashMap<ProgramId, Vec<ShaderId>>>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: AtomicU64::new(0),
            textures: Mutex::new(HashMap::new()),
            shaders: Mutex::new(HashMap::new()),
            programs: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the default adapter without a surface.
    pub fn headless() -> anyhow::Result<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::default();
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .context("no suitable GPU adapter found")?;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .context("failed to create device")?;
            Ok::<_, anyhow::Error>(Self::new(device, queue))
        })
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn texture_view(&self, id: TextureId) -> Option<wgpu::TextureView> {
        self.textures
            .lock()
            .get(&id)
            .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    /// Runs `f` with the compiled module behind `id`.
    pub fn with_shader_module<R>(&self, id: ShaderId, f: impl FnOnce(&wgpu::ShaderModule) -> R) -> Option<R> {
        self.shaders.lock().get(&id).map(f)
    }

    pub fn program_shaders(&self, id: ProgramId) -> Option<Vec<ShaderId>> {
        self.programs.lock().get(&id).cloned()
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

impl Device for WgpuDevice {
    fn create_texture(&self, desc: &TextureDesc<'_>, pixels: &[u8]) -> anyhow::Result<TextureId> {
        ensure!(
            pixels.len() == desc.byte_len(),
            "texture `{}`: {} bytes supplied, {} expected",
            desc.label,
            pixels.len(),
            desc.byte_len()
        );

        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu_format(desc.format),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );

        let id = TextureId(self.next());
        self.textures.lock().insert(id, texture);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> anyhow::Result<()> {
        let Some(texture) = self.textures.lock().remove(&id) else {
            bail!("destroying unknown texture {id:?}");
        };
        texture.destroy();
        Ok(())
    }

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> anyhow::Result<ShaderId> {
        ensure!(!desc.source.trim().is_empty(), "shader `{}` is empty", desc.label);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });
        let id = ShaderId(self.next());
        self.shaders.lock().insert(id, module);
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
