use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, bail};
use parking_lot::RwLock;

// ── Source ────────────────────────────────────────────────────────────────────

/// One raw byte stream for a resource name, tagged with where it came from.
pub struct Source {
    origin: String,
    reader: Box<dyn Read + Send>,
}

impl Source {
    pub fn new(origin: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self { origin: origin.into(), reader: Box::new(reader) }
    }

    pub fn from_bytes(origin: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(origin, Cursor::new(bytes.into()))
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn read_to_vec(mut self) -> anyhow::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.reader
            .read_to_end(&mut bytes)
            .with_context(|| format!("reading {}", self.origin))?;
        Ok(bytes)
    }

    pub fn read_to_string(self) -> anyhow::Result<String> {
        let origin = self.origin.clone();
        String::from_utf8(self.read_to_vec()?).with_context(|| format!("{origin} is not UTF-8"))
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("origin", &self.origin).finish_non_exhaustive()
    }
}

/// The last (highest-priority) source, for decoders that do not merge.
pub(crate) fn top_source(sources: Vec<Source>) -> anyhow::Result<Source> {
    sources.into_iter().last().context("no data sources")
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Supplies raw bytes for resource names.
///
/// `open_all` returns every source for a name, ordered from lowest to highest
/// priority, so overlay decoders can merge them and plain decoders can take
/// the last one. An empty list is a normal outcome.
pub trait Provider: Send + Sync {
    fn open_all(&self, name: &str) -> anyhow::Result<Vec<Source>>;

    /// Every resource name below `prefix`, sorted.
    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn open_all(&self, name: &str) -> anyhow::Result<Vec<Source>> {
        (**self).open_all(name)
    }

    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        (**self).list(prefix)
    }
}

// ── DirProvider ───────────────────────────────────────────────────────────────

/// Overlays a list of directories. Later roots take precedence.
#[derive(Clone, Debug)]
pub struct DirProvider {
    roots: Vec<PathBuf>,
}

impl DirProvider {
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self { roots: roots.into_iter().map(Into::into).collect() }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Rejects names that could escape a root directory.
fn checked_relative(name: &str) -> anyhow::Result<&Path> {
    let path = Path::new(name);
    if path.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
        bail!("resource name `{name}` must be a relative path without `..`");
    }
    Ok(path)
}

impl Provider for DirProvider {
    fn open_all(&self, name: &str) -> anyhow::Result<Vec<Source>> {
        let relative = checked_relative(name)?;
        let mut sources = Vec::new();
        for root in &self.roots {
            let path = root.join(relative);
            if !path.is_file() {
                continue;
            }
            let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            sources.push(Source::new(path.display().to_string(), file));
        }
        Ok(sources)
    }

    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let relative = checked_relative(prefix)?;
        let mut names = BTreeSet::new();
        for root in &self.roots {
            let base = root.join(relative);
            if !base.is_dir() {
                continue;
            }
            for entry in walkdir::WalkDir::new(&base)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Ok(stripped) = entry.path().strip_prefix(root) else { continue };
                let name: Vec<_> = stripped
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect();
                names.insert(name.join("/"));
            }
        }
        Ok(names.into_iter().collect())
    }
}

// ── MemoryProvider ────────────────────────────────────────────────────────────

/// In-memory layers keyed by name. Each `insert` for an existing name adds a
/// higher-priority layer on top.
#[derive(Default)]
pub struct MemoryProvider {
    files: RwLock<HashMap<String, Vec<Arc<[u8]>>>>,
    opens: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&self, name: impl Into<String>, bytes: impl AsRef<[u8]>) {
        self.files.write().entry(name.into()).or_default().push(Arc::from(bytes.as_ref()));
    }

    pub fn remove(&self, name: &str) -> bool {
        self.files.write().remove(name).is_some()
    }

    /// How many `open_all` calls found at least one layer.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl Provider for MemoryProvider {
    fn open_all(&self, name: &str) -> anyhow::Result<Vec<Source>> {
        let files = self.files.read();
        let Some(layers) = files.get(name) else { return Ok(Vec::new()) };
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(layers
            .iter()
            .enumerate()
            .map(|(i, bytes)| Source::new(format!("memory:{name}#{i}"), Cursor::new(Arc::clone(bytes))))
            .collect())
    }

    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let prefix = prefix.trim_end_matches('/');
        let mut names: Vec<String> = self
            .files
            .read()
            .keys()
            .filter(|name| {
                prefix.is_empty()
                    || name.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
            })
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}
