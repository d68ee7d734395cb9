use std::any::TypeId;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::ReentrantMutex;

use super::handle::{ErasedWeak, SharedHandle, WeakHandle};
use super::provider::{DirProvider, Provider};
use super::resolver::{LoadContext, ResolverChain};
use super::{Asset, AssetKind, ResourceKey};
use crate::error::{AssetError, AssetResult};
use crate::renderer::Device;
use crate::settings::AssetConfig;

// ── Slot ──────────────────────────────────────────────────────────────────────

enum Slot {
    /// A thread holding the load lock is decoding this key.
    Loading,
    /// Decoded. The cache holds no count, only a weak view; `generation`
    /// tells this load apart from a later one of the same key.
    Ready {
        generation: u64,
        type_name: &'static str,
        handle: Box<dyn ErasedWeak>,
    },
}

// ── CacheStats ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Successful decodes.
    pub loads: u64,
    /// Requests served from an existing slot.
    pub hits: u64,
    pub failures: u64,
    /// Slots removed after their last handle was released.
    pub evictions: u64,
}

#[derive(Default)]
struct Counters {
    loads: AtomicU64,
    hits: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

struct CacheInner {
    provider: Box<dyn Provider>,
    resolver: ResolverChain,
    device: Arc<dyn Device>,
    slots: DashMap<ResourceKey, Slot>,
    /// Serializes check-then-load. Re-entrant so a decoder can load its
    /// dependencies; the stack records the keys in flight on the owning thread.
    load_lock: ReentrantMutex<RefCell<Vec<ResourceKey>>>,
    next_generation: AtomicU64,
    counters: Counters,
}

impl CacheInner {
    /// Retains the slot's resource if it is ready and still owned.
    fn lookup<T: Asset>(&self, key: &ResourceKey) -> AssetResult<Option<SharedHandle<T>>> {
        let Some(slot) = self.slots.get(key) else { return Ok(None) };
        match slot.value() {
            Slot::Loading => Ok(None),
            Slot::Ready { handle, type_name, .. } => {
                let weak = handle.as_any().downcast_ref::<WeakHandle<T>>().ok_or_else(|| {
                    AssetError::TypeMismatch {
                        key: key.clone(),
                        expected: std::any::type_name::<T>(),
                        found: *type_name,
                    }
                })?;
                Ok(weak.upgrade())
            }
        }
    }

    fn evict(&self, key: &ResourceKey, generation: u64) {
        let removed = self.slots.remove_if(key, |_, slot| {
            matches!(slot, Slot::Ready { generation: g, .. } if *g == generation)
        });
        if removed.is_some() {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("evicted `{key}`");
        }
    }
}

/// Undoes the bookkeeping of one load when it ends, successfully or not.
/// A slot still marked `Loading` at that point belongs to a failed load.
struct LoadGuard<'a> {
    inner: &'a CacheInner,
    stack: &'a RefCell<Vec<ResourceKey>>,
    key: &'a ResourceKey,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.borrow_mut().pop();
        debug_assert_eq!(popped.as_ref(), Some(self.key));
        self.inner.slots.remove_if(self.key, |_, slot| matches!(slot, Slot::Loading));
    }
}

// ── AssetCache ────────────────────────────────────────────────────────────────

/// Loads each resource at most once and hands out [`SharedHandle`]s to it.
///
/// A slot lives exactly as long as some handle to its resource does: the
/// last release removes the slot and disposes the payload, and the next
/// request decodes afresh. Concurrent requests for a missing key wait for
/// the first one to finish instead of decoding twice.
///
/// Create one per asset namespace at startup and pass it by reference.
/// Dropping it reports every resource still held.
pub struct AssetCache {
    inner: Arc<CacheInner>,
}

impl AssetCache {
    pub fn new(provider: impl Provider + 'static, resolver: ResolverChain, device: Arc<dyn Device>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                provider: Box::new(provider),
                resolver,
                device,
                slots: DashMap::with_capacity(64),
                load_lock: ReentrantMutex::new(RefCell::new(Vec::new())),
                next_generation: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }

    /// Directory roots and built-in decoders from `config`.
    pub fn from_config(config: &AssetConfig, device: Arc<dyn Device>) -> Self {
        Self::new(
            DirProvider::new(config.roots.iter().cloned()),
            ResolverChain::standard(config),
            device,
        )
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.inner.device
    }

    pub fn provider(&self) -> &dyn Provider {
        self.inner.provider.as_ref()
    }

    /// Returns the resource `name` decoded as `T`, loading it if no live
    /// handle exists.
    pub fn get<T: Asset>(&self, name: &str) -> AssetResult<SharedHandle<T>> {
        self.load(name, None)
    }

    /// Like [`get`](Self::get), with `decoder_key` as the last-resort
    /// resolver match.
    pub fn get_with<T: Asset>(&self, name: &str, decoder_key: &str) -> AssetResult<SharedHandle<T>> {
        self.load(name, Some(decoder_key))
    }

    fn load<T: Asset>(&self, name: &str, decoder_key: Option<&str>) -> AssetResult<SharedHandle<T>> {
        let inner = &self.inner;
        let key = ResourceKey::new(name, T::KIND);

        if let Some(handle) = inner.lookup::<T>(&key)? {
            inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }

        let stack = inner.load_lock.lock();
        if stack.borrow().contains(&key) {
            return Err(AssetError::Cycle { key });
        }
        // Whoever held the lock before us may have loaded it meanwhile.
        if let Some(handle) = inner.lookup::<T>(&key)? {
            inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(handle);
        }

        // Absent, or its last owner is releasing it right now. A late
        // eviction of the old generation leaves the new slot alone.
        inner.slots.insert(key.clone(), Slot::Loading);
        stack.borrow_mut().push(key.clone());
        let _guard = LoadGuard { inner, stack: &stack, key: &key };

        let started = Instant::now();
        match self.materialize::<T>(&key, decoder_key) {
            Ok(handle) => {
                inner.counters.loads.fetch_add(1, Ordering::Relaxed);
                debug!("loaded `{key}` in {:.2?}", started.elapsed());
                Ok(handle)
            }
            Err(err) => {
                inner.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!("{err}");
                Err(err)
            }
        }
    }

    fn materialize<T: Asset>(&self, key: &ResourceKey, decoder_key: Option<&str>) -> AssetResult<SharedHandle<T>> {
        let inner = &self.inner;
        let decoder = inner
            .resolver
            .resolve(&key.name, key.kind, decoder_key)
            .ok_or_else(|| AssetError::NotFound { key: key.clone() })?
            .erased();

        if decoder.output_type() != TypeId::of::<T>() {
            return Err(AssetError::TypeMismatch {
                key: key.clone(),
                expected: std::any::type_name::<T>(),
                found: decoder.output_name(),
            });
        }

        let sources = if decoder.needs_sources() {
            let sources = inner
                .provider
                .open_all(&key.name)
                .map_err(|err| AssetError::load_failed(key, err))?;
            if sources.is_empty() {
                return Err(AssetError::NotFound { key: key.clone() });
            }
            sources
        } else {
            Vec::new()
        };

        let ctx = LoadContext { key, cache: self };
        let payload = decoder
            .decode_erased(&ctx, sources)
            .map_err(|err| AssetError::load_failed(key, err))?
            .downcast::<T>()
            .map_err(|_| AssetError::TypeMismatch {
                key: key.clone(),
                expected: std::any::type_name::<T>(),
                found: decoder.output_name(),
            })?;

        let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let owner = Arc::downgrade(inner);
        let slot_key = key.clone();
        let handle = SharedHandle::new(*payload, move |payload: &T| {
            release_slot(&owner, &slot_key, generation, payload);
        });

        inner.slots.insert(
            key.clone(),
            Slot::Ready {
                generation,
                type_name: std::any::type_name::<T>(),
                handle: Box::new(handle.downgrade()),
            },
        );
        Ok(handle)
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            loads: c.loads.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
        }
    }

    /// Keys with a decoded resource that is still owned, sorted by name.
    pub fn live_entries(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self
            .inner
            .slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready { handle, .. } if handle.ref_count() > 0))
            .map(|slot| slot.key().clone())
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.kind.name().cmp(b.kind.name())));
        keys
    }

    pub fn contains(&self, name: &str, kind: AssetKind) -> bool {
        let key = ResourceKey::new(name, kind);
        self.inner
            .slots
            .get(&key)
            .is_some_and(|slot| matches!(slot.value(), Slot::Ready { handle, .. } if handle.ref_count() > 0))
    }
}

/// Disposer of every cached resource: drop the slot (if it is still this
/// generation's), then free the payload's device objects.
fn release_slot<T: Asset>(owner: &Weak<CacheInner>, key: &ResourceKey, generation: u64, payload: &T) {
    if let Some(inner) = owner.upgrade() {
        inner.evict(key, generation);
    }
    if let Err(err) = payload.dispose() {
        log::error!("failed to dispose `{key}`: {err:#}");
    }
}

impl Drop for AssetCache {
    fn drop(&mut self) {
        let mut leaked = 0;
        for slot in self.inner.slots.iter() {
            if let Slot::Ready { handle, type_name, .. } = slot.value() {
                let refs = handle.ref_count();
                if refs > 0 {
                    warn!("`{}` ({type_name}) still has {refs} live handle(s) at cache teardown", slot.key());
                    leaked += 1;
                }
            }
        }
        let stats = self.stats();
        info!(
            "asset cache shut down: {} loads, {} hits, {} failures, {} evictions, {leaked} leaked",
            stats.loads, stats.hits, stats.failures, stats.evictions
        );
    }
}
