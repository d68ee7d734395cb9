use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::Asset;
use crate::error::{AssetError, AssetResult};

type Disposer<T> = Box<dyn FnOnce(&T) + Send>;

struct Shared<T> {
    refs: AtomicUsize,
    disposed: AtomicBool,
    disposer: Mutex<Option<Disposer<T>>>,
    payload: T,
}

impl<T> Shared<T> {
    fn dispose(&self) {
        // Flag first so weak observers fail while the disposer is still running.
        self.disposed.store(true, Ordering::Release);
        if let Some(disposer) = self.disposer.lock().take() {
            disposer(&self.payload);
        }
    }
}

// ── SharedHandle ──────────────────────────────────────────────────────────────

/// Counted, shared ownership of a loaded resource.
///
/// Every handle owns exactly one count. [`retain`](Self::retain) (or `clone`)
/// adds one, [`release`](Self::release) (or dropping the handle) removes one.
/// The thread that takes the count to zero runs the disposer synchronously,
/// and it runs at most once.
///
/// Releasing consumes the handle, so releasing twice or reading the payload
/// after release through the same handle does not compile. Use
/// [`WeakHandle`] to observe a resource without keeping it alive.
pub struct SharedHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SharedHandle<T> {
    /// Wraps `payload` with a count of one. `disposer` runs when the last
    /// handle is released.
    pub fn new(payload: T, disposer: impl FnOnce(&T) + Send + 'static) -> Self {
        Self::with_disposer(payload, Some(Box::new(disposer)))
    }

    /// A handle whose release only drops the payload.
    pub fn unmanaged(payload: T) -> Self {
        Self::with_disposer(payload, None)
    }

    fn with_disposer(payload: T, disposer: Option<Disposer<T>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                refs: AtomicUsize::new(1),
                disposed: AtomicBool::new(false),
                disposer: Mutex::new(disposer),
                payload,
            }),
        }
    }

    /// Adds a count and returns the new, independent handle.
    pub fn retain(&self) -> Self {
        let previous = self.shared.refs.fetch_add(1, Ordering::Relaxed);
        assert!(previous != 0, "retain on a released {} handle", std::any::type_name::<T>());
        Self { shared: Arc::clone(&self.shared) }
    }

    /// Gives up this handle's count. Same as dropping it.
    pub fn release(self) {
        drop(self);
    }

    pub fn value(&self) -> &T {
        debug_assert!(!self.shared.disposed.load(Ordering::Acquire));
        &self.shared.payload
    }

    /// Live count across all handles of this resource.
    pub fn ref_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }

    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle { shared: Arc::clone(&self.shared) }
    }

    /// `true` when both handles share the same resource.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}

impl<T: Asset> SharedHandle<T> {
    /// Handle that calls [`Asset::dispose`] on the last release, logging
    /// (not propagating) a failure. Used for resources that never enter a
    /// cache slot, such as freshly committed atlas textures.
    pub fn from_asset(asset: T) -> Self {
        Self::new(asset, |asset: &T| {
            if let Err(err) = asset.dispose() {
                log::error!("failed to dispose {}: {err:#}", std::any::type_name::<T>());
            }
        })
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        let previous = self.shared.refs.fetch_sub(1, Ordering::AcqRel);
        assert!(previous != 0, "double release of a {} handle", std::any::type_name::<T>());
        if previous == 1 {
            self.shared.dispose();
        }
    }
}

impl<T> Deref for SharedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("type", &std::any::type_name::<T>())
            .field("refs", &self.ref_count())
            .finish()
    }
}

// ── WeakHandle ────────────────────────────────────────────────────────────────

/// Non-owning view of a shared resource. Holds no count.
pub struct WeakHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> WeakHandle<T> {
    /// Retains the resource if at least one owner still holds it. A count
    /// that already reached zero is never brought back.
    pub fn upgrade(&self) -> Option<SharedHandle<T>> {
        self.shared
            .refs
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |n| (n != 0).then_some(n + 1))
            .ok()
            .map(|_| SharedHandle { shared: Arc::clone(&self.shared) })
    }

    /// Borrows the payload, failing once the resource has been disposed.
    pub fn value(&self) -> AssetResult<&T> {
        if self.is_disposed() {
            return Err(AssetError::UseAfterRelease { type_name: std::any::type_name::<T>() });
        }
        Ok(&self.shared.payload)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    pub fn ref_count(&self) -> usize {
        self.shared.refs.load(Ordering::Acquire)
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

// ── ErasedWeak: type-erased slot view used by the cache ───────────────────────

pub(crate) trait ErasedWeak: Send + Sync {
    fn ref_count(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Send + Sync + 'static> ErasedWeak for WeakHandle<T> {
    fn ref_count(&self) -> usize {
        WeakHandle::ref_count(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
