use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use jassets::AssetError;
use jassets::assets::SharedHandle;

fn counted<T: Send + Sync + 'static>(payload: T) -> (SharedHandle<T>, Arc<AtomicUsize>) {
    let disposed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disposed);
    let handle = SharedHandle::new(payload, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (handle, disposed)
}

#[test]
fn disposer_runs_once_after_concurrent_retain_release() {
    let (handle, disposed) = counted(vec![1_u8; 64]);

    thread::scope(|scope| {
        for _ in 0..8 {
            let local = handle.retain();
            scope.spawn(move || {
                for _ in 0..1_000 {
                    let extra = local.retain();
                    assert_eq!(extra.len(), 64);
                    extra.release();
                }
                local.release();
            });
        }
    });

    assert_eq!(handle.ref_count(), 1);
    assert_eq!(disposed.load(Ordering::SeqCst), 0);
    handle.release();
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn last_owner_on_another_thread_disposes() {
    let (handle, disposed) = counted(String::from("shared"));
    let weak = handle.downgrade();
    let moved = handle.retain();
    drop(handle);

    thread::spawn(move || moved.release()).join().unwrap();

    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(matches!(weak.value(), Err(AssetError::UseAfterRelease { .. })));
    assert!(weak.upgrade().is_none());
}

#[test]
fn weak_view_reads_while_owned() {
    let (handle, _) = counted(42_u32);
    let weak = handle.downgrade();
    assert_eq!(*weak.value().unwrap(), 42);
    assert_eq!(weak.ref_count(), 1);

    let upgraded = weak.upgrade().unwrap();
    assert!(SharedHandle::ptr_eq(&handle, &upgraded));
    assert_eq!(handle.ref_count(), 2);
}

#[test]
fn clone_counts_like_retain() {
    let (handle, disposed) = counted(());
    let copies: Vec<_> = (0..5).map(|_| handle.clone()).collect();
    assert_eq!(handle.ref_count(), 6);
    drop(copies);
    drop(handle);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
}
