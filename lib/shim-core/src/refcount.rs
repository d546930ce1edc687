//! Reference counting for game-visible resource handles.
//!
//! The legacy ABI's `AddRef`/`Release` pair maps directly onto `Arc`'s
//! strong count: `AddRef` leaks one logical strong reference (the caller is
//! responsible for balancing it with a later `Release`, exactly as with COM)
//! and `Release` drops one. When the count reaches zero the `Arc`'s normal
//! drop glue releases the backend handle and frees staging memory — there is
//! nothing bespoke to do here, which is the point: the resource manager
//! doesn't need a separate free-list or manual bookkeeping.

use std::sync::Arc;

/// Atomically increments and returns the new count.
pub fn add_ref<T>(handle: &Arc<T>) -> u32 {
    std::mem::forget(Arc::clone(handle));
    Arc::strong_count(handle) as u32
}

/// Atomically decrements and returns the new count. At zero, dropping
/// `handle` here releases the backend object.
pub fn release<T>(handle: Arc<T>) -> u32 {
    let count = Arc::strong_count(&handle) - 1;
    drop(handle);
    count as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_ref_then_release_matches_legacy_discipline() {
        let handle = Arc::new(42u32);
        assert_eq!(Arc::strong_count(&handle), 1);

        assert_eq!(add_ref(&handle), 2);
        assert_eq!(add_ref(&handle), 3);
        assert_eq!(Arc::strong_count(&handle), 3);

        assert_eq!(release(Arc::clone(&handle)), 2);
        assert_eq!(release(Arc::clone(&handle)), 1);
        assert_eq!(release(handle), 0);
    }
}
