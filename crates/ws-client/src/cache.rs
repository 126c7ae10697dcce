use std::num::NonZeroUsize;
use std::sync::Mutex;

use helius_common::Signature;

/// Membership set used to suppress duplicate log notifications by
/// transaction signature.
///
/// Called from the dispatch path with no connection lock held;
/// implementations must synchronize internally.
pub trait SignatureCache: Send + Sync {
    /// True when `signature` has been seen before.
    fn has(&self, signature: &Signature) -> bool;
    /// Records `signature` as seen.
    fn set(&self, signature: Signature);
}

/// The default cache never remembers anything, so no notification is ever
/// suppressed.
pub(crate) struct NoopSignatureCache;

impl SignatureCache for NoopSignatureCache {
    fn has(&self, _signature: &Signature) -> bool {
        false
    }

    fn set(&self, _signature: Signature) {}
}

/// Bounded-memory signature cache with least-recently-used eviction.
pub struct LruSignatureCache {
    inner: Mutex<lru::LruCache<Signature, ()>>,
}

impl LruSignatureCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(lru::LruCache::new(capacity)),
        }
    }
}

impl SignatureCache for LruSignatureCache {
    fn has(&self, signature: &Signature) -> bool {
        self.inner
            .lock()
            .expect("signature cache lock poisoned")
            .get(signature)
            .is_some()
    }

    fn set(&self, signature: Signature) {
        self.inner
            .lock()
            .expect("signature cache lock poisoned")
            .put(signature, ());
    }
}
