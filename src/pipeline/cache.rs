//! Pipeline cache (spec §4.7): bounded LRU over `PipelineFingerprint`,
//! single-flight construction via `tokio::sync::OnceCell`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::PipelineRunner;
use crate::types::PipelineFingerprint;

const DEFAULT_CAPACITY: usize = 16;

type Slot = Arc<OnceCell<Result<Arc<PipelineRunner>>>>;

/// Immutable once constructed; concurrent readers never block each other
/// except while the first caller for a given fingerprint is constructing.
pub struct PipelineCache {
    capacity: usize,
    slots: Mutex<HashMap<PipelineFingerprint, Slot>>,
    order: Mutex<VecDeque<PipelineFingerprint>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the cached runner for `fingerprint`, constructing it with
    /// `build` if absent. Concurrent callers for the same fingerprint share
    /// one in-flight construction. A construction failure (e.g. a
    /// `ConfigError` from an unknown plugin name) is remembered as a
    /// negative entry and returned again on every subsequent call for the
    /// same fingerprint until `invalidate`/`invalidate_all` (spec §7: "cached
    /// as a negative entry for the fingerprint until reload"). This relies on
    /// `OnceCell::get_or_init`, not `get_or_try_init`: the latter leaves the
    /// cell uninitialized on `Err` and would silently retry construction on
    /// every call instead.
    pub async fn get_or_construct<F, Fut>(&self, fingerprint: &PipelineFingerprint, build: F) -> Result<Arc<PipelineRunner>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PipelineRunner>>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(fingerprint.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = slot.get_or_init(|| async { build().await.map(Arc::new) }).await.clone();
        self.touch(fingerprint);
        result
    }

    fn touch(&self, fingerprint: &PipelineFingerprint) {
        let mut order = self.order.lock();
        order.retain(|f| f != fingerprint);
        order.push_back(fingerprint.clone());
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                debug!(fingerprint = %evicted, "evicting pipeline cache entry");
                self.slots.lock().remove(&evicted);
            }
        }
    }

    /// Invalidates one entry (spec §4.7 hot-swap). In-flight invocations
    /// hold their own `Arc<PipelineRunner>` and complete unaffected.
    pub fn invalidate(&self, fingerprint: &PipelineFingerprint) {
        self.slots.lock().remove(fingerprint);
        self.order.lock().retain(|f| f != fingerprint);
    }

    pub fn invalidate_all(&self) {
        self.slots.lock().clear();
        self.order.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stub_runner(fingerprint: &PipelineFingerprint) -> PipelineRunner {
        use crate::inventory::Inventory;
        use crate::plugins::builtin::asr_stub::StubAsr;
        use crate::plugins::builtin::textref_dictionary::DictionaryTextRef;
        use crate::plugins::registry::ResolvedPlugins;

        let resolved = ResolvedPlugins {
            asr: Arc::new(StubAsr::new()),
            textref: Arc::new(DictionaryTextRef::bundled_en()),
            comparator: None,
            preprocessor: None,
            llm: None,
            warnings: Vec::new(),
        };
        PipelineRunner::new(fingerprint.clone(), resolved, Arc::new(Inventory::new("en")), "en".to_string())
    }

    #[tokio::test]
    async fn constructs_once_and_reuses_entry() {
        let cache = PipelineCache::with_capacity(4);
        let fingerprint = PipelineFingerprint("a".to_string());
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_construct(&fingerprint, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(stub_runner(&fingerprint))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_construct(&fingerprint, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(stub_runner(&fingerprint))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn evicts_oldest_entry_past_capacity() {
        let cache = PipelineCache::with_capacity(2);
        for i in 0..3 {
            let fingerprint = PipelineFingerprint(format!("fp-{i}"));
            cache.get_or_construct(&fingerprint, || async { Ok(stub_runner(&fingerprint)) }).await.unwrap();
        }
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = PipelineCache::with_capacity(4);
        let fingerprint = PipelineFingerprint("a".to_string());
        cache.get_or_construct(&fingerprint, || async { Ok(stub_runner(&fingerprint)) }).await.unwrap();
        cache.invalidate(&fingerprint);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn construction_failure_is_cached_as_negative_entry() {
        use crate::error::PipelineError;

        let cache = PipelineCache::with_capacity(4);
        let fingerprint = PipelineFingerprint("bad".to_string());
        let calls = AtomicUsize::new(0);

        let build = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::config("unknown plugin `ghost-asr`"))
        };

        let first = cache.get_or_construct(&fingerprint, build).await;
        let second = cache.get_or_construct(&fingerprint, build).await;

        assert!(first.is_err());
        assert!(second.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "construction must not be retried once cached as a failure");

        cache.invalidate(&fingerprint);
        cache.get_or_construct(&fingerprint, build).await.ok();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "invalidate must clear the negative entry");
    }
}
