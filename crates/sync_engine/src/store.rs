//! Per-source swap-event store with bounded retention.
//!
//! One store per time-domain source (display, audio stream, clock). The
//! store owns a bounded ring of `(time, unit)` samples, corrects incoming
//! times by a configured latency offset, and notifies listeners on every
//! stored sample with a read-only snapshot.
//!
//! Thread model: mutation happens on whatever thread delivers swap events
//! (often a secondary thread); readers take the store's re-entrant mutex.
//! Listeners fire while the mutex is held, so a listener may call back
//! into the same store but must not take other locks a store caller could
//! hold.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, trace, warn};

use contracts::{
    SharedClock, SwapData, SwapObservation, SwapSource, SwapStoreConfig, SwapUnit, Time,
};

/// Identifier for a registered new-data listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// New-data callback; receives a snapshot of the full sample window.
pub type NewDataListener = Arc<dyn Fn(&[SwapData]) + Send + Sync>;

struct Inner {
    data: HeapRb<SwapData>,
    config: SwapStoreConfig,
    next_unit: SwapUnit,
    listeners: Vec<(ListenerId, NewDataListener)>,
    next_listener_id: u64,
    upstream: Option<Arc<dyn SwapSource>>,
    stored_count: u64,
    evicted_count: u64,
    out_of_order_count: u64,
}

impl Inner {
    fn snapshot(&self) -> Vec<SwapData> {
        self.data.iter().copied().collect()
    }

    fn push_bounded(&mut self, sample: SwapData) {
        if let Some(last) = self.data.iter().last() {
            if sample.time < last.time {
                self.out_of_order_count += 1;
            }
        }
        // Evict from the front until the cap holds
        while self.data.is_full() {
            let _ = self.data.try_pop();
            self.evicted_count += 1;
        }
        let _ = self.data.try_push(sample);
        self.stored_count += 1;
    }
}

/// Mutex-protected ring of swap samples for one source.
pub struct SwapStore {
    name: String,
    clock: SharedClock,
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl std::fmt::Debug for SwapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapStore")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("sample_size", &self.sample_size())
            .finish()
    }
}

impl SwapStore {
    /// Create a store for one source.
    pub fn new(name: impl Into<String>, config: SwapStoreConfig, clock: SharedClock) -> Arc<Self> {
        let capacity = config.sample_size.max(1);
        Arc::new(Self {
            name: name.into(),
            clock,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                data: HeapRb::new(capacity),
                config,
                next_unit: 0,
                listeners: Vec::new(),
                next_listener_id: 0,
                upstream: None,
                stored_count: 0,
                evicted_count: 0,
                out_of_order_count: 0,
            })),
        })
    }

    /// Source name this store belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The clock this store (and its polled listeners) read "now" from.
    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    /// Store a bare swap time; the unit is inferred from the counter.
    ///
    /// The configured latency offset is subtracted before storage and the
    /// counter advances by `units_per_swap`.
    pub fn store_swap_time(&self, time: Time) {
        let guard = self.inner.lock();
        let (snapshot, listeners) = {
            let mut inner = guard.borrow_mut();
            let corrected = time - inner.config.latency_offset;
            let unit = inner.next_unit;
            inner.next_unit = unit.saturating_add(inner.config.units_per_swap);
            inner.push_bounded(SwapData::new(corrected, unit));
            trace!(store = %self.name, time = %corrected, unit, "swap stored (inferred unit)");
            (inner.snapshot(), inner.listeners.clone())
        };
        metrics::counter!("timing_swaps_stored_total", "source" => self.name.clone()).increment(1);
        for (_, listener) in &listeners {
            listener(&snapshot);
        }
    }

    /// Store a full swap event with an explicit unit.
    ///
    /// Does not touch the inferred-unit counter.
    pub fn store_swap(&self, data: SwapData) {
        let guard = self.inner.lock();
        let (snapshot, listeners) = {
            let mut inner = guard.borrow_mut();
            let corrected = SwapData::new(data.time - inner.config.latency_offset, data.unit);
            inner.push_bounded(corrected);
            trace!(store = %self.name, time = %corrected.time, unit = corrected.unit, "swap stored");
            (inner.snapshot(), inner.listeners.clone())
        };
        metrics::counter!("timing_swaps_stored_total", "source" => self.name.clone()).increment(1);
        for (_, listener) in &listeners {
            listener(&snapshot);
        }
    }

    /// Bind to an upstream swap source; exactly one upstream at a time.
    ///
    /// Rebinding stops the previous upstream first. `None` unbinds
    /// cleanly.
    pub fn receive_from(self: &Arc<Self>, source: Option<Arc<dyn SwapSource>>) {
        let previous = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            std::mem::replace(&mut inner.upstream, source.clone())
        };
        if let Some(prev) = previous {
            debug!(store = %self.name, upstream = prev.source_id(), "detaching previous upstream");
            prev.stop();
        }
        let Some(source) = source else {
            return;
        };

        let weak = Arc::downgrade(self);
        debug!(store = %self.name, upstream = source.source_id(), "binding upstream");
        source.listen(Arc::new(move |observation: SwapObservation| {
            let Some(store) = weak.upgrade() else {
                return;
            };
            match observation {
                SwapObservation::Event(data) => store.store_swap(data),
                SwapObservation::TimeOnly(time) => store.store_swap_time(time),
            }
        }));
    }

    /// Forward every new sample of `upstream` into this store.
    ///
    /// This is the "another store's change notification" upstream kind:
    /// the forwarded sample keeps its explicit unit. Returns the listener
    /// id on the upstream store so the chain can be detached.
    pub fn receive_from_store(self: &Arc<Self>, upstream: &SwapStore) -> ListenerId {
        let weak = Arc::downgrade(self);
        upstream.add_new_data_listener(Arc::new(move |snapshot: &[SwapData]| {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if let Some(last) = snapshot.last() {
                store.store_swap(*last);
            }
        }))
    }

    /// Register a new-data listener. Fires under the store mutex.
    pub fn add_new_data_listener(&self, listener: NewDataListener) -> ListenerId {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let id = ListenerId(inner.next_listener_id);
        inner.next_listener_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    /// Remove a previously registered listener.
    pub fn remove_new_data_listener(&self, id: ListenerId) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.listeners.retain(|(lid, _)| *lid != id);
    }

    /// Empty the ring, optionally retaining the newest sample and
    /// optionally resetting the inferred-unit counter to zero.
    pub fn clear(&self, keep_last_sample: bool, reset_unit: bool) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let last = inner.data.iter().last().copied();
        while inner.data.try_pop().is_some() {}
        if keep_last_sample {
            if let Some(last) = last {
                let _ = inner.data.try_push(last);
            }
        }
        if reset_unit {
            inner.next_unit = 0;
        }
        debug!(store = %self.name, keep_last_sample, reset_unit, "store cleared");
    }

    // ===== Accessors =====

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        let len = guard.borrow().data.occupied_len();
        len
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the ring is at its sample cap.
    pub fn is_full(&self) -> bool {
        let guard = self.inner.lock();
        let full = guard.borrow().data.is_full();
        full
    }

    /// Configured latency offset.
    pub fn latency(&self) -> Time {
        let guard = self.inner.lock();
        let v = guard.borrow().config.latency_offset;
        v
    }

    /// Update the latency offset applied to future samples.
    pub fn set_latency(&self, latency: Time) {
        let guard = self.inner.lock();
        guard.borrow_mut().config.latency_offset = latency;
    }

    /// Configured sample cap.
    pub fn sample_size(&self) -> usize {
        let guard = self.inner.lock();
        let v = guard.borrow().config.sample_size;
        v
    }

    /// Nominal period between swaps.
    pub fn nominal_swap_period(&self) -> Time {
        let guard = self.inner.lock();
        let v = guard.borrow().config.nominal_swap_period;
        v
    }

    /// Unit advance per inferred swap.
    pub fn units_per_swap(&self) -> SwapUnit {
        let guard = self.inner.lock();
        let v = guard.borrow().config.units_per_swap;
        v
    }

    /// Most recent sample, if any.
    pub fn last_swap(&self) -> Option<SwapData> {
        let guard = self.inner.lock();
        let v = guard.borrow().data.iter().last().copied();
        v
    }

    /// The unit the next inferred swap will be stored under.
    pub fn next_swap_unit(&self) -> SwapUnit {
        let guard = self.inner.lock();
        let v = guard.borrow().next_unit;
        v
    }

    /// Snapshot copy of the sample window, oldest first.
    pub fn snapshot(&self) -> Vec<SwapData> {
        let guard = self.inner.lock();
        let v = guard.borrow().snapshot();
        v
    }

    /// Locked read of the sample window without copying out.
    ///
    /// The closure runs under the store mutex; keep it short.
    pub fn with_data<R>(&self, f: impl FnOnce(&[SwapData]) -> R) -> R {
        let guard = self.inner.lock();
        let snapshot = guard.borrow().snapshot();
        f(&snapshot)
    }

    /// Samples ever stored, eviction notwithstanding.
    ///
    /// Counts stored events, not units: two stores fed from the same
    /// upstream agree on this even when their unit counters differ.
    pub fn stored_count(&self) -> u64 {
        let guard = self.inner.lock();
        let v = guard.borrow().stored_count;
        v
    }

    /// Samples evicted at the cap since construction.
    pub fn evicted_count(&self) -> u64 {
        let guard = self.inner.lock();
        let v = guard.borrow().evicted_count;
        v
    }

    /// Samples that arrived with a time before their predecessor.
    ///
    /// Non-zero means the upstream broke the monotonic-clock contract;
    /// the linear fit will show it as a large MSE.
    pub fn out_of_order_count(&self) -> u64 {
        let guard = self.inner.lock();
        let v = guard.borrow().out_of_order_count;
        v
    }

    /// Stateful observer of this store's unit counter.
    pub fn polled_swap_listener(self: &Arc<Self>) -> PolledSwapListener {
        PolledSwapListener {
            store: Arc::clone(self),
            last_unit: self.last_swap().map(|d| d.unit),
        }
    }
}

impl Drop for SwapStore {
    fn drop(&mut self) {
        let guard = self.inner.lock();
        let upstream = guard.borrow_mut().upstream.take();
        drop(guard);
        if let Some(upstream) = upstream {
            upstream.stop();
        }
    }
}

/// Reports whether the observed store's last unit advanced since the
/// previous check; supports a bounded cooperative wait.
pub struct PolledSwapListener {
    store: Arc<SwapStore>,
    last_unit: Option<SwapUnit>,
}

impl PolledSwapListener {
    /// True iff a new swap landed in the store since the last call.
    pub fn has_swapped_since_last_check(&mut self) -> bool {
        let current = self.store.last_swap().map(|d| d.unit);
        let swapped = match (self.last_unit, current) {
            (None, Some(_)) => true,
            (Some(prev), Some(cur)) => cur > prev,
            _ => false,
        };
        if swapped {
            self.last_unit = current;
        }
        swapped
    }

    /// Spin (with cooperative yielding) until a swap lands or the timeout
    /// expires. Returns whether a swap was observed.
    pub fn wait_for_swap(&mut self, timeout: Time) -> bool {
        let clock = self.store.clock();
        let start = clock.now();
        loop {
            if self.has_swapped_since_last_check() {
                return true;
            }
            if clock.now() - start > timeout {
                if self.store.is_empty() {
                    warn!(store = self.store.name(), "wait_for_swap timed out on empty store");
                }
                return false;
            }
            std::thread::yield_now();
        }
    }
}
