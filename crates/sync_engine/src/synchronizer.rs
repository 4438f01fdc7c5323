//! Cross-domain synchronizer: named data clients, one sync point at a
//! time.
//!
//! The registry mutex guards membership only; each client reads under its
//! own locks, so a stalled source never blocks queries against the
//! others.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use contracts::{
    ClientPrediction, SharedClock, SwapUnit, SyncPoint, Time, TimePrediction, TimingError,
};

use crate::client::DataClient;

/// Registry of data clients sharing one experiment time base.
pub struct DomainSynchronizer {
    clock: SharedClock,
    clients: Mutex<HashMap<String, Arc<DataClient>>>,
}

impl DomainSynchronizer {
    /// Create a synchronizer reading "now" from `clock`.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Register a client under a unique name.
    pub fn add_data_client(
        &self,
        name: impl Into<String>,
        client: Arc<DataClient>,
    ) -> Result<(), TimingError> {
        let name = name.into();
        let mut clients = self.clients.lock();
        if clients.contains_key(&name) {
            return Err(TimingError::setup(
                "synchronizer",
                format!("data client {name:?} already registered"),
            ));
        }
        debug!(client = %name, "data client registered");
        clients.insert(name, client);
        Ok(())
    }

    /// Remove a client by name.
    pub fn remove_data_client(&self, name: &str) -> Result<Arc<DataClient>, TimingError> {
        self.clients
            .lock()
            .remove(name)
            .ok_or_else(|| TimingError::UnknownClient {
                name: name.to_string(),
            })
    }

    /// Drop every registered client.
    pub fn clear_data_clients(&self) {
        self.clients.lock().clear();
    }

    /// Look up a client by name.
    pub fn data_client(&self, name: &str) -> Option<Arc<DataClient>> {
        self.clients.lock().get(name).cloned()
    }

    /// Names of the registered clients, sorted.
    pub fn client_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Whether every registered client is ready. False while the registry
    /// is empty, matching `SyncPoint::valid`.
    pub fn all_ready(&self) -> bool {
        let clients = self.snapshot_clients();
        !clients.is_empty() && clients.iter().all(|(_, c)| c.all_ready())
    }

    /// Spin (with cooperative yielding) until every client is ready or
    /// the timeout expires.
    pub fn wait_until_all_ready(&self, timeout: Time) -> bool {
        let start = self.clock.now();
        loop {
            if self.all_ready() {
                return true;
            }
            if self.clock.now() - start > timeout {
                warn!(status = %self.status_string(), "wait_until_all_ready timed out");
                return false;
            }
            std::thread::yield_now();
        }
    }

    /// One line per client: name, status and readiness.
    pub fn status_string(&self) -> String {
        let mut clients = self.snapshot_clients();
        clients.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = String::new();
        for (name, client) in clients {
            let _ = writeln!(
                out,
                "{name}: {} ready={}",
                client.status().label(),
                client.all_ready()
            );
        }
        out
    }

    /// Sync point anchored at an exact wall-clock time.
    ///
    /// Every client is inverted at `time` independently; an unstable
    /// client contributes an unready entry without poisoning the rest.
    pub fn get_sync_point_at_time(&self, time: Time) -> SyncPoint {
        let root = TimePrediction::exact(time);
        let point = self.invert_all_at(root);
        metrics::counter!("timing_sync_points_total", "kind" => "at_time").increment(1);
        point
    }

    /// Sync point anchored at one client's swap unit.
    ///
    /// The anchor's predicted time of `unit` becomes the root; every
    /// client (the anchor included) is inverted at that root.
    pub fn get_sync_point_for_unit(
        &self,
        anchor: &str,
        unit: SwapUnit,
    ) -> Result<SyncPoint, TimingError> {
        let anchor_client = self
            .data_client(anchor)
            .ok_or_else(|| TimingError::UnknownClient {
                name: anchor.to_string(),
            })?;
        let root = anchor_client.predict_swap_time(unit);
        let point = self.invert_all_at(root);
        metrics::counter!("timing_sync_points_total", "kind" => "for_unit").increment(1);
        Ok(point)
    }

    fn invert_all_at(&self, root: TimePrediction) -> SyncPoint {
        let mut predictions = HashMap::new();
        for (name, client) in self.snapshot_clients() {
            predictions.insert(
                name,
                ClientPrediction {
                    prediction: client.predict_swap_unit(root),
                    ready: client.all_ready(),
                    status: client.status(),
                },
            );
        }
        SyncPoint {
            time: root,
            clients: predictions,
        }
    }

    fn snapshot_clients(&self) -> Vec<(String, Arc<DataClient>)> {
        self.clients
            .lock()
            .iter()
            .map(|(name, client)| (name.clone(), Arc::clone(client)))
            .collect()
    }
}
