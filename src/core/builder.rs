use std::sync::Arc;

use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::{config::SyncConfig, synchronizer::Synchronizer};

/// Assembles a [`Synchronizer`] together with its subscribers.
pub struct SynchronizerBuilder {
    cfg: SyncConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SynchronizerBuilder {
    /// Starts from `cfg` with no subscribers.
    pub fn new(cfg: SyncConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the subscriber list.
    ///
    /// Each one gets its own lane; see [`SubscriberSet`].
    pub fn with_subscribers(self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self { subscribers, ..self }
    }

    /// Creates the bus, spawns subscriber workers and the listener feeding
    /// them, and returns the synchronizer.
    ///
    /// Needs a tokio runtime when the subscriber list is non-empty.
    pub fn build(self) -> Arc<Synchronizer> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));

        Arc::new(Synchronizer::new_internal(self.cfg, bus, subs))
    }
}
