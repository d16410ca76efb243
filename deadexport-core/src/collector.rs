//! Concurrent call collector.
//!
//! Records every `(unit, symbol)` reference observed while a compile session
//! runs. Workers write through a cloned [`CollectorHandle`]; the session owner
//! drains it with [`CollectorHandle::stop`] once all workers have quiesced.
//!
//! Concurrency model:
//! - The aggregator is a sharded `DashMap`, so writers to different units
//!   rarely contend
//! - `record` holds a shared lock on the slot; `stop` takes it exclusively,
//!   so no record can land after the aggregator has been detached
//! - Insertion is set union: idempotent and commutative

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::CollectorError;
use crate::identity::{ReferenceMap, SymbolIdentity, UnitId};

type Aggregator = DashMap<UnitId, HashSet<SymbolIdentity>>;

/// Live aggregator tagged with the run that created it.
struct Running {
    generation: u64,
    calls: Aggregator,
}

#[derive(Default)]
struct Slot {
    running: Option<Running>,
    generation: u64,
}

/// Owner of the single per-session aggregator.
#[derive(Default, Clone)]
pub struct CallCollector {
    slot: Arc<RwLock<Slot>>,
}

impl CallCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, empty aggregator and return a handle to it.
    ///
    /// Fails with [`CollectorError::AlreadyRunning`] if the previous run was
    /// never stopped.
    pub fn start(&self) -> Result<CollectorHandle, CollectorError> {
        let mut slot = self.slot.write();
        if slot.running.is_some() {
            return Err(CollectorError::AlreadyRunning);
        }

        slot.generation += 1;
        let generation = slot.generation;
        slot.running = Some(Running {
            generation,
            calls: DashMap::new(),
        });
        debug!(generation, "call collector started");

        Ok(CollectorHandle {
            slot: Arc::clone(&self.slot),
            generation,
        })
    }

    pub fn is_running(&self) -> bool {
        self.slot.read().running.is_some()
    }
}

/// Cloneable, thread-safe handle passed to every recording worker.
///
/// A handle is bound to the run that produced it: after `stop`, every call
/// through it (or its clones) fails with [`CollectorError::NotRunning`], even
/// if a later run has been started.
#[derive(Clone)]
pub struct CollectorHandle {
    slot: Arc<RwLock<Slot>>,
    generation: u64,
}

impl CollectorHandle {
    /// Record that `unit` references `identity`.
    pub fn record(&self, unit: &UnitId, identity: SymbolIdentity) -> Result<(), CollectorError> {
        let slot = self.slot.read();
        let calls = self.calls(&slot)?;

        if let Some(mut set) = calls.get_mut(unit) {
            set.insert(identity);
        } else {
            calls.entry(unit.clone()).or_default().insert(identity);
        }
        Ok(())
    }

    /// Record every reference of one unit under a single shard lock.
    pub fn record_all<I>(&self, unit: &UnitId, identities: I) -> Result<(), CollectorError>
    where
        I: IntoIterator<Item = SymbolIdentity>,
    {
        let slot = self.slot.read();
        let calls = self.calls(&slot)?;
        calls.entry(unit.clone()).or_default().extend(identities);
        Ok(())
    }

    /// Copy of everything recorded so far. Does not mutate the aggregator.
    pub fn snapshot(&self) -> Result<ReferenceMap, CollectorError> {
        let slot = self.slot.read();
        let calls = self.calls(&slot)?;
        Ok(calls
            .iter()
            .map(|entry| {
                let ids: BTreeSet<SymbolIdentity> = entry.value().iter().cloned().collect();
                (entry.key().clone(), ids)
            })
            .collect())
    }

    /// Detach and release the aggregator, returning its final contents.
    ///
    /// Only call once every worker holding a clone of this handle is done.
    pub fn stop(&self) -> Result<ReferenceMap, CollectorError> {
        let mut slot = self.slot.write();
        match &slot.running {
            Some(running) if running.generation == self.generation => {}
            _ => return Err(CollectorError::NotRunning),
        }

        let running = slot.running.take().ok_or(CollectorError::NotRunning)?;
        let calls: ReferenceMap = running
            .calls
            .into_iter()
            .map(|(unit, ids)| (unit, ids.into_iter().collect()))
            .collect();
        debug!(
            generation = self.generation,
            units = calls.len(),
            "call collector stopped"
        );
        Ok(calls)
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.slot.read().running, Some(r) if r.generation == self.generation)
    }

    fn calls<'a>(&self, slot: &'a Slot) -> Result<&'a Aggregator, CollectorError> {
        match &slot.running {
            Some(running) if running.generation == self.generation => Ok(&running.calls),
            _ => Err(CollectorError::NotRunning),
        }
    }
}
