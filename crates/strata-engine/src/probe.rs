//! Probes: observers notified at the lifecycle points of a run.
//!
//! Probes are registered on an [`Engine`] under a unique name and invoked
//! in registration order. A probe error is logged and the run continues.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use strata_core::{SimError, TimeStamp};
use tracing::{error, info};

use crate::engine::Engine;
use crate::error::{EngineError, ProbeError};

/// Lifecycle callbacks of a run. Every callback defaults to a no-op.
///
/// Callbacks run on the driver thread, between ticks. The engine passed in
/// is read-only; use it to inspect levels, agents and dynamic states.
pub trait Probe: Send + Sync {
    /// Before the initial observation.
    fn prepare_observation(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    /// Once the simulation is initialized at its initial time.
    fn observe_at_initial_times(&self, time: TimeStamp, engine: &Engine) -> Result<(), ProbeError> {
        let _ = (time, engine);
        Ok(())
    }

    /// After every tick. `time` is the new current time.
    fn observe_at_partial_consistent_time(
        &self,
        time: TimeStamp,
        engine: &Engine,
    ) -> Result<(), ProbeError> {
        let _ = (time, engine);
        Ok(())
    }

    /// When the end criterion is met.
    fn observe_at_final_time(&self, time: TimeStamp, engine: &Engine) -> Result<(), ProbeError> {
        let _ = (time, engine);
        Ok(())
    }

    /// When the run fails. `end_observation` is not called afterwards.
    fn react_to_error(&self, message: &str, cause: &EngineError) -> Result<(), ProbeError> {
        let _ = (message, cause);
        Ok(())
    }

    /// When the run stops on an abort request.
    fn react_to_abortion(&self, time: TimeStamp, engine: &Engine) -> Result<(), ProbeError> {
        let _ = (time, engine);
        Ok(())
    }

    /// Last callback of a completed or aborted run.
    fn end_observation(&self) -> Result<(), ProbeError> {
        Ok(())
    }
}

// ── ProbeRegistry ──────────────────────────────────────────────────

/// Name-keyed probes in registration order, behind a mutex.
///
/// Notification works on a snapshot so the lock is never held across a
/// callback.
#[derive(Default)]
pub(crate) struct ProbeRegistry {
    probes: Mutex<IndexMap<String, Arc<dyn Probe>>>,
}

impl ProbeRegistry {
    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Arc<dyn Probe>>> {
        self.probes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn add(&self, name: &str, probe: Arc<dyn Probe>) -> Result<(), SimError> {
        if name.is_empty() {
            return Err(SimError::invalid("probe name must not be empty"));
        }
        let mut probes = self.lock();
        if probes.contains_key(name) {
            return Err(SimError::invalid(format!("probe {name:?} is already registered")));
        }
        probes.insert(name.to_owned(), probe);
        Ok(())
    }

    pub(crate) fn remove(&self, name: &str) -> Option<Arc<dyn Probe>> {
        self.lock().shift_remove(name)
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, Arc<dyn Probe>)> {
        self.lock()
            .iter()
            .map(|(name, probe)| (name.clone(), Arc::clone(probe)))
            .collect()
    }

    /// A registry sharing the same probes.
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            probes: Mutex::new(self.lock().clone()),
        }
    }
}

// ── TracingProbe ───────────────────────────────────────────────────

/// Logs every lifecycle callback through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingProbe;

impl Probe for TracingProbe {
    fn prepare_observation(&self) -> Result<(), ProbeError> {
        info!("preparing observation");
        Ok(())
    }

    fn observe_at_initial_times(&self, time: TimeStamp, engine: &Engine) -> Result<(), ProbeError> {
        info!(
            %time,
            levels = engine.level_ids().len(),
            agents = engine.agent_count(),
            "simulation initialized"
        );
        Ok(())
    }

    fn observe_at_partial_consistent_time(
        &self,
        time: TimeStamp,
        engine: &Engine,
    ) -> Result<(), ProbeError> {
        info!(%time, agents = engine.agent_count(), "tick completed");
        Ok(())
    }

    fn observe_at_final_time(&self, time: TimeStamp, _engine: &Engine) -> Result<(), ProbeError> {
        info!(%time, "simulation reached its final time");
        Ok(())
    }

    fn react_to_error(&self, message: &str, cause: &EngineError) -> Result<(), ProbeError> {
        error!(%cause, "{message}");
        Ok(())
    }

    fn react_to_abortion(&self, time: TimeStamp, _engine: &Engine) -> Result<(), ProbeError> {
        info!(%time, "simulation aborted");
        Ok(())
    }

    fn end_observation(&self) -> Result<(), ProbeError> {
        info!("observation ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl Probe for Silent {}

    #[test]
    fn duplicate_and_empty_names_rejected() {
        let registry = ProbeRegistry::default();
        registry.add("p", Arc::new(Silent)).unwrap();
        assert!(matches!(
            registry.add("p", Arc::new(Silent)),
            Err(SimError::InvalidArgument { .. })
        ));
        assert!(registry.add("", Arc::new(Silent)).is_err());
    }

    #[test]
    fn insertion_order_survives_removal() {
        let registry = ProbeRegistry::default();
        for name in ["a", "b", "c", "d"] {
            registry.add(name, Arc::new(Silent)).unwrap();
        }
        assert!(registry.remove("b").is_some());
        assert!(registry.remove("b").is_none());
        assert_eq!(registry.ids(), vec!["a", "c", "d"]);
        let names: Vec<String> = registry.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "c", "d"]);
    }

    #[test]
    fn duplicate_shares_probes() {
        let registry = ProbeRegistry::default();
        let probe: Arc<dyn Probe> = Arc::new(Silent);
        registry.add("a", Arc::clone(&probe)).unwrap();
        let copy = registry.duplicate();
        let (_, shared) = copy.snapshot().remove(0);
        assert!(Arc::ptr_eq(&shared, &probe));
        copy.remove("a");
        assert_eq!(registry.ids(), vec!["a"]);
    }
}
