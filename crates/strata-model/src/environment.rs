//! The environment: the simulation's single non-agent participant.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rand_chacha::ChaCha8Rng;
use strata_core::{LevelId, LocalState, ModelError, Owner, SimError, TimeWindow, Visibility};

use crate::context::NaturalContext;
use crate::dynamic::DynamicStateMap;
use crate::influence_map::InfluenceMap;

/// Produces the environment's spontaneous influences at one level
/// (evaporation, weather, growth).
pub trait NaturalModel: Send + Sync {
    /// The level this model acts on.
    fn level(&self) -> &LevelId;

    /// Emit influences through `ctx`.
    fn natural(&self, ctx: &mut NaturalContext<'_>) -> Result<(), ModelError>;
}

/// Public and private local state per level, plus a natural-action model
/// per level.
///
/// Like agents, the environment stages its public local states until the
/// engine hands them to the levels' consistent states.
#[derive(Clone, Default)]
pub struct Environment {
    staged_public: IndexMap<LevelId, LocalState>,
    private: IndexMap<LevelId, LocalState>,
    natural: IndexMap<LevelId, Arc<dyn NaturalModel>>,
}

impl Environment {
    /// An environment present in no level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the environment's local states for `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if a state is not owned by the
    /// environment, does not describe `level`, or has the wrong visibility.
    pub fn include_new_level(
        &mut self,
        level: LevelId,
        public: LocalState,
        private: LocalState,
    ) -> Result<(), SimError> {
        check(&level, &public, Visibility::Public)?;
        check(&level, &private, Visibility::Private)?;
        self.staged_public.insert(level.clone(), public);
        self.private.insert(level, private);
        Ok(())
    }

    /// Install the natural-action model of `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if the model reports another
    /// level.
    pub fn specify_behavior_for_level(
        &mut self,
        level: LevelId,
        natural: Arc<dyn NaturalModel>,
    ) -> Result<(), SimError> {
        if natural.level() != &level {
            return Err(SimError::invalid(format!(
                "natural-action model of level {} installed for level {level}",
                natural.level()
            )));
        }
        self.natural.insert(level, natural);
        Ok(())
    }

    /// Levels the environment has local states for.
    pub fn levels(&self) -> impl Iterator<Item = &LevelId> {
        self.private.keys()
    }

    /// Whether `level` has both local states and a natural-action model.
    pub fn is_complete_for(&self, level: &LevelId) -> bool {
        self.private.contains_key(level) && self.natural.contains_key(level)
    }

    /// The private local state of `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::OutOfRange`] if the environment has none.
    pub fn private_local_state(&self, level: &LevelId) -> Result<&LocalState, SimError> {
        self.private.get(level).ok_or_else(|| {
            SimError::out_of_range(format!("environment has no local state for level {level}"))
        })
    }

    /// A public local state not yet handed to its level.
    pub fn staged_public_local_state(&self, level: &LevelId) -> Option<&LocalState> {
        self.staged_public.get(level)
    }

    /// Hand the staged public local state of `level` over.
    pub fn take_staged_public_local_state(&mut self, level: &LevelId) -> Option<LocalState> {
        self.staged_public.shift_remove(level)
    }

    /// Run the natural action of `level`, appending influences to `out`.
    ///
    /// `public` is the environment's public local state, read from the
    /// level's consistent state.
    ///
    /// # Errors
    ///
    /// [`SimError::OutOfRange`] if no natural-action model or private state
    /// exists for `level`, or whatever the model returns.
    pub fn natural(
        &mut self,
        level: &LevelId,
        window: TimeWindow,
        states: &DynamicStateMap<'_>,
        public: &LocalState,
        out: &mut InfluenceMap,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), ModelError> {
        let model = self.natural.get(level).ok_or_else(|| {
            SimError::out_of_range(format!("no natural-action model for level {level}"))
        })?;
        let private = self.private.get_mut(level).ok_or_else(|| {
            SimError::out_of_range(format!("environment has no local state for level {level}"))
        })?;
        let mut ctx = NaturalContext::new(level, window, states, public, private, out, rng);
        model.natural(&mut ctx)
    }
}

fn check(level: &LevelId, state: &LocalState, visibility: Visibility) -> Result<(), SimError> {
    if state.owner() != Owner::Environment {
        return Err(SimError::invalid(format!(
            "local state owned by {} given to the environment",
            state.owner()
        )));
    }
    if state.level() != level {
        return Err(SimError::invalid(format!(
            "local state of level {} given for level {level}",
            state.level()
        )));
    }
    if state.visibility() != visibility {
        return Err(SimError::invalid(format!(
            "expected a {visibility:?} local state"
        )));
    }
    Ok(())
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("levels", &self.private.keys().collect::<Vec<_>>())
            .field("private", &self.private)
            .finish_non_exhaustive()
    }
}
