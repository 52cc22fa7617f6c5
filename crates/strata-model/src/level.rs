//! Levels: sub-simulations with their own clock and reaction model.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use strata_core::{LevelId, SimError, TimeStamp};

use crate::dynamic::{ConsistentState, DynamicStateView, TransitoryState};
use crate::reaction::ReactionModel;
use crate::time_model::TimeModel;

/// A simulation level.
///
/// Owns the level's dynamic state: the last consistent state wrapped in
/// the current transitory state. A level always perceives and influences
/// itself; other levels are added with
/// [`add_perceptible_level`](Self::add_perceptible_level) and
/// [`add_influenceable_level`](Self::add_influenceable_level).
#[derive(Clone)]
pub struct Level {
    id: LevelId,
    time_model: Arc<dyn TimeModel>,
    reaction: Arc<dyn ReactionModel>,
    perceptible: IndexSet<LevelId>,
    influenceable: IndexSet<LevelId>,
    state: TransitoryState,
}

impl Level {
    /// Create a level whose first consistent state is at `initial_time`.
    pub fn new(
        id: LevelId,
        initial_time: TimeStamp,
        time_model: Arc<dyn TimeModel>,
        reaction: Arc<dyn ReactionModel>,
    ) -> Self {
        let mut perceptible = IndexSet::new();
        perceptible.insert(id.clone());
        let influenceable = perceptible.clone();
        let state = TransitoryState::new(ConsistentState::new(id.clone(), initial_time));
        Self {
            id,
            time_model,
            reaction,
            perceptible,
            influenceable,
            state,
        }
    }

    /// The level's identifier.
    pub fn id(&self) -> &LevelId {
        &self.id
    }

    /// The time following `current` on this level's clock.
    pub fn next_time(&self, current: TimeStamp) -> Result<TimeStamp, SimError> {
        self.time_model.next_time(current)
    }

    /// The time model.
    pub fn time_model(&self) -> &Arc<dyn TimeModel> {
        &self.time_model
    }

    /// The reaction model.
    pub fn reaction_model(&self) -> &Arc<dyn ReactionModel> {
        &self.reaction
    }

    /// Let agents of this level perceive `level`.
    pub fn add_perceptible_level(&mut self, level: LevelId) {
        self.perceptible.insert(level);
    }

    /// Let agents of this level influence `level`.
    pub fn add_influenceable_level(&mut self, level: LevelId) {
        self.influenceable.insert(level);
    }

    /// Levels perceptible from this one, itself first.
    pub fn perceptible_levels(&self) -> &IndexSet<LevelId> {
        &self.perceptible
    }

    /// Levels influenceable from this one, itself first.
    pub fn influenceable_levels(&self) -> &IndexSet<LevelId> {
        &self.influenceable
    }

    /// Whether decisions at this level may target `level`.
    pub fn can_influence(&self, level: &LevelId) -> bool {
        self.influenceable.contains(level)
    }

    /// The last consistent state.
    pub fn consistent_state(&self) -> &ConsistentState {
        self.state.last_consistent_state()
    }

    /// Mutable access to the last consistent state.
    pub fn consistent_state_mut(&mut self) -> &mut ConsistentState {
        self.state.last_consistent_state_mut()
    }

    /// The current transitory state.
    pub fn transitory_state(&self) -> &TransitoryState {
        &self.state
    }

    /// Mutable access to the current transitory state.
    pub fn transitory_state_mut(&mut self) -> &mut TransitoryState {
        &mut self.state
    }

    /// The level as seen at `current`: consistent if it reacted at
    /// `current`, transitory otherwise.
    pub fn view_at(&self, current: TimeStamp) -> DynamicStateView<'_> {
        if self.state.time_lower_bound() == current {
            DynamicStateView::Consistent(self.state.last_consistent_state())
        } else {
            DynamicStateView::Transitory(&self.state)
        }
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("id", &self.id)
            .field("time_model", &self.time_model)
            .field("perceptible", &self.perceptible)
            .field("influenceable", &self.influenceable)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::PassiveReactionModel;
    use crate::time_model::PeriodicTimeModel;

    fn level(name: &str, period: i64) -> Level {
        Level::new(
            LevelId::new(name).unwrap(),
            TimeStamp::new(0),
            Arc::new(PeriodicTimeModel::new(period, 0, TimeStamp::new(0)).unwrap()),
            Arc::new(PassiveReactionModel),
        )
    }

    #[test]
    fn level_neighbourhood_contains_itself() {
        let mut l = level("L", 1);
        assert!(l.can_influence(&LevelId::new("L").unwrap()));
        assert!(!l.can_influence(&LevelId::new("M").unwrap()));
        l.add_influenceable_level(LevelId::new("M").unwrap());
        assert!(l.can_influence(&LevelId::new("M").unwrap()));
        assert_eq!(l.perceptible_levels().len(), 1);
    }

    #[test]
    fn next_time_delegates_to_time_model() {
        let l = level("L", 3);
        assert_eq!(l.next_time(TimeStamp::new(6)).unwrap(), TimeStamp::new(9));
    }

    #[test]
    fn view_is_consistent_only_at_reaction_time() {
        let mut l = level("L", 3);
        assert!(l.view_at(TimeStamp::new(0)).is_consistent());
        l.transitory_state_mut()
            .set_time_upper_bound(TimeStamp::new(3))
            .unwrap();
        assert!(!l.view_at(TimeStamp::new(1)).is_consistent());
        assert_eq!(
            l.view_at(TimeStamp::new(1)).time_upper_bound(),
            Some(TimeStamp::new(3))
        );
    }
}
