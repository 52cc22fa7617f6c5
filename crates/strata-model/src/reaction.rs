//! Reaction models: how a level turns influences into its next state.

use std::sync::Arc;

use strata_core::{ModelError, TimeWindow};

use crate::dynamic::ConsistentState;
use crate::influence::Influence;
use crate::influence_map::InfluenceMap;

/// Applies a batch of influences to a level's consistent state.
///
/// Per tick the engine calls, in order:
///
/// 1. [`make_system_reaction`](Self::make_system_reaction) with
///    `happens_before_regular = true` and every queued system influence;
/// 2. [`make_regular_reaction`](Self::make_regular_reaction) with every
///    regular influence;
/// 3. [`make_system_reaction`](Self::make_system_reaction) with
///    `happens_before_regular = false` and the system influences emitted
///    by the first two passes for this level.
///
/// The structural effect of system influences (agents entering or leaving
/// the level) is applied by the engine just before each system pass, so
/// `state` already reflects it.
///
/// Every influence handed to a pass is consumed. To keep one for the next
/// tick, re-emit it into `out` targeting this level. Influences emitted for
/// another level are queued in that level's transitory state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use strata_core::{ModelError, TimeWindow};
/// use strata_model::{ConsistentState, Influence, InfluenceMap, ReactionModel};
///
/// /// Keeps every regular influence alive across ticks.
/// struct Persist;
///
/// impl ReactionModel for Persist {
///     fn make_regular_reaction(
///         &self,
///         _window: TimeWindow,
///         _state: &mut ConsistentState,
///         influences: &[Arc<Influence>],
///         out: &mut InfluenceMap,
///     ) -> Result<(), ModelError> {
///         for influence in influences {
///             out.add_shared(Arc::clone(influence));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait ReactionModel: Send + Sync {
    /// React to the regular influences of the tick.
    fn make_regular_reaction(
        &self,
        window: TimeWindow,
        state: &mut ConsistentState,
        influences: &[Arc<Influence>],
        out: &mut InfluenceMap,
    ) -> Result<(), ModelError>;

    /// React to system influences. The default does nothing beyond the
    /// structural effect already applied by the engine.
    fn make_system_reaction(
        &self,
        window: TimeWindow,
        state: &mut ConsistentState,
        influences: &[Arc<Influence>],
        happens_before_regular: bool,
        out: &mut InfluenceMap,
    ) -> Result<(), ModelError> {
        let _ = (window, state, influences, happens_before_regular, out);
        Ok(())
    }
}
