//! Strongly-typed identifiers: levels, agent categories and agent instances.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::SimError;

/// Identifies a simulation level.
///
/// String-keyed and immutable. Cloning is cheap (the name is shared).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LevelId(Arc<str>);

impl LevelId {
    /// Create a level identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if `name` is empty.
    pub fn new(name: impl AsRef<str>) -> Result<Self, SimError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(SimError::invalid("level identifier must not be empty"));
        }
        Ok(Self(Arc::from(name)))
    }

    /// The identifier's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag describing the kind of an agent.
///
/// A category may declare parent categories; [`is_a`](AgentCategory::is_a)
/// follows them transitively. Equality, ordering and hashing only look at
/// the name.
#[derive(Clone)]
pub struct AgentCategory {
    name: Arc<str>,
    parents: Arc<SmallVec<[AgentCategory; 2]>>,
}

impl AgentCategory {
    /// Create a root category.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if `name` is empty.
    pub fn new(name: impl AsRef<str>) -> Result<Self, SimError> {
        Self::with_parents(name, [])
    }

    /// Create a category inheriting from `parents`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidArgument`] if `name` is empty.
    pub fn with_parents(
        name: impl AsRef<str>,
        parents: impl IntoIterator<Item = AgentCategory>,
    ) -> Result<Self, SimError> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(SimError::invalid("agent category must not be empty"));
        }
        Ok(Self {
            name: Arc::from(name),
            parents: Arc::new(parents.into_iter().collect()),
        })
    }

    /// The category's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct parents of this category.
    pub fn parents(&self) -> &[AgentCategory] {
        &self.parents
    }

    /// Whether this category is `other` or inherits from it.
    pub fn is_a(&self, other: &AgentCategory) -> bool {
        self == other || self.parents.iter().any(|p| p.is_a(other))
    }
}

impl PartialEq for AgentCategory {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AgentCategory {}

impl Hash for AgentCategory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for AgentCategory {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgentCategory {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Debug for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AgentCategory").field(&self.name).finish()
    }
}

impl fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Counter for unique [`AgentId`] allocation.
static AGENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for an agent.
///
/// Local states refer to their owner through this id instead of holding a
/// reference, so ownership checks are integer comparisons. Cloning an
/// agent (or a whole engine) preserves its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u64);

impl AgentId {
    /// Allocate a fresh, unique agent id. Thread-safe.
    pub fn next() -> Self {
        Self(AGENT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value of this id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_level_id_rejected() {
        assert!(matches!(
            LevelId::new(""),
            Err(SimError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn level_ids_order_by_name() {
        let a = LevelId::new("alpha").unwrap();
        let b = LevelId::new("beta").unwrap();
        assert!(a < b);
        assert_eq!(a, LevelId::new("alpha").unwrap());
    }

    #[test]
    fn category_is_a_is_transitive() {
        let animal = AgentCategory::new("animal").unwrap();
        let prey = AgentCategory::with_parents("prey", [animal.clone()]).unwrap();
        let sheep = AgentCategory::with_parents("sheep", [prey.clone()]).unwrap();
        assert!(sheep.is_a(&animal));
        assert!(sheep.is_a(&prey));
        assert!(!animal.is_a(&sheep));
    }

    #[test]
    fn category_equality_ignores_parents() {
        let root = AgentCategory::new("wolf").unwrap();
        let derived =
            AgentCategory::with_parents("wolf", [AgentCategory::new("animal").unwrap()]).unwrap();
        assert_eq!(root, derived);
    }

    #[test]
    fn agent_ids_are_unique() {
        let a = AgentId::next();
        let b = AgentId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
