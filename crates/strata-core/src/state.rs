//! Local, global and perceived state carriers.
//!
//! A [`LocalState`] belongs to one (owner, level) pair and is either
//! public (observable by others at that level) or private. The owner is
//! recorded as an [`Owner`] value rather than a reference, which keeps the
//! agent/local-state graph acyclic.

use std::fmt;

use crate::id::{AgentId, LevelId};
use crate::payload::Payload;
use crate::time::TimeWindow;

/// Who a local state belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    /// The simulation's single environment.
    Environment,
    /// An agent.
    Agent(AgentId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::Agent(id) => write!(f, "{id}"),
        }
    }
}

/// Whether a local state is observable by other participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Stored in the level's consistent state, readable by everyone.
    Public,
    /// Held by its owner only.
    Private,
}

/// State of one owner at one level.
#[derive(Clone, Debug)]
pub struct LocalState {
    owner: Owner,
    level: LevelId,
    visibility: Visibility,
    data: Payload,
}

impl LocalState {
    /// Create a local state.
    pub fn new(owner: Owner, level: LevelId, visibility: Visibility, data: Payload) -> Self {
        Self {
            owner,
            level,
            visibility,
            data,
        }
    }

    /// Public local state of an agent.
    pub fn public_of_agent(agent: AgentId, level: LevelId, data: Payload) -> Self {
        Self::new(Owner::Agent(agent), level, Visibility::Public, data)
    }

    /// Private local state of an agent.
    pub fn private_of_agent(agent: AgentId, level: LevelId, data: Payload) -> Self {
        Self::new(Owner::Agent(agent), level, Visibility::Private, data)
    }

    /// Public local state of the environment.
    pub fn public_of_environment(level: LevelId, data: Payload) -> Self {
        Self::new(Owner::Environment, level, Visibility::Public, data)
    }

    /// Private local state of the environment.
    pub fn private_of_environment(level: LevelId, data: Payload) -> Self {
        Self::new(Owner::Environment, level, Visibility::Private, data)
    }

    /// The owner.
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// The owning agent, if any.
    pub fn agent(&self) -> Option<AgentId> {
        match self.owner {
            Owner::Agent(id) => Some(id),
            Owner::Environment => None,
        }
    }

    /// Whether the state belongs to `agent`.
    pub fn is_owned_by(&self, agent: AgentId) -> bool {
        self.owner == Owner::Agent(agent)
    }

    /// The level this state describes.
    pub fn level(&self) -> &LevelId {
        &self.level
    }

    /// Public or private.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the state is public.
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// The carried data.
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Mutable access to the carried data.
    pub fn data_mut(&mut self) -> &mut Payload {
        &mut self.data
    }

    /// Borrow the data as a `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Mutably borrow the data as a `T`.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut::<T>()
    }
}

/// Level-independent memory of an agent.
#[derive(Clone, Debug, Default)]
pub struct GlobalState {
    data: Payload,
}

impl GlobalState {
    /// Create a global state.
    pub fn new(data: Payload) -> Self {
        Self { data }
    }

    /// The carried data.
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Mutable access to the carried data.
    pub fn data_mut(&mut self) -> &mut Payload {
        &mut self.data
    }

    /// Borrow the data as a `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Mutably borrow the data as a `T`.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut::<T>()
    }
}

/// What one agent perceived at one level during one window.
#[derive(Clone, Debug)]
pub struct PerceivedData {
    level: LevelId,
    window: TimeWindow,
    data: Payload,
}

impl PerceivedData {
    /// Create perceived data.
    pub fn new(level: LevelId, window: TimeWindow, data: Payload) -> Self {
        Self {
            level,
            window,
            data,
        }
    }

    /// Perceived data carrying nothing.
    pub fn empty(level: LevelId, window: TimeWindow) -> Self {
        Self::new(level, window, Payload::empty())
    }

    /// The level perceived.
    pub fn level(&self) -> &LevelId {
        &self.level
    }

    /// The perception window.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Whether nothing was perceived.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The carried data.
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Borrow the data as a `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeStamp;

    #[test]
    fn ownership_is_integer_equality() {
        let a = AgentId::next();
        let b = AgentId::next();
        let level = LevelId::new("L").unwrap();
        let ls = LocalState::public_of_agent(a, level, Payload::new(1u8));
        assert!(ls.is_owned_by(a));
        assert!(!ls.is_owned_by(b));
        assert_eq!(ls.agent(), Some(a));
        assert!(ls.is_public());
    }

    #[test]
    fn environment_state_has_no_agent() {
        let ls = LocalState::private_of_environment(LevelId::new("L").unwrap(), Payload::empty());
        assert_eq!(ls.owner(), Owner::Environment);
        assert_eq!(ls.agent(), None);
        assert_eq!(ls.visibility(), Visibility::Private);
    }

    #[test]
    fn empty_perceived_data() {
        let window = TimeWindow::new(TimeStamp::new(0), TimeStamp::new(2)).unwrap();
        let pd = PerceivedData::empty(LevelId::new("L").unwrap(), window);
        assert!(pd.is_empty());
        assert_eq!(pd.window(), window);
    }
}
