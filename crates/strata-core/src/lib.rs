//! Core types for the Strata simulation framework.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! value types shared by every other crate in the workspace: level and
//! agent identifiers, time stamps, the error taxonomy, opaque payloads,
//! and the local/global/perceived state carriers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod payload;
pub mod state;
pub mod time;

pub use error::{ModelError, SimError};
pub use id::{AgentCategory, AgentId, LevelId};
pub use payload::{Datum, Payload};
pub use state::{GlobalState, LocalState, Owner, PerceivedData, Visibility};
pub use time::{TimeStamp, TimeWindow};
