//! In-memory catalogs kept in sync with authoritative server updates.

mod agent;
mod room;

pub use agent::AgentRegistry;
pub use room::RoomRegistry;
