#![deny(missing_docs)]
//! Client-side runtime for the Teneo authenticated agent coordination protocol.
//!
//! Most callers only need [`TeneoClient`]: construct it from a [`TeneoConfig`], call
//! [`TeneoClient::connect`], then drive it through the message/room/agent/webhook
//! surface. The submodules below implement the pieces the client composes and are
//! exposed for callers who need finer-grained control (e.g. supplying a pre-built
//! [`SecureSecret`]).

mod backoff;
mod circuit;
mod config;
mod dedup;
mod events;
mod facade;
mod handlers;
mod pending;
mod queue;
mod ratelimit;
mod registry;
mod secret;
mod signer;
mod ssrf;
mod transport;
mod webhook;

pub use config::{SecretSource, TeneoConfig};
pub use events::ListenerId;
pub use facade::{DirectCommand, SendMessageOptions, TeneoClient};
pub use registry::{AgentRegistry, RoomRegistry};
pub use secret::SecureSecret;
pub use ssrf::SsrfError;
pub use transport::SendOptions;

pub use teneo_types::*;
