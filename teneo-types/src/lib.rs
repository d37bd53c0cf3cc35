#![deny(missing_docs)]
//! Wire types, typed events, and the error taxonomy shared by the Teneo client SDK.
//!
//! This crate groups together the strongly-typed values exchanged between a
//! [`teneo-sdk`](https://docs.rs/teneo-sdk) client and the remote coordinator, plus
//! the configuration records and events the SDK exposes to its callers. It contains
//! no networking and no async runtime dependency; it only defines data.

mod agent;
mod agent_response;
mod config;
mod error;
mod event;
mod message;
mod room;
mod state;
mod webhook;

pub use agent::{Agent, AgentStatus, Capability, Command};
pub use agent_response::AgentResponse;
pub use config::{
    BackoffStrategyKind, CacheConfig, ClientType, ReconnectConfig, ResponseFormat,
    ResponseFormatConfig, SignatureConfig, WebhookConfig,
};
pub use error::SdkError;
pub use event::Event;
pub use message::{
    AgentSelectedData, AuthInboundData, ChallengeData, Message, MessageType, SubscribeAckData,
};
pub use room::Room;
pub use state::{AuthState, ConnectionState, Health};
pub use webhook::{CircuitState, WebhookPayload, WebhookStatus};

/// Convenience alias used throughout the SDK.
pub type Result<T> = std::result::Result<T, SdkError>;
