//! Remote Protocol Bridge core
//!
//! Core types shared by every bridging component:
//! - Identifiers ([`NodeId`], [`ProtocolId`]) and the explicit [`IdAllocator`]
//! - The remote object catalogue ([`ObjectId`]) and its addressing ([`Addressing`])
//! - The canonical message envelope ([`MessageData`])
//! - The configuration document consumed by the engine ([`EngineConfig`])

pub mod config;
pub mod error;
pub mod id;
pub mod message;
pub mod object;
pub mod types;

pub use config::{
    EngineConfig, HandlingConfig, NodeConfig, ProtocolConfig, DEFAULT_POLLING_INTERVAL_MS,
    DEFAULT_SIMULATION_CHANNELS, DEFAULT_SIMULATION_MAPPINGS, DEFAULT_SIMULATION_REFRESH_MS,
};
pub use error::{ConfigError, Error, Result};
pub use id::IdAllocator;
pub use message::{MessageData, ValueType};
pub use object::{ObjectId, RemoteObject};
pub use types::{Addressing, NodeId, ProtocolId, ProtocolRole, ProtocolType};
