//! Engine error types

use rpb_bridge::BridgeError;
use rpb_core::{ConfigError, NodeId, ProtocolId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown protocol: {0}")]
    UnknownProtocol(ProtocolId),

    #[error("{0} has no role A protocol")]
    NoRoleAProtocol(NodeId),

    #[error("failed to start {protocol}: {source}")]
    StartFailed {
        protocol: ProtocolId,
        #[source]
        source: BridgeError,
    },

    #[error("nodes failed: {0:?}")]
    NodesFailed(Vec<NodeId>),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("routing error: {0}")]
    Routing(String),
}
