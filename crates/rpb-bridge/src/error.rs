//! Bridge error types

use thiserror::Error;

use crate::rttrpm::RttrpmError;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("processor not running")]
    NotRunning,

    #[error("processor already running")]
    AlreadyRunning,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("send error: {0}")]
    Send(String),

    #[error("decode error: {0}")]
    Decode(#[from] RttrpmError),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("configuration error: {0}")]
    Config(#[from] rpb_core::ConfigError),

    #[error("message error: {0}")]
    Message(#[from] rpb_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
