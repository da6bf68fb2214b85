//! Processor and listener traits

use rpb_core::{MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole, ProtocolType};

use crate::rttrpm::RttrpmPacket;
use crate::Result;

/// Receiver of decoded inbound traffic, implemented by the owning node.
///
/// Called synchronously on the processor's receive thread. Implementations
/// must return quickly and never block on I/O.
pub trait ProtocolListener: Send + Sync {
    /// One decoded message from `source`
    fn on_message(&self, source: ProtocolId, object: ObjectId, data: MessageData);

    /// One decoded motion tracking datagram from `source`, delivered once per
    /// datagram; the listener translates the modules it understands.
    fn on_tracking_packet(&self, source: ProtocolId, packet: &RttrpmPacket);
}

/// One protocol endpoint of one role
pub trait ProtocolProcessor: Send + Sync {
    fn id(&self) -> ProtocolId;

    fn role(&self) -> ProtocolRole;

    fn protocol_type(&self) -> ProtocolType;

    /// Currently applied configuration
    fn config(&self) -> &ProtocolConfig;

    /// Validate and apply a new configuration.
    ///
    /// Rejected configurations leave the previous one in place. A running
    /// processor keeps its open endpoint until the next restart.
    fn apply_config(&mut self, config: &ProtocolConfig) -> Result<()>;

    /// Open the endpoint and start receiving; on failure nothing stays open
    fn start(&self) -> Result<()>;

    /// Release the endpoint and join the receive thread; safe to repeat
    fn stop(&self) -> Result<()>;

    /// Encode and transmit one object value
    fn send(&self, object: ObjectId, data: &MessageData) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// Shared checks for `apply_config` implementations
pub(crate) fn check_config(
    current: &ProtocolConfig,
    next: &ProtocolConfig,
) -> std::result::Result<(), rpb_core::ConfigError> {
    if next.id != current.id {
        return Err(rpb_core::ConfigError::invalid(
            current.id.to_string(),
            "id",
            format!("cannot change to {}", next.id),
        ));
    }
    if next.protocol_type != current.protocol_type {
        return Err(rpb_core::ConfigError::invalid(
            current.id.to_string(),
            "type",
            format!("cannot change {} to {}", current.protocol_type, next.protocol_type),
        ));
    }
    next.validate()
}
