//! Device-control protocol stub
//!
//! Accepts configuration and lifecycle calls without opening any endpoint.
//! Messages sent while running are accepted and discarded.

use rpb_core::{ConfigError, MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole, ProtocolType};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::traits::check_config;
use crate::{BridgeError, ProtocolProcessor, Result};

pub struct DeviceControlProcessor {
    config: ProtocolConfig,
    running: AtomicBool,
}

impl DeviceControlProcessor {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        if config.protocol_type != ProtocolType::DeviceControl {
            return Err(BridgeError::Config(ConfigError::invalid(
                config.id.to_string(),
                "type",
                format!("expected device control, got {}", config.protocol_type),
            )));
        }
        Ok(Self {
            config,
            running: AtomicBool::new(false),
        })
    }
}

impl ProtocolProcessor for DeviceControlProcessor {
    fn id(&self) -> ProtocolId {
        self.config.id
    }

    fn role(&self) -> ProtocolRole {
        self.config.role
    }

    fn protocol_type(&self) -> ProtocolType {
        ProtocolType::DeviceControl
    }

    fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn apply_config(&mut self, config: &ProtocolConfig) -> Result<()> {
        check_config(&self.config, config)?;
        self.config = config.clone();
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::AlreadyRunning);
        }
        info!("{}: device control started", self.config.id);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("{}: device control stopped", self.config.id);
        }
        Ok(())
    }

    fn send(&self, object: ObjectId, data: &MessageData) -> Result<()> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        debug!("{}: discarding {} {}", self.config.id, object, data);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpb_core::Addressing;

    #[test]
    fn test_lifecycle_and_send() {
        let processor =
            DeviceControlProcessor::new(ProtocolConfig::device_control(ProtocolId(9), ProtocolRole::B))
                .unwrap();
        let data = MessageData::from_floats(Addressing::channel(1), &[0.5]);

        assert!(matches!(
            processor.send(ObjectId::MatrixInputGain, &data),
            Err(BridgeError::NotRunning)
        ));
        processor.start().unwrap();
        assert!(matches!(processor.start(), Err(BridgeError::AlreadyRunning)));
        assert!(processor.send(ObjectId::MatrixInputGain, &data).is_ok());
        processor.stop().unwrap();
        processor.stop().unwrap();
        assert!(!processor.is_running());
    }

    #[test]
    fn test_type_change_rejected() {
        let mut processor =
            DeviceControlProcessor::new(ProtocolConfig::device_control(ProtocolId(9), ProtocolRole::B))
                .unwrap();
        let other = ProtocolConfig::midi(ProtocolId(9), ProtocolRole::B, None);
        assert!(processor.apply_config(&other).is_err());
        assert_eq!(processor.config().protocol_type, ProtocolType::DeviceControl);
    }
}
