//! Closed set of protocol processors

use rpb_core::{MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole, ProtocolType};
use std::sync::Weak;

use crate::{
    DeviceControlProcessor, MidiProcessor, ProtocolListener, ProtocolProcessor, Result,
    RttrpmProcessor,
};

#[cfg(not(feature = "osc"))]
use crate::BridgeError;
#[cfg(feature = "osc")]
use crate::OscProcessor;

/// Any processor a node can own
pub enum Processor {
    #[cfg(feature = "osc")]
    Osc(OscProcessor),
    Rttrpm(RttrpmProcessor),
    Midi(MidiProcessor),
    DeviceControl(DeviceControlProcessor),
}

impl Processor {
    /// Build the processor for `config.protocol_type`
    pub fn from_config(config: &ProtocolConfig, listener: Weak<dyn ProtocolListener>) -> Result<Self> {
        let processor = match config.protocol_type {
            #[cfg(feature = "osc")]
            ProtocolType::Osc => Processor::Osc(OscProcessor::new(config.clone(), listener)?),
            #[cfg(not(feature = "osc"))]
            ProtocolType::Osc => {
                return Err(BridgeError::Unsupported("built without OSC support".into()))
            }
            ProtocolType::Rttrpm => {
                Processor::Rttrpm(RttrpmProcessor::new(config.clone(), listener)?)
            }
            ProtocolType::Midi => Processor::Midi(MidiProcessor::new(config.clone())?),
            ProtocolType::DeviceControl => {
                Processor::DeviceControl(DeviceControlProcessor::new(config.clone())?)
            }
        };
        Ok(processor)
    }

    fn inner(&self) -> &dyn ProtocolProcessor {
        match self {
            #[cfg(feature = "osc")]
            Processor::Osc(p) => p,
            Processor::Rttrpm(p) => p,
            Processor::Midi(p) => p,
            Processor::DeviceControl(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ProtocolProcessor {
        match self {
            #[cfg(feature = "osc")]
            Processor::Osc(p) => p,
            Processor::Rttrpm(p) => p,
            Processor::Midi(p) => p,
            Processor::DeviceControl(p) => p,
        }
    }
}

impl ProtocolProcessor for Processor {
    fn id(&self) -> ProtocolId {
        self.inner().id()
    }

    fn role(&self) -> ProtocolRole {
        self.inner().role()
    }

    fn protocol_type(&self) -> ProtocolType {
        self.inner().protocol_type()
    }

    fn config(&self) -> &ProtocolConfig {
        self.inner().config()
    }

    fn apply_config(&mut self, config: &ProtocolConfig) -> Result<()> {
        self.inner_mut().apply_config(config)
    }

    fn start(&self) -> Result<()> {
        self.inner().start()
    }

    fn stop(&self) -> Result<()> {
        self.inner().stop()
    }

    fn send(&self, object: ObjectId, data: &MessageData) -> Result<()> {
        self.inner().send(object, data)
    }

    fn is_running(&self) -> bool {
        self.inner().is_running()
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("id", &self.id())
            .field("type", &self.protocol_type())
            .field("role", &self.role())
            .field("running", &self.is_running())
            .finish()
    }
}
