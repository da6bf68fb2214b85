//! Remote Protocol Bridge protocol layer
//!
//! Codecs and processors for every wire protocol the bridge speaks:
//! - OSC (Open Sound Control) over UDP
//! - RTTrPM (Real-Time Tracking Protocol, motion) over UDP
//! - MIDI hardware input (observability only)
//! - A device-control stub without I/O
//!
//! Each processor owns one endpoint, runs its own receive thread and pushes
//! decoded messages to its [`ProtocolListener`] on that thread.

pub mod device_control;
pub mod error;
pub mod midi;
pub mod processor;
pub mod rttrpm;
pub mod traits;
mod udp;

#[cfg(feature = "osc")]
pub mod osc;

pub use device_control::DeviceControlProcessor;
pub use error::{BridgeError, Result};
pub use midi::{MidiEvent, MidiProcessor};
pub use processor::Processor;
pub use rttrpm::{RttrpmError, RttrpmPacket, RttrpmProcessor};
pub use traits::{ProtocolListener, ProtocolProcessor};

#[cfg(feature = "osc")]
pub use osc::OscProcessor;

/// Poll timeout of every blocking receive loop
pub const RECV_POLL_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(100);
