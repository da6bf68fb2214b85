//! Identifiers, roles and addressing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bridging node identifier, allocated outside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Protocol processor identifier, unique within a running engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol#{}", self.0)
    }
}

/// The two sides of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolRole {
    A,
    B,
}

impl ProtocolRole {
    /// The role messages are forwarded to
    pub fn opposite(self) -> Self {
        match self {
            ProtocolRole::A => ProtocolRole::B,
            ProtocolRole::B => ProtocolRole::A,
        }
    }
}

impl fmt::Display for ProtocolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolRole::A => f.write_str("A"),
            ProtocolRole::B => f.write_str("B"),
        }
    }
}

/// Wire protocols a processor can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    /// Open Sound Control over UDP
    Osc,
    /// Real-Time Tracking Protocol (motion) over UDP
    Rttrpm,
    /// Hardware MIDI input
    Midi,
    /// Device-control placeholder without I/O
    DeviceControl,
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolType::Osc => "OSC",
            ProtocolType::Rttrpm => "RTTrPM",
            ProtocolType::Midi => "MIDI",
            ProtocolType::DeviceControl => "DeviceControl",
        };
        f.write_str(name)
    }
}

/// Channel / record pair disambiguating instances of one object kind.
///
/// `channel` is the source or channel index, `record` the mapping area or
/// record index. Either may be [`Addressing::INVALID`], meaning unaddressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Addressing {
    pub channel: i32,
    #[serde(default = "invalid_index")]
    pub record: i32,
}

fn invalid_index() -> i32 {
    Addressing::INVALID
}

impl Addressing {
    /// Sentinel for an unused index
    pub const INVALID: i32 = -1;

    /// Fully unaddressed object (device-wide values, heartbeat)
    pub const NONE: Addressing = Addressing {
        channel: Self::INVALID,
        record: Self::INVALID,
    };

    pub const fn new(channel: i32, record: i32) -> Self {
        Self { channel, record }
    }

    /// Channel-only addressing
    pub const fn channel(channel: i32) -> Self {
        Self {
            channel,
            record: Self::INVALID,
        }
    }

    pub const fn has_channel(&self) -> bool {
        self.channel != Self::INVALID
    }

    pub const fn has_record(&self) -> bool {
        self.record != Self::INVALID
    }

    /// Returns a copy with the channel replaced
    pub const fn with_channel(self, channel: i32) -> Self {
        Self {
            channel,
            record: self.record,
        }
    }
}

impl Default for Addressing {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.has_channel(), self.has_record()) {
            (true, true) => write!(f, "ch{}/rec{}", self.channel, self.record),
            (true, false) => write!(f, "ch{}", self.channel),
            (false, true) => write!(f, "rec{}", self.record),
            (false, false) => f.write_str("-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressing_sentinels() {
        assert!(!Addressing::NONE.has_channel());
        assert!(!Addressing::NONE.has_record());
        let addr = Addressing::new(3, 2);
        assert!(addr.has_channel() && addr.has_record());
        assert_eq!(Addressing::channel(5).record, Addressing::INVALID);
    }

    #[test]
    fn test_addressing_ordering() {
        let mut addrs = vec![
            Addressing::new(2, 1),
            Addressing::new(1, 2),
            Addressing::new(1, 1),
        ];
        addrs.sort();
        assert_eq!(
            addrs,
            vec![
                Addressing::new(1, 1),
                Addressing::new(1, 2),
                Addressing::new(2, 1)
            ]
        );
    }

    #[test]
    fn test_role_opposite() {
        assert_eq!(ProtocolRole::A.opposite(), ProtocolRole::B);
        assert_eq!(ProtocolRole::B.opposite(), ProtocolRole::A);
    }
}
