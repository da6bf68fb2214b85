//! Configuration document consumed by the bridging engine
//!
//! The document is produced by an outer layer (UI, file, command line) and
//! handed to the engine as a whole. Anything that changes wire behaviour
//! (addresses, ports, routing parameters) must be present; only cosmetic
//! simulation parameters fall back to the `DEFAULT_*` constants below.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;

use crate::{ConfigError, NodeId, ObjectId, ProtocolId, ProtocolRole, ProtocolType, RemoteObject};

/// Default OSC active-object polling interval
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 100;
/// Default number of simulated channels
pub const DEFAULT_SIMULATION_CHANNELS: u16 = 16;
/// Default number of simulated mapping areas
pub const DEFAULT_SIMULATION_MAPPINGS: u16 = 4;
/// Default simulation refresh interval
pub const DEFAULT_SIMULATION_REFRESH_MS: u64 = 50;

fn default_true() -> bool {
    true
}

fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

fn default_simulation_channels() -> u16 {
    DEFAULT_SIMULATION_CHANNELS
}

fn default_simulation_mappings() -> u16 {
    DEFAULT_SIMULATION_MAPPINGS
}

fn default_simulation_refresh() -> u64 {
    DEFAULT_SIMULATION_REFRESH_MS
}

/// Whole-engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Forward observer data to the logging target
    #[serde(default = "default_true")]
    pub logging_enabled: bool,
    /// Bridging nodes, keyed by their id
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logging_enabled: true,
            nodes: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Validate every node and the engine-wide id uniqueness
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut node_ids = HashSet::new();
        let mut protocol_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id) {
                return Err(ConfigError::DuplicateId {
                    kind: "node",
                    id: node.id.0,
                });
            }
            node.validate()?;
            for protocol in node.protocols() {
                if !protocol_ids.insert(protocol.id) {
                    return Err(ConfigError::DuplicateId {
                        kind: "protocol",
                        id: protocol.id.0,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Object data handling mode and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HandlingConfig {
    /// Forward everything to the opposite role
    Bypass,
    /// Forward A to B, drop B
    ForwardAOnly,
    /// Forward B to A, drop A
    ReverseBOnly,
    /// Merge single-axis X/Y from A into XY for B and split XY from B
    RemapPositionXyToXy,
    /// Channel multiplexing between protocol groups
    MuxChannels {
        a_channel_count: u16,
        b_channel_count: u16,
    },
    /// Channel multiplexing combined with the value change filter
    MuxChannelsWithFilter {
        a_channel_count: u16,
        b_channel_count: u16,
        precision: f32,
    },
    /// Only forward values that changed by at least `precision`
    ValueChangeFilter { precision: f32 },
    /// Act as a simulated device answering polls
    DeviceSimulation {
        #[serde(default = "default_simulation_channels")]
        channel_count: u16,
        #[serde(default = "default_simulation_mappings")]
        mapping_count: u16,
        #[serde(default = "default_simulation_refresh")]
        refresh_interval_ms: u64,
    },
}

impl Default for HandlingConfig {
    fn default() -> Self {
        HandlingConfig::Bypass
    }
}

impl HandlingConfig {
    /// Stable mode name
    pub fn mode_name(&self) -> &'static str {
        match self {
            HandlingConfig::Bypass => "bypass",
            HandlingConfig::ForwardAOnly => "forward_a_only",
            HandlingConfig::ReverseBOnly => "reverse_b_only",
            HandlingConfig::RemapPositionXyToXy => "remap_position_xy_to_xy",
            HandlingConfig::MuxChannels { .. } => "mux_channels",
            HandlingConfig::MuxChannelsWithFilter { .. } => "mux_channels_with_filter",
            HandlingConfig::ValueChangeFilter { .. } => "value_change_filter",
            HandlingConfig::DeviceSimulation { .. } => "device_simulation",
        }
    }

    pub fn validate(&self, context: &str) -> Result<(), ConfigError> {
        match self {
            HandlingConfig::MuxChannels {
                a_channel_count,
                b_channel_count,
            } => validate_channel_counts(context, *a_channel_count, *b_channel_count),
            HandlingConfig::MuxChannelsWithFilter {
                a_channel_count,
                b_channel_count,
                precision,
            } => {
                validate_channel_counts(context, *a_channel_count, *b_channel_count)?;
                validate_precision(context, *precision)
            }
            HandlingConfig::ValueChangeFilter { precision } => validate_precision(context, *precision),
            HandlingConfig::DeviceSimulation {
                channel_count,
                mapping_count,
                refresh_interval_ms,
            } => {
                if *channel_count == 0 {
                    return Err(ConfigError::invalid(context, "channel_count", "must be > 0"));
                }
                if *mapping_count == 0 {
                    return Err(ConfigError::invalid(context, "mapping_count", "must be > 0"));
                }
                if *refresh_interval_ms == 0 {
                    return Err(ConfigError::invalid(
                        context,
                        "refresh_interval_ms",
                        "must be > 0",
                    ));
                }
                Ok(())
            }
            HandlingConfig::Bypass
            | HandlingConfig::ForwardAOnly
            | HandlingConfig::ReverseBOnly
            | HandlingConfig::RemapPositionXyToXy => Ok(()),
        }
    }
}

fn validate_channel_counts(context: &str, a: u16, b: u16) -> Result<(), ConfigError> {
    if a == 0 {
        return Err(ConfigError::invalid(context, "a_channel_count", "must be > 0"));
    }
    if b == 0 {
        return Err(ConfigError::invalid(context, "b_channel_count", "must be > 0"));
    }
    Ok(())
}

fn validate_precision(context: &str, precision: f32) -> Result<(), ConfigError> {
    if !precision.is_finite() || precision < 0.0 {
        return Err(ConfigError::invalid(
            context,
            "precision",
            format!("{} is not a finite, non-negative number", precision),
        ));
    }
    Ok(())
}

/// One bridging node: a handling mode and its two protocol groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub handling: HandlingConfig,
    #[serde(default)]
    pub protocols_a: Vec<ProtocolConfig>,
    #[serde(default)]
    pub protocols_b: Vec<ProtocolConfig>,
}

impl NodeConfig {
    pub fn new(id: NodeId, handling: HandlingConfig) -> Self {
        Self {
            id,
            handling,
            protocols_a: Vec::new(),
            protocols_b: Vec::new(),
        }
    }

    /// Add a protocol to the list matching its role
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        match protocol.role {
            ProtocolRole::A => self.protocols_a.push(protocol),
            ProtocolRole::B => self.protocols_b.push(protocol),
        }
        self
    }

    /// All protocols, role A first, in configuration order
    pub fn protocols(&self) -> impl Iterator<Item = &ProtocolConfig> {
        self.protocols_a.iter().chain(self.protocols_b.iter())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let context = self.id.to_string();
        self.handling.validate(&context)?;

        let mut ids = HashSet::new();
        for (expected_role, list) in [
            (ProtocolRole::A, &self.protocols_a),
            (ProtocolRole::B, &self.protocols_b),
        ] {
            for protocol in list {
                if protocol.role != expected_role {
                    return Err(ConfigError::invalid(
                        protocol.id.to_string(),
                        "role",
                        format!("listed as role {} but declares role {}", expected_role, protocol.role),
                    ));
                }
                if !ids.insert(protocol.id) {
                    return Err(ConfigError::DuplicateId {
                        kind: "protocol",
                        id: protocol.id.0,
                    });
                }
                protocol.validate()?;
            }
        }
        Ok(())
    }
}

/// One protocol processor's connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub id: ProtocolId,
    pub role: ProtocolRole,
    #[serde(rename = "type")]
    pub protocol_type: ProtocolType,
    /// Peer address: send target and accepted sender
    #[serde(default)]
    pub ip_address: Option<IpAddr>,
    /// Port messages are sent to on the peer
    #[serde(default)]
    pub client_port: Option<u16>,
    /// Local port messages are received on
    #[serde(default)]
    pub host_port: Option<u16>,
    /// Interval for polling active objects
    #[serde(default = "default_polling_interval")]
    pub polling_interval_ms: u64,
    /// Objects this processor actively polls
    #[serde(default)]
    pub active_objects: Vec<RemoteObject>,
    /// Channels whose inbound messages are dropped before reaching the node
    #[serde(default)]
    pub muted_channels: BTreeSet<i32>,
    /// MIDI input device name (substring match); first device when absent
    #[serde(default)]
    pub input_device: Option<String>,
}

impl ProtocolConfig {
    fn bare(id: ProtocolId, role: ProtocolRole, protocol_type: ProtocolType) -> Self {
        Self {
            id,
            role,
            protocol_type,
            ip_address: None,
            client_port: None,
            host_port: None,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            active_objects: Vec::new(),
            muted_channels: BTreeSet::new(),
            input_device: None,
        }
    }

    pub fn osc(
        id: ProtocolId,
        role: ProtocolRole,
        ip_address: IpAddr,
        client_port: u16,
        host_port: u16,
    ) -> Self {
        Self {
            ip_address: Some(ip_address),
            client_port: Some(client_port),
            host_port: Some(host_port),
            ..Self::bare(id, role, ProtocolType::Osc)
        }
    }

    pub fn rttrpm(id: ProtocolId, role: ProtocolRole, host_port: u16) -> Self {
        Self {
            host_port: Some(host_port),
            ..Self::bare(id, role, ProtocolType::Rttrpm)
        }
    }

    pub fn midi(id: ProtocolId, role: ProtocolRole, input_device: Option<String>) -> Self {
        Self {
            input_device,
            ..Self::bare(id, role, ProtocolType::Midi)
        }
    }

    pub fn device_control(id: ProtocolId, role: ProtocolRole) -> Self {
        Self::bare(id, role, ProtocolType::DeviceControl)
    }

    pub fn with_active_objects(mut self, objects: Vec<RemoteObject>) -> Self {
        self.active_objects = objects;
        self
    }

    pub fn with_muted_channels<I: IntoIterator<Item = i32>>(mut self, channels: I) -> Self {
        self.muted_channels = channels.into_iter().collect();
        self
    }

    pub fn with_polling_interval(mut self, interval_ms: u64) -> Self {
        self.polling_interval_ms = interval_ms;
        self
    }

    pub fn is_muted(&self, channel: i32) -> bool {
        self.muted_channels.contains(&channel)
    }

    /// Check the fields the protocol type needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let context = self.id.to_string();
        match self.protocol_type {
            ProtocolType::Osc => {
                if self.ip_address.is_none() {
                    return Err(ConfigError::missing(context, "ip_address"));
                }
                match self.client_port {
                    None => return Err(ConfigError::missing(context, "client_port")),
                    Some(0) => {
                        return Err(ConfigError::invalid(context, "client_port", "must be > 0"))
                    }
                    Some(_) => {}
                }
                if self.host_port.is_none() {
                    return Err(ConfigError::missing(context, "host_port"));
                }
                if !self.active_objects.is_empty() && self.polling_interval_ms == 0 {
                    return Err(ConfigError::invalid(
                        context,
                        "polling_interval_ms",
                        "must be > 0 when active objects are configured",
                    ));
                }
                for object in &self.active_objects {
                    validate_active_object(&context, object)?;
                }
            }
            ProtocolType::Rttrpm => {
                if self.host_port.is_none() {
                    return Err(ConfigError::missing(context, "host_port"));
                }
            }
            ProtocolType::Midi | ProtocolType::DeviceControl => {}
        }
        Ok(())
    }
}

fn validate_active_object(context: &str, object: &RemoteObject) -> Result<(), ConfigError> {
    let unsupported = || ConfigError::UnsupportedObject {
        context: context.to_string(),
        object: object.id.to_string(),
    };
    if matches!(object.id, ObjectId::HeartbeatPong) {
        return Err(unsupported());
    }
    if object.id.needs_channel() && !object.addressing.has_channel() {
        return Err(unsupported());
    }
    if object.id.needs_record() && !object.addressing.has_record() {
        return Err(unsupported());
    }
    Ok(())
}
