//! Object data handling strategies
//!
//! A strategy decides where a message received by one of a node's processors
//! goes. Strategies are called on the receive threads of every processor of
//! their node at once, so all caches they keep are lock protected or sharded.

mod bypass;
mod filter;
mod mux;
mod remap;
mod simulation;

pub use bypass::{Bypass, Directional};
pub use filter::{ValueCache, ValueChangeFilter};
pub use mux::{filtered_mux_target, mux_target, MuxChannels, MuxChannelsWithFilter};
pub use remap::RemapPositionXy;
pub use simulation::{DeviceSimulation, SimulationGrid};

use parking_lot::{RwLock, RwLockReadGuard};
use rpb_core::{HandlingConfig, MessageData, ObjectId, ProtocolId, ProtocolRole};
use tracing::warn;

use crate::Result;

/// Sends a message through one of the node's processors
pub trait MessageRouter: Send + Sync {
    fn send_to(&self, destination: ProtocolId, object: ObjectId, data: &MessageData) -> Result<()>;
}

/// Ordered processor ids of each role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMembership {
    pub a: Vec<ProtocolId>,
    pub b: Vec<ProtocolId>,
}

impl RoleMembership {
    pub fn new(a: Vec<ProtocolId>, b: Vec<ProtocolId>) -> Self {
        Self { a, b }
    }

    pub fn members(&self, role: ProtocolRole) -> &[ProtocolId] {
        match role {
            ProtocolRole::A => &self.a,
            ProtocolRole::B => &self.b,
        }
    }

    /// Role and position of `id` within its role list
    pub fn locate(&self, id: ProtocolId) -> Option<(ProtocolRole, usize)> {
        if let Some(index) = self.a.iter().position(|p| *p == id) {
            return Some((ProtocolRole::A, index));
        }
        self.b
            .iter()
            .position(|p| *p == id)
            .map(|index| (ProtocolRole::B, index))
    }

    pub fn role_of(&self, id: ProtocolId) -> Option<ProtocolRole> {
        self.locate(id).map(|(role, _)| role)
    }
}

/// Membership shared between a node and its strategy
#[derive(Debug, Default)]
pub struct Roles(RwLock<RoleMembership>);

impl Roles {
    pub fn new(membership: RoleMembership) -> Self {
        Self(RwLock::new(membership))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RoleMembership> {
        self.0.read()
    }

    pub fn set(&self, membership: RoleMembership) {
        *self.0.write() = membership;
    }
}

/// Per-message routing decision of one handling mode
pub trait DataHandlingStrategy: Send + Sync {
    /// Mode name as written in configuration documents
    fn mode(&self) -> &'static str;

    /// Replace the role membership after the node was reconfigured
    fn set_membership(&self, membership: RoleMembership);

    /// Route one message; true when every send it attempted succeeded
    fn on_message(
        &self,
        router: &dyn MessageRouter,
        source: ProtocolId,
        object: ObjectId,
        data: &MessageData,
    ) -> bool;
}

/// Send `data` to every destination, attempting all of them
pub(crate) fn forward_all(
    router: &dyn MessageRouter,
    destinations: &[ProtocolId],
    object: ObjectId,
    data: &MessageData,
) -> bool {
    destinations.iter().fold(true, |ok, destination| {
        send_logged(router, *destination, object, data) && ok
    })
}

pub(crate) fn send_logged(
    router: &dyn MessageRouter,
    destination: ProtocolId,
    object: ObjectId,
    data: &MessageData,
) -> bool {
    match router.send_to(destination, object, data) {
        Ok(()) => true,
        Err(e) => {
            warn!("Forwarding {} to {} failed: {}", object, destination, e);
            false
        }
    }
}

/// The closed set of handling modes
pub enum ObjectDataHandling {
    Bypass(Bypass),
    ForwardAOnly(Directional),
    ReverseBOnly(Directional),
    RemapPositionXyToXy(RemapPositionXy),
    MuxChannels(MuxChannels),
    MuxChannelsWithFilter(MuxChannelsWithFilter),
    ValueChangeFilter(ValueChangeFilter),
    DeviceSimulation(DeviceSimulation),
}

impl ObjectDataHandling {
    /// Build the strategy for a validated handling configuration
    pub fn from_config(config: &HandlingConfig, membership: RoleMembership) -> Result<Self> {
        config.validate("handling")?;
        let strategy = match *config {
            HandlingConfig::Bypass => ObjectDataHandling::Bypass(Bypass::new(membership)),
            HandlingConfig::ForwardAOnly => {
                ObjectDataHandling::ForwardAOnly(Directional::new(ProtocolRole::A, membership))
            }
            HandlingConfig::ReverseBOnly => {
                ObjectDataHandling::ReverseBOnly(Directional::new(ProtocolRole::B, membership))
            }
            HandlingConfig::RemapPositionXyToXy => {
                ObjectDataHandling::RemapPositionXyToXy(RemapPositionXy::new(membership))
            }
            HandlingConfig::MuxChannels {
                a_channel_count,
                b_channel_count,
            } => ObjectDataHandling::MuxChannels(MuxChannels::new(
                a_channel_count,
                b_channel_count,
                membership,
            )),
            HandlingConfig::MuxChannelsWithFilter {
                a_channel_count,
                b_channel_count,
                precision,
            } => ObjectDataHandling::MuxChannelsWithFilter(MuxChannelsWithFilter::new(
                a_channel_count,
                b_channel_count,
                precision,
                membership,
            )),
            HandlingConfig::ValueChangeFilter { precision } => {
                ObjectDataHandling::ValueChangeFilter(ValueChangeFilter::new(precision, membership))
            }
            HandlingConfig::DeviceSimulation {
                channel_count,
                mapping_count,
                refresh_interval_ms,
            } => ObjectDataHandling::DeviceSimulation(DeviceSimulation::new(
                channel_count,
                mapping_count,
                refresh_interval_ms,
                membership,
            )?),
        };
        Ok(strategy)
    }

    fn inner(&self) -> &dyn DataHandlingStrategy {
        match self {
            ObjectDataHandling::Bypass(s) => s,
            ObjectDataHandling::ForwardAOnly(s) => s,
            ObjectDataHandling::ReverseBOnly(s) => s,
            ObjectDataHandling::RemapPositionXyToXy(s) => s,
            ObjectDataHandling::MuxChannels(s) => s,
            ObjectDataHandling::MuxChannelsWithFilter(s) => s,
            ObjectDataHandling::ValueChangeFilter(s) => s,
            ObjectDataHandling::DeviceSimulation(s) => s,
        }
    }
}

impl DataHandlingStrategy for ObjectDataHandling {
    fn mode(&self) -> &'static str {
        self.inner().mode()
    }

    fn set_membership(&self, membership: RoleMembership) {
        self.inner().set_membership(membership)
    }

    fn on_message(
        &self,
        router: &dyn MessageRouter,
        source: ProtocolId,
        object: ObjectId,
        data: &MessageData,
    ) -> bool {
        self.inner().on_message(router, source, object, data)
    }
}
