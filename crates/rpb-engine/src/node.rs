//! Bridging node
//!
//! A node owns the processors of both roles and one handling strategy. The
//! processors call back into the node's shared core on their receive threads;
//! the core routes bridgeable objects through the strategy and queues every
//! message for the observer.

use parking_lot::{Mutex, RwLock};
use rpb_bridge::rttrpm::centroid_messages;
use rpb_bridge::{Processor, ProtocolListener, ProtocolProcessor, RttrpmPacket};
use rpb_core::{ConfigError, MessageData, NodeConfig, NodeId, ObjectId, ProtocolId, ProtocolRole};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

use crate::handling::{DataHandlingStrategy, MessageRouter, ObjectDataHandling, RoleMembership};
use crate::observer::{NodeDataSink, ObservedMessage, ObserverQueue, DEFAULT_OBSERVER_CAPACITY};
use crate::{EngineError, Result};

fn membership_of(config: &NodeConfig) -> RoleMembership {
    RoleMembership::new(
        config.protocols_a.iter().map(|p| p.id).collect(),
        config.protocols_b.iter().map(|p| p.id).collect(),
    )
}

/// State shared with the receive threads
struct NodeCore {
    id: NodeId,
    processors: RwLock<BTreeMap<ProtocolId, Processor>>,
    strategy: RwLock<ObjectDataHandling>,
    running: AtomicBool,
    observer: ObserverQueue,
}

impl NodeCore {
    fn dispatch(&self, source: ProtocolId, object: ObjectId, data: MessageData) {
        if object.is_bridgeable() {
            let routed = self.strategy.read().on_message(self, source, object, &data);
            if !routed {
                debug!("{}: {} {} from {} not fully routed", self.id, object, data.addressing(), source);
            }
        }

        let protocol_type = self.processors.read().get(&source).map(|p| p.protocol_type());
        match protocol_type {
            Some(protocol_type) => {
                self.observer.push(ObservedMessage {
                    node: self.id,
                    protocol: source,
                    protocol_type,
                    object,
                    data,
                });
            }
            None => warn!("{}: message from unknown protocol {}", self.id, source),
        }
    }
}

impl ProtocolListener for NodeCore {
    fn on_message(&self, source: ProtocolId, object: ObjectId, data: MessageData) {
        self.dispatch(source, object, data);
    }

    fn on_tracking_packet(&self, source: ProtocolId, packet: &RttrpmPacket) {
        trace!(
            "{}: tracking packet {} from {} ({} trackables)",
            self.id,
            packet.header.packet_id,
            source,
            packet.trackables.len()
        );
        let muted = self
            .processors
            .read()
            .get(&source)
            .map(|p| p.config().muted_channels.clone())
            .unwrap_or_default();
        for (object, data) in centroid_messages(packet) {
            if muted.contains(&data.addressing().channel) {
                trace!("{}: channel {} muted, dropping {}", self.id, data.addressing().channel, object);
                continue;
            }
            self.dispatch(source, object, data);
        }
    }
}

impl MessageRouter for NodeCore {
    fn send_to(&self, destination: ProtocolId, object: ObjectId, data: &MessageData) -> Result<()> {
        let processors = self.processors.read();
        let processor = processors
            .get(&destination)
            .ok_or(EngineError::UnknownProtocol(destination))?;
        processor.send(object, data)?;
        Ok(())
    }
}

/// One bridge between a role A and a role B protocol group
pub struct Node {
    id: NodeId,
    core: Arc<NodeCore>,
    config: RwLock<NodeConfig>,
    /// Serializes start, stop and reconfiguration
    lifecycle: Mutex<()>,
}

impl Node {
    /// Create a stopped node for `config`, reporting observed traffic to `sink`
    pub fn new(config: &NodeConfig, sink: Arc<dyn NodeDataSink>) -> Result<Self> {
        config.validate()?;
        let strategy = ObjectDataHandling::from_config(&config.handling, RoleMembership::default())?;
        let observer = ObserverQueue::spawn(
            format!("rpb-observer-{}", config.id.0),
            DEFAULT_OBSERVER_CAPACITY,
            sink,
        )?;

        let node = Self {
            id: config.id,
            core: Arc::new(NodeCore {
                id: config.id,
                processors: RwLock::new(BTreeMap::new()),
                strategy: RwLock::new(strategy),
                running: AtomicBool::new(false),
                observer,
            }),
            config: RwLock::new(NodeConfig::new(config.id, config.handling.clone())),
            lifecycle: Mutex::new(()),
        };
        node.set_state(config)?;
        Ok(node)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::SeqCst)
    }

    /// Mode name of the active handling strategy
    pub fn mode(&self) -> &'static str {
        self.core.strategy.read().mode()
    }

    pub fn config(&self) -> NodeConfig {
        self.config.read().clone()
    }

    /// Processor ids of `role`, in configuration order
    pub fn protocol_ids(&self, role: ProtocolRole) -> Vec<ProtocolId> {
        let config = self.config.read();
        let list = match role {
            ProtocolRole::A => &config.protocols_a,
            ProtocolRole::B => &config.protocols_b,
        };
        list.iter().map(|p| p.id).collect()
    }

    /// Ids of the processors currently running
    pub fn running_protocols(&self) -> Vec<ProtocolId> {
        self.core
            .processors
            .read()
            .values()
            .filter(|p| p.is_running())
            .map(|p| p.id())
            .collect()
    }

    /// Send one object value through the processor `destination`
    pub fn send_to(&self, destination: ProtocolId, object: ObjectId, data: &MessageData) -> Result<()> {
        self.core.send_to(destination, object, data)
    }

    /// Reconcile processors and strategy against `config`.
    ///
    /// Kept processors (same id and type) are reconfigured in place, changed
    /// ones are recreated and absent ones dropped. A running node is stopped
    /// for the swap and restarted afterwards. A rejected configuration leaves
    /// the node untouched.
    pub fn set_state(&self, config: &NodeConfig) -> Result<()> {
        if config.id != self.id {
            return Err(ConfigError::invalid(
                self.id.to_string(),
                "id",
                format!("cannot reconfigure as {}", config.id),
            )
            .into());
        }
        config.validate()?;

        let _lifecycle = self.lifecycle.lock();
        let membership = membership_of(config);
        let handling_changed = self.config.read().handling != config.handling;
        let new_strategy = if handling_changed {
            Some(ObjectDataHandling::from_config(&config.handling, membership.clone())?)
        } else {
            None
        };

        let listener: Weak<dyn ProtocolListener> = {
            let weak: Weak<NodeCore> = Arc::downgrade(&self.core);
            weak
        };
        let mut created = BTreeMap::new();
        {
            let current = self.core.processors.read();
            for protocol in config.protocols() {
                let kept = current
                    .get(&protocol.id)
                    .is_some_and(|p| p.protocol_type() == protocol.protocol_type);
                if !kept {
                    created.insert(protocol.id, Processor::from_config(protocol, listener.clone())?);
                }
            }
        }

        let was_running = self.is_running();
        if was_running {
            if let Err(e) = self.stop_locked() {
                warn!("{}: stopping for reconfiguration: {}", self.id, e);
            }
        }

        {
            let mut processors = self.core.processors.write();
            let mut previous = std::mem::take(&mut *processors);
            for protocol in config.protocols() {
                let processor = match created.remove(&protocol.id) {
                    Some(processor) => processor,
                    None => match previous.remove(&protocol.id) {
                        Some(mut processor) => {
                            if let Err(e) = processor.apply_config(protocol) {
                                warn!("{}: {} rejected configuration: {}", self.id, protocol.id, e);
                            }
                            processor
                        }
                        None => continue,
                    },
                };
                processors.insert(protocol.id, processor);
            }
            for id in previous.keys() {
                debug!("{}: removing {}", self.id, id);
            }
        }

        match new_strategy {
            Some(strategy) => {
                info!("{}: handling mode {}", self.id, strategy.mode());
                *self.core.strategy.write() = strategy;
            }
            None => self.core.strategy.read().set_membership(membership),
        }
        *self.config.write() = config.clone();

        if was_running {
            self.start_locked()?;
        }
        Ok(())
    }

    /// Start every processor, role A first.
    ///
    /// All or nothing: when one processor fails the ones already started are
    /// stopped again. Starting a running node is a no-op.
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        self.start_locked()
    }

    pub fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        self.stop_locked()
    }

    fn start_locked(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let processors = self.core.processors.read();
        if !processors.values().any(|p| p.role() == ProtocolRole::A) {
            return Err(EngineError::NoRoleAProtocol(self.id));
        }

        let mut started: Vec<&Processor> = Vec::with_capacity(processors.len());
        for role in [ProtocolRole::A, ProtocolRole::B] {
            for processor in processors.values().filter(|p| p.role() == role) {
                if let Err(source) = processor.start() {
                    for done in started.iter().rev() {
                        if let Err(e) = done.stop() {
                            warn!("{}: rollback of {} failed: {}", self.id, done.id(), e);
                        }
                    }
                    return Err(EngineError::StartFailed {
                        protocol: processor.id(),
                        source,
                    });
                }
                started.push(processor);
            }
        }

        self.core.running.store(true, Ordering::SeqCst);
        info!("{} started ({} processors, {})", self.id, started.len(), self.mode());
        Ok(())
    }

    fn stop_locked(&self) -> Result<()> {
        let processors = self.core.processors.read();
        let mut first_error = None;
        for processor in processors.values() {
            if let Err(e) = processor.stop() {
                warn!("{}: stopping {} failed: {}", self.id, processor.id(), e);
                first_error.get_or_insert(e);
            }
        }
        let was_running = self.core.running.swap(false, Ordering::SeqCst);
        if was_running {
            info!("{} stopped", self.id);
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}: stop on drop failed: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("mode", &self.mode())
            .field("running", &self.is_running())
            .field("processors", &*self.core.processors.read())
            .finish()
    }
}
