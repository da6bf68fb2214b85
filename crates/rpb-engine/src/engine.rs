//! Bridging engine: the set of nodes and the logging fan-out

use parking_lot::RwLock;
use rpb_core::{EngineConfig, MessageData, NodeId, ObjectId, ProtocolId, ProtocolRole, ProtocolType};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::observer::{NodeDataSink, ObservedMessage};
use crate::{EngineError, Node, Result};

/// Receiver of observed traffic, typically a log view or a log file
pub trait LoggingTarget: Send + Sync {
    fn add_log_data(
        &self,
        node: NodeId,
        protocol: ProtocolId,
        protocol_type: ProtocolType,
        object: ObjectId,
        data: &MessageData,
    );
}

struct EngineShared {
    target: RwLock<Option<Arc<dyn LoggingTarget>>>,
    logging_enabled: AtomicBool,
}

impl NodeDataSink for EngineShared {
    fn handle_node_data(&self, message: ObservedMessage) {
        if !self.logging_enabled.load(Ordering::Relaxed) {
            return;
        }
        let target = self.target.read().clone();
        if let Some(target) = target {
            target.add_log_data(
                message.node,
                message.protocol,
                message.protocol_type,
                message.object,
                &message.data,
            );
        }
    }
}

pub struct Engine {
    nodes: RwLock<BTreeMap<NodeId, Node>>,
    shared: Arc<EngineShared>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            shared: Arc::new(EngineShared {
                target: RwLock::new(None),
                logging_enabled: AtomicBool::new(true),
            }),
        }
    }

    /// Reconcile the node set against `config`.
    ///
    /// New nodes are created stopped, existing ones reconfigured (keeping
    /// their running state) and absent ones stopped and dropped. A document
    /// that fails validation, or whose new nodes cannot be built, changes
    /// nothing. Past that point every node is reconciled; one whose restart
    /// fails keeps its new configuration, stays stopped and is reported in
    /// [`EngineError::NodesFailed`].
    pub fn set_state(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;
        let mut nodes = self.nodes.write();

        let mut created = Vec::new();
        for node_config in config.nodes.iter().filter(|n| !nodes.contains_key(&n.id)) {
            let sink: Arc<dyn NodeDataSink> = self.shared.clone();
            created.push(Node::new(node_config, sink)?);
        }

        nodes.retain(|id, _| {
            let keep = config.node(*id).is_some();
            if !keep {
                info!("Removing {}", id);
            }
            keep
        });

        let mut failed = Vec::new();
        for node_config in &config.nodes {
            if let Some(node) = nodes.get(&node_config.id) {
                if let Err(e) = node.set_state(node_config) {
                    warn!("Failed to reconfigure {}: {}", node_config.id, e);
                    failed.push(node_config.id);
                }
            }
        }
        for node in created {
            info!("Created {} ({})", node.id(), node.mode());
            nodes.insert(node.id(), node);
        }

        self.set_logging_enabled(config.logging_enabled);
        if failed.is_empty() {
            Ok(())
        } else {
            Err(EngineError::NodesFailed(failed))
        }
    }

    /// Start every node; fails with the ids of the nodes that did not start
    pub fn start(&self) -> Result<()> {
        self.for_each_node("start", Node::start)
    }

    /// Stop every node; fails with the ids of the nodes that reported errors
    pub fn stop(&self) -> Result<()> {
        self.for_each_node("stop", Node::stop)
    }

    fn for_each_node(&self, action: &str, f: impl Fn(&Node) -> Result<()>) -> Result<()> {
        let nodes = self.nodes.read();
        let failed: Vec<NodeId> = nodes
            .values()
            .filter_map(|node| match f(node) {
                Ok(()) => None,
                Err(e) => {
                    warn!("Failed to {} {}: {}", action, node.id(), e);
                    Some(node.id())
                }
            })
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(EngineError::NodesFailed(failed))
        }
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.read().keys().copied().collect()
    }

    /// True while any node is running
    pub fn is_running(&self) -> bool {
        self.nodes.read().values().any(Node::is_running)
    }

    pub fn is_node_running(&self, id: NodeId) -> Option<bool> {
        self.nodes.read().get(&id).map(Node::is_running)
    }

    pub fn node_mode(&self, id: NodeId) -> Option<&'static str> {
        self.nodes.read().get(&id).map(Node::mode)
    }

    pub fn protocol_ids(&self, id: NodeId, role: ProtocolRole) -> Option<Vec<ProtocolId>> {
        self.nodes.read().get(&id).map(|node| node.protocol_ids(role))
    }

    pub fn set_logging_target(&self, target: Option<Arc<dyn LoggingTarget>>) {
        *self.shared.target.write() = target;
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.shared.logging_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.shared.logging_enabled.load(Ordering::Relaxed)
    }

    /// Forward one observed message to the logging target, when enabled
    pub fn handle_node_data(&self, message: ObservedMessage) {
        self.shared.handle_node_data(message);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rpb_core::{Addressing, HandlingConfig, NodeConfig, ProtocolConfig};

    #[derive(Default)]
    struct Recorder {
        entries: Mutex<Vec<(NodeId, ProtocolId, ObjectId)>>,
    }

    impl LoggingTarget for Recorder {
        fn add_log_data(
            &self,
            node: NodeId,
            protocol: ProtocolId,
            _protocol_type: ProtocolType,
            object: ObjectId,
            _data: &MessageData,
        ) {
            self.entries.lock().push((node, protocol, object));
        }
    }

    fn stub_node(id: u32) -> NodeConfig {
        NodeConfig::new(NodeId(id), HandlingConfig::Bypass)
            .with_protocol(ProtocolConfig::device_control(ProtocolId(id * 10), ProtocolRole::A))
            .with_protocol(ProtocolConfig::device_control(ProtocolId(id * 10 + 1), ProtocolRole::B))
    }

    fn config(nodes: Vec<NodeConfig>) -> EngineConfig {
        EngineConfig {
            logging_enabled: true,
            nodes,
        }
    }

    fn observed() -> ObservedMessage {
        ObservedMessage {
            node: NodeId(1),
            protocol: ProtocolId(10),
            protocol_type: ProtocolType::DeviceControl,
            object: ObjectId::MatrixInputMute,
            data: MessageData::from_ints(Addressing::channel(1), &[1]),
        }
    }

    #[test]
    fn test_reconcile_nodes() {
        let engine = Engine::new();
        engine.set_state(&config(vec![stub_node(1), stub_node(2)])).unwrap();
        assert_eq!(engine.node_ids(), vec![NodeId(1), NodeId(2)]);

        engine.start().unwrap();
        assert!(engine.is_running());

        engine.set_state(&config(vec![stub_node(2), stub_node(3)])).unwrap();
        assert_eq!(engine.node_ids(), vec![NodeId(2), NodeId(3)]);
        assert_eq!(engine.is_node_running(NodeId(2)), Some(true));
        assert_eq!(engine.is_node_running(NodeId(3)), Some(false));
        assert_eq!(engine.protocol_ids(NodeId(3), ProtocolRole::B), Some(vec![ProtocolId(31)]));

        engine.stop().unwrap();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_start_reports_failed_nodes() {
        let engine = Engine::new();
        let lonely = NodeConfig::new(NodeId(2), HandlingConfig::Bypass)
            .with_protocol(ProtocolConfig::device_control(ProtocolId(21), ProtocolRole::B));
        engine.set_state(&config(vec![stub_node(1), lonely])).unwrap();

        match engine.start() {
            Err(EngineError::NodesFailed(ids)) => assert_eq!(ids, vec![NodeId(2)]),
            other => panic!("unexpected {:?}", other),
        }
        // the healthy node still started
        assert_eq!(engine.is_node_running(NodeId(1)), Some(true));
        assert!(engine.stop().is_ok());
    }

    #[test]
    fn test_invalid_config_changes_nothing() {
        let engine = Engine::new();
        engine.set_state(&config(vec![stub_node(1)])).unwrap();
        let duplicate = config(vec![stub_node(2), stub_node(2)]);
        assert!(engine.set_state(&duplicate).is_err());
        assert_eq!(engine.node_ids(), vec![NodeId(1)]);
    }

    #[test]
    fn test_failed_restart_still_reconciles() {
        let engine = Engine::new();
        engine.set_state(&config(vec![stub_node(1), stub_node(2)])).unwrap();
        engine.start().unwrap();

        let no_role_a = NodeConfig::new(NodeId(1), HandlingConfig::Bypass)
            .with_protocol(ProtocolConfig::device_control(ProtocolId(11), ProtocolRole::B));
        match engine.set_state(&config(vec![no_role_a, stub_node(3)])) {
            Err(EngineError::NodesFailed(ids)) => assert_eq!(ids, vec![NodeId(1)]),
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(engine.node_ids(), vec![NodeId(1), NodeId(3)]);
        assert_eq!(engine.is_node_running(NodeId(1)), Some(false));
        assert_eq!(engine.protocol_ids(NodeId(1), ProtocolRole::A), Some(vec![]));
        assert_eq!(engine.is_node_running(NodeId(3)), Some(false));
        assert!(engine.stop().is_ok());
    }

    #[test]
    fn test_logging_gate() {
        let engine = Engine::new();
        let recorder = Arc::new(Recorder::default());
        engine.handle_node_data(observed());

        engine.set_logging_target(Some(recorder.clone()));
        engine.handle_node_data(observed());
        engine.set_logging_enabled(false);
        engine.handle_node_data(observed());

        assert!(!engine.is_logging_enabled());
        assert_eq!(
            *recorder.entries.lock(),
            vec![(NodeId(1), ProtocolId(10), ObjectId::MatrixInputMute)]
        );
    }
}
