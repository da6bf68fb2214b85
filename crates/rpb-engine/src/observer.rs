//! Asynchronous observer path
//!
//! Receive threads hand every message to an [`ObserverQueue`]; a single
//! consumer thread drains it in order and calls the [`NodeDataSink`]. A full
//! queue drops the newest entry instead of blocking the receive thread.

use crossbeam_channel::{bounded, Sender, TrySendError};
use rpb_core::{MessageData, NodeId, ObjectId, ProtocolId, ProtocolType};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, warn};

use crate::{EngineError, Result};

pub const DEFAULT_OBSERVER_CAPACITY: usize = 1024;

/// One message seen by a node, addressed by where it came from
#[derive(Debug, Clone)]
pub struct ObservedMessage {
    pub node: NodeId,
    pub protocol: ProtocolId,
    pub protocol_type: ProtocolType,
    pub object: ObjectId,
    pub data: MessageData,
}

/// Consumer of observed node traffic
pub trait NodeDataSink: Send + Sync {
    fn handle_node_data(&self, message: ObservedMessage);
}

pub struct ObserverQueue {
    sender: Option<Sender<ObservedMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl ObserverQueue {
    pub fn spawn(name: String, capacity: usize, sink: Arc<dyn NodeDataSink>) -> Result<Self> {
        let (tx, rx) = bounded::<ObservedMessage>(capacity.max(1));
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                // ends once every sender is dropped and the queue is drained
                for message in rx {
                    sink.handle_node_data(message);
                }
            })
            .map_err(|e| EngineError::Routing(format!("failed to spawn observer thread: {}", e)))?;
        Ok(Self {
            sender: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a message without blocking; false when it was dropped
    pub fn push(&self, message: ObservedMessage) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(
                    "Observer queue full, dropping {} from {}",
                    message.object, message.protocol
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting messages and wait for the consumer to drain the queue
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Observer thread panicked");
            }
        }
    }
}

impl Drop for ObserverQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
