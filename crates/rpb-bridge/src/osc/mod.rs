//! OSC processor
//!
//! Sends to `ip_address:client_port`, receives on `host_port` and polls the
//! configured active objects with zero-argument messages.

mod address;
mod codec;
mod poller;

pub use address::{address_of, match_address};
pub use codec::{decode, decode_message, encode, encode_message};

use parking_lot::Mutex;
use rpb_core::{
    ConfigError, MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole, ProtocolType,
};
use std::net::SocketAddr;
use std::sync::Weak;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::traits::check_config;
use crate::udp::UdpEndpoint;
use crate::{BridgeError, ProtocolListener, ProtocolProcessor, Result};

use poller::Poller;

struct Runtime {
    endpoint: UdpEndpoint,
    poller: Option<Poller>,
    target: SocketAddr,
}

pub struct OscProcessor {
    config: ProtocolConfig,
    listener: Weak<dyn ProtocolListener>,
    runtime: Mutex<Option<Runtime>>,
}

impl OscProcessor {
    pub fn new(config: ProtocolConfig, listener: Weak<dyn ProtocolListener>) -> Result<Self> {
        if config.protocol_type != ProtocolType::Osc {
            return Err(BridgeError::Config(ConfigError::invalid(
                config.id.to_string(),
                "type",
                format!("expected OSC, got {}", config.protocol_type),
            )));
        }
        config.validate()?;
        Ok(Self {
            config,
            listener,
            runtime: Mutex::new(None),
        })
    }

    /// Local receive port while running
    pub fn local_port(&self) -> Option<u16> {
        self.runtime
            .lock()
            .as_ref()
            .and_then(|r| r.endpoint.local_addr().ok())
            .map(|a| a.port())
    }

    fn target(&self) -> Result<SocketAddr> {
        let context = self.config.id.to_string();
        let ip = self
            .config
            .ip_address
            .ok_or_else(|| ConfigError::missing(context.clone(), "ip_address"))?;
        let port = self
            .config
            .client_port
            .ok_or_else(|| ConfigError::missing(context, "client_port"))?;
        Ok(SocketAddr::new(ip, port))
    }

    fn poll_datagrams(&self) -> Vec<Vec<u8>> {
        self.config
            .active_objects
            .iter()
            .filter_map(|object| {
                match encode(object.id, &MessageData::empty(object.addressing)) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!("{}: cannot poll {}: {}", self.config.id, object.id, e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl ProtocolProcessor for OscProcessor {
    fn id(&self) -> ProtocolId {
        self.config.id
    }

    fn role(&self) -> ProtocolRole {
        self.config.role
    }

    fn protocol_type(&self) -> ProtocolType {
        ProtocolType::Osc
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
        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }
        let target = self.target()?;
        let port = self
            .config
            .host_port
            .ok_or_else(|| ConfigError::missing(self.config.id.to_string(), "host_port"))?;

        let id = self.config.id;
        let listener = self.listener.clone();
        let muted = self.config.muted_channels.clone();
        let peer = target.ip();

        let endpoint = UdpEndpoint::open(format!("osc-{}", id.0), port, move |data, from| {
            if !peer.is_unspecified() && from.ip() != peer {
                warn!("{}: dropping OSC from unexpected sender {}", id, from);
                return;
            }
            let messages = match decode(data) {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("{}: dropping malformed OSC datagram from {}: {}", id, from, e);
                    return;
                }
            };
            let Some(listener) = listener.upgrade() else {
                return;
            };
            for (object, message) in messages {
                let addressing = message.addressing();
                if addressing.has_channel() && muted.contains(&addressing.channel) {
                    debug!("{}: channel {} muted, dropping {}", id, addressing.channel, object);
                    continue;
                }
                listener.on_message(id, object, message);
            }
        })?;

        let polls = self.poll_datagrams();
        let poller = if polls.is_empty() {
            None
        } else {
            Some(Poller::spawn(
                format!("osc-poll-{}", id.0),
                Duration::from_millis(self.config.polling_interval_ms),
                endpoint.socket(),
                target,
                polls,
            )?)
        };

        info!(
            "{}: OSC listening on port {}, sending to {}",
            id, port, target
        );
        *runtime = Some(Runtime {
            endpoint,
            poller,
            target,
        });
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let runtime = self.runtime.lock().take();
        if let Some(mut runtime) = runtime {
            if let Some(mut poller) = runtime.poller.take() {
                poller.stop();
            }
            runtime.endpoint.close();
            info!("{}: OSC stopped", self.config.id);
        }
        Ok(())
    }

    fn send(&self, object: ObjectId, data: &MessageData) -> Result<()> {
        let bytes = encode(object, data)?;
        let runtime = self.runtime.lock();
        let runtime = runtime.as_ref().ok_or(BridgeError::NotRunning)?;
        runtime.endpoint.send_to(&bytes, runtime.target)?;
        debug!("{}: sent {} {}", self.config.id, object, data);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }
}

impl Drop for OscProcessor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
