//! RTTrPM motion tracking processor
//!
//! Receive-only: decodes tracking datagrams on the receive thread and hands
//! each decoded packet to the listener once. Only centroid positions are
//! translated into canonical messages, see [`centroid_messages`].

mod module;
mod packet;

pub use module::{code, Module, Vec3, MODULE_HEADER_SIZE};
pub use packet::{
    PacketHeader, RttrpmError, RttrpmPacket, Trackable, FLOAT_SIGNATURE, HEADER_SIZE,
    INT_SIGNATURE, VERSION,
};

use parking_lot::Mutex;
use rpb_core::{
    Addressing, ConfigError, MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole,
    ProtocolType,
};
use std::sync::Weak;
use tracing::{debug, info, warn};

use crate::traits::check_config;
use crate::udp::UdpEndpoint;
use crate::{BridgeError, ProtocolListener, ProtocolProcessor, Result};

/// Canonical messages carried by a packet: one XY positioning message per
/// centroid position module. The channel is the sub-module's index within
/// the datagram (see [`RttrpmPacket::indexed_modules`]), with no record.
pub fn centroid_messages(packet: &RttrpmPacket) -> impl Iterator<Item = (ObjectId, MessageData)> + '_ {
    packet
        .indexed_modules()
        .filter_map(|(index, module)| match module {
            Module::CentroidPosition { position, .. } => Some((
                ObjectId::PositioningSourcePositionXy,
                MessageData::from_floats(
                    Addressing::channel(index),
                    &[position.x as f32, position.y as f32],
                ),
            )),
            _ => None,
        })
}

pub struct RttrpmProcessor {
    config: ProtocolConfig,
    listener: Weak<dyn ProtocolListener>,
    endpoint: Mutex<Option<UdpEndpoint>>,
}

impl RttrpmProcessor {
    pub fn new(config: ProtocolConfig, listener: Weak<dyn ProtocolListener>) -> Result<Self> {
        if config.protocol_type != ProtocolType::Rttrpm {
            return Err(BridgeError::Config(ConfigError::invalid(
                config.id.to_string(),
                "type",
                format!("expected RTTrPM, got {}", config.protocol_type),
            )));
        }
        config.validate()?;
        Ok(Self {
            config,
            listener,
            endpoint: Mutex::new(None),
        })
    }

    /// Local port while running
    pub fn local_port(&self) -> Option<u16> {
        self.endpoint
            .lock()
            .as_ref()
            .and_then(|e| e.local_addr().ok())
            .map(|a| a.port())
    }
}

impl ProtocolProcessor for RttrpmProcessor {
    fn id(&self) -> ProtocolId {
        self.config.id
    }

    fn role(&self) -> ProtocolRole {
        self.config.role
    }

    fn protocol_type(&self) -> ProtocolType {
        ProtocolType::Rttrpm
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
        let mut endpoint = self.endpoint.lock();
        if endpoint.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }
        let port = self
            .config
            .host_port
            .ok_or_else(|| ConfigError::missing(self.config.id.to_string(), "host_port"))?;

        let id = self.config.id;
        let listener = self.listener.clone();
        let peer = self.config.ip_address.filter(|ip| !ip.is_unspecified());

        let opened = UdpEndpoint::open(format!("rttrpm-{}", id.0), port, move |data, from| {
            if let Some(peer) = peer {
                if from.ip() != peer {
                    debug!("{}: ignoring RTTrPM datagram from {}", id, from);
                    return;
                }
            }
            let packet = match RttrpmPacket::decode(data) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("{}: dropping malformed RTTrPM datagram from {}: {}", id, from, e);
                    return;
                }
            };
            debug!(
                "{}: RTTrPM packet {} (context {}, {} trackables, {} modules)",
                id,
                packet.header.packet_id,
                packet.header.context,
                packet.trackables.len(),
                packet.module_count()
            );
            if let Some(listener) = listener.upgrade() {
                listener.on_tracking_packet(id, &packet);
            }
        })?;

        info!("{}: RTTrPM listening on port {}", id, port);
        *endpoint = Some(opened);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let endpoint = self.endpoint.lock().take();
        if let Some(mut endpoint) = endpoint {
            endpoint.close();
            info!("{}: RTTrPM stopped", self.config.id);
        }
        Ok(())
    }

    fn send(&self, object: ObjectId, _data: &MessageData) -> Result<()> {
        Err(BridgeError::Unsupported(format!(
            "RTTrPM is receive-only, cannot send {}",
            object
        )))
    }

    fn is_running(&self) -> bool {
        self.endpoint.lock().is_some()
    }
}

impl Drop for RttrpmProcessor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_messages_use_sub_module_index() {
        let bytes = RttrpmPacket::new(
            1,
            vec![
                Trackable::new(
                    "5",
                    0,
                    vec![Module::CentroidPosition {
                        latency: 0,
                        position: Vec3::new(0.5, 0.25, 9.0),
                    }],
                ),
                Trackable::new(
                    "spot",
                    0,
                    vec![Module::OrientationQuaternion {
                        latency: 0,
                        qx: 0.0,
                        qy: 0.0,
                        qz: 0.0,
                        qw: 1.0,
                    }],
                ),
                Trackable::new(
                    "spot",
                    0,
                    vec![Module::CentroidPosition {
                        latency: 0,
                        position: Vec3::new(1.0, 2.0, 3.0),
                    }],
                ),
            ],
        )
        .encode();
        let packet = RttrpmPacket::decode(&bytes).unwrap();

        let messages: Vec<_> = centroid_messages(&packet).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, ObjectId::PositioningSourcePositionXy);
        assert_eq!(messages[0].1.addressing(), Addressing::channel(1));
        assert_eq!(messages[0].1.floats().unwrap(), vec![0.5, 0.25]);
        // the quaternion holds index 2
        assert_eq!(messages[1].1.addressing(), Addressing::channel(3));
    }

    #[test]
    fn test_centroids_of_one_trackable_stay_distinct() {
        let centroid = |x: f64, y: f64| Module::CentroidPosition {
            latency: 0,
            position: Vec3::new(x, y, 0.0),
        };
        let bytes = RttrpmPacket::new(
            2,
            vec![Trackable::new("4", 0, vec![centroid(0.5, 0.25), centroid(0.75, 1.5)])],
        )
        .encode();
        let packet = RttrpmPacket::decode(&bytes).unwrap();

        let messages: Vec<_> = centroid_messages(&packet).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].1.addressing(), Addressing::channel(1));
        assert_eq!(messages[1].1.addressing(), Addressing::channel(2));
        assert_eq!(messages[1].1.floats().unwrap(), vec![0.75, 1.5]);
    }

    #[test]
    fn test_send_unsupported() {
        let config = ProtocolConfig::rttrpm(ProtocolId(1), ProtocolRole::A, 24100);
        let listener: Weak<dyn ProtocolListener> = Weak::<NullListener>::new();
        let processor = RttrpmProcessor::new(config, listener).unwrap();
        let result = processor.send(
            ObjectId::PositioningSourcePositionXy,
            &MessageData::from_floats(Addressing::channel(1), &[0.0, 0.0]),
        );
        assert!(matches!(result, Err(BridgeError::Unsupported(_))));
        assert!(!processor.is_running());
        assert!(processor.stop().is_ok());
    }

    struct NullListener;

    impl ProtocolListener for NullListener {
        fn on_message(&self, _: ProtocolId, _: ObjectId, _: MessageData) {}
        fn on_tracking_packet(&self, _: ProtocolId, _: &RttrpmPacket) {}
    }
}
