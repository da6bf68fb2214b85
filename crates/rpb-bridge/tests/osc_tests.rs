//! OSC processor tests against a loopback peer

use rosc::OscType;
use rpb_bridge::{OscProcessor, ProtocolListener, ProtocolProcessor, RttrpmPacket};
use rpb_core::{
    Addressing, MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole, RemoteObject,
};
use rpb_test_utils::{find_available_udp_port, Collector, OscPeer, DEFAULT_TIMEOUT};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    messages: Collector<(ProtocolId, ObjectId, MessageData)>,
}

impl ProtocolListener for Recorder {
    fn on_message(&self, source: ProtocolId, object: ObjectId, data: MessageData) {
        self.messages.push((source, object, data));
    }

    fn on_tracking_packet(&self, _: ProtocolId, _: &RttrpmPacket) {}
}

fn osc_config(peer: &OscPeer, host_port: u16) -> ProtocolConfig {
    ProtocolConfig::osc(
        ProtocolId(1),
        ProtocolRole::A,
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        peer.port(),
        host_port,
    )
}

fn start(config: ProtocolConfig) -> (Arc<Recorder>, OscProcessor) {
    let recorder = Arc::new(Recorder::default());
    let weak: Weak<dyn ProtocolListener> = Arc::downgrade(&recorder) as Weak<dyn ProtocolListener>;
    let processor = OscProcessor::new(config, weak).unwrap();
    processor.start().unwrap();
    (recorder, processor)
}

#[test]
fn test_receive_decodes_to_listener() {
    let peer = OscPeer::bind();
    let port = find_available_udp_port();
    let (recorder, processor) = start(osc_config(&peer, port));

    peer.send(port, "/dbaudio1/matrixinput/gain/3", vec![OscType::Float(-6.0)]);

    assert!(recorder.messages.wait_for_count(1, DEFAULT_TIMEOUT));
    let (source, object, data) = recorder.messages.last().unwrap();
    assert_eq!(source, ProtocolId(1));
    assert_eq!(object, ObjectId::MatrixInputGain);
    assert_eq!(data.addressing(), Addressing::channel(3));
    assert_eq!(data.floats().unwrap(), vec![-6.0]);

    processor.stop().unwrap();
}

#[test]
fn test_send_reaches_peer() {
    let peer = OscPeer::bind();
    let port = find_available_udp_port();
    let (_recorder, processor) = start(osc_config(&peer, port));

    processor
        .send(
            ObjectId::MatrixInputMute,
            &MessageData::from_ints(Addressing::channel(2), &[1]),
        )
        .unwrap();

    let msg = peer
        .recv_addr("/dbaudio1/matrixinput/mute/2", DEFAULT_TIMEOUT)
        .expect("mute message");
    assert_eq!(msg.args, vec![OscType::Int(1)]);

    processor.stop().unwrap();
    assert!(processor
        .send(ObjectId::MatrixInputMute, &MessageData::from_ints(Addressing::channel(2), &[0]))
        .is_err());
}

#[test]
fn test_muted_channel_dropped() {
    let peer = OscPeer::bind();
    let port = find_available_udp_port();
    let (recorder, processor) = start(osc_config(&peer, port).with_muted_channels([4]));

    peer.send(port, "/dbaudio1/matrixinput/gain/4", vec![OscType::Float(1.0)]);
    peer.send(port, "/dbaudio1/matrixinput/gain/5", vec![OscType::Float(2.0)]);

    assert!(recorder.messages.wait_for_count(1, DEFAULT_TIMEOUT));
    std::thread::sleep(Duration::from_millis(100));
    let items = recorder.messages.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].2.addressing(), Addressing::channel(5));

    processor.stop().unwrap();
}

#[test]
fn test_foreign_sender_dropped() {
    let peer = OscPeer::bind();
    let port = find_available_udp_port();
    let mut config = osc_config(&peer, port);
    config.ip_address = Some(IpAddr::V4(Ipv4Addr::new(10, 255, 255, 1)));
    let (recorder, processor) = start(config);

    peer.send(port, "/dbaudio1/matrixinput/gain/1", vec![OscType::Float(1.0)]);

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(recorder.messages.count(), 0);

    processor.stop().unwrap();
}

#[test]
fn test_active_objects_polled() {
    let peer = OscPeer::bind();
    let port = find_available_udp_port();
    let config = osc_config(&peer, port)
        .with_active_objects(vec![RemoteObject::new(
            ObjectId::PositioningSourcePositionXy,
            Addressing::channel(7),
        )])
        .with_polling_interval(20);
    let (_recorder, processor) = start(config);

    let poll = peer
        .recv_addr("/dbaudio1/positioning/source_position_xy/7", DEFAULT_TIMEOUT)
        .expect("poll message");
    assert!(poll.args.is_empty());

    processor.stop().unwrap();
}

#[test]
fn test_restart_after_stop() {
    let peer = OscPeer::bind();
    let port = find_available_udp_port();
    let (recorder, processor) = start(osc_config(&peer, port));

    assert!(processor.start().is_err());
    processor.stop().unwrap();
    assert!(!processor.is_running());
    processor.stop().unwrap();

    processor.start().unwrap();
    peer.send(port, "/ping", vec![]);
    assert!(recorder.messages.wait_for_count(1, DEFAULT_TIMEOUT));
    assert_eq!(recorder.messages.last().unwrap().1, ObjectId::HeartbeatPing);
    processor.stop().unwrap();
}
