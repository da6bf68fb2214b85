//! OSC codec: canonical messages to and from OSC packets

use rosc::{OscMessage, OscPacket, OscType};
use rpb_core::{Addressing, MessageData, ObjectId, ValueType};
use tracing::debug;

use super::address::{address_of, match_address};
use crate::{BridgeError, Result};

/// Encode one object value as an OSC datagram
pub fn encode(object: ObjectId, data: &MessageData) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(encode_message(object, data)?);
    rosc::encoder::encode(&packet).map_err(|e| BridgeError::Protocol(format!("{:?}", e)))
}

/// Build the OSC message for one object value.
///
/// The address is the object prefix followed by the record and channel
/// segments that are set. Numeric values are converted to the object's
/// declared number type.
pub fn encode_message(object: ObjectId, data: &MessageData) -> Result<OscMessage> {
    let mut addr = String::from(address_of(object));
    let addressing = data.addressing();
    if addressing.has_record() {
        addr.push_str(&format!("/{}", addressing.record));
    }
    if addressing.has_channel() {
        addr.push_str(&format!("/{}", addressing.channel));
    }

    let target = object.value_type();
    let args = match data.value_type() {
        ValueType::None => Vec::new(),
        ValueType::String => {
            if target != ValueType::String {
                return Err(mismatch(object, data.value_type()));
            }
            vec![OscType::String(data.string()?)]
        }
        ValueType::Int | ValueType::Float => {
            let values = data.numeric_values();
            match target {
                ValueType::Int => values.iter().map(|v| OscType::Int(v.round() as i32)).collect(),
                ValueType::Float => values.iter().map(|v| OscType::Float(*v as f32)).collect(),
                _ => return Err(mismatch(object, data.value_type())),
            }
        }
    };

    Ok(OscMessage { addr, args })
}

/// Decode a datagram into object values, unpacking bundles recursively.
///
/// Messages with unknown addresses or unusable arguments are logged and
/// skipped; only an undecodable datagram is an error.
pub fn decode(bytes: &[u8]) -> Result<Vec<(ObjectId, MessageData)>> {
    let (_, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|e| BridgeError::Protocol(format!("{:?}", e)))?;
    let mut out = Vec::new();
    collect(&packet, &mut out);
    Ok(out)
}

fn collect(packet: &OscPacket, out: &mut Vec<(ObjectId, MessageData)>) {
    match packet {
        OscPacket::Message(msg) => match decode_message(msg) {
            Ok(decoded) => out.push(decoded),
            Err(e) => debug!("Skipping OSC message {}: {}", msg.addr, e),
        },
        OscPacket::Bundle(bundle) => {
            for inner in &bundle.content {
                collect(inner, out);
            }
        }
    }
}

/// Decode one OSC message.
///
/// Zero-argument messages become empty poll messages. Int objects accept
/// float arguments (rounded) and float objects accept ints.
pub fn decode_message(msg: &OscMessage) -> Result<(ObjectId, MessageData)> {
    let (object, rest) = match_address(&msg.addr)
        .ok_or_else(|| BridgeError::Protocol(format!("unknown address {}", msg.addr)))?;
    let addressing = parse_addressing(rest)?;

    if msg.args.is_empty() || object.value_type() == ValueType::None {
        return Ok((object, MessageData::empty(addressing)));
    }

    let limit = object.value_count().map(usize::from).unwrap_or(1);
    let args = &msg.args[..msg.args.len().min(limit)];

    let data = match object.value_type() {
        ValueType::String => match &args[0] {
            OscType::String(s) => MessageData::from_string(addressing, s),
            other => return Err(bad_arg(object, other)),
        },
        ValueType::Int => {
            let values = args
                .iter()
                .map(|arg| arg_as_f64(arg).map(|v| v.round() as i32).ok_or_else(|| bad_arg(object, arg)))
                .collect::<Result<Vec<_>>>()?;
            MessageData::from_ints(addressing, &values)
        }
        ValueType::Float => {
            let values = args
                .iter()
                .map(|arg| arg_as_f64(arg).map(|v| v as f32).ok_or_else(|| bad_arg(object, arg)))
                .collect::<Result<Vec<_>>>()?;
            MessageData::from_floats(addressing, &values)
        }
        ValueType::None => MessageData::empty(addressing),
    };
    Ok((object, data))
}

/// Trailing address segments: `/channel` or `/record/channel`
fn parse_addressing(rest: &str) -> Result<Addressing> {
    let segments = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map_err(|_| BridgeError::Protocol(format!("bad address segment {:?}", s)))
        })
        .collect::<Result<Vec<_>>>()?;
    match segments.as_slice() {
        [] => Ok(Addressing::NONE),
        [channel] => Ok(Addressing::channel(*channel)),
        [record, channel] => Ok(Addressing::new(*channel, *record)),
        _ => Err(BridgeError::Protocol(format!("too many address segments in {:?}", rest))),
    }
}

fn arg_as_f64(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Int(i) => Some(*i as f64),
        OscType::Float(f) => Some(*f as f64),
        OscType::Long(l) => Some(*l as f64),
        OscType::Double(d) => Some(*d),
        OscType::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn bad_arg(object: ObjectId, arg: &OscType) -> BridgeError {
    BridgeError::Protocol(format!("{} cannot take argument {:?}", object, arg))
}

fn mismatch(object: ObjectId, actual: ValueType) -> BridgeError {
    BridgeError::Protocol(format!(
        "{} carries {} values, cannot encode {}",
        object,
        object.value_type(),
        actual
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime};

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    /// A full-value message for `object` with the addressing it expects
    fn natural_message(object: ObjectId) -> MessageData {
        let addressing = Addressing::new(
            if object.needs_channel() { 5 } else { Addressing::INVALID },
            if object.needs_record() { 2 } else { Addressing::INVALID },
        );
        let count = object.value_count().unwrap_or(0) as usize;
        match object.value_type() {
            ValueType::None => MessageData::empty(addressing),
            ValueType::String => MessageData::from_string(addressing, "Stage left"),
            ValueType::Int => {
                let values: Vec<i32> = (1..=count as i32).collect();
                MessageData::from_ints(addressing, &values)
            }
            ValueType::Float => {
                let values: Vec<f32> = (1..=count).map(|i| i as f32 * 0.25).collect();
                MessageData::from_floats(addressing, &values)
            }
        }
    }

    #[test]
    fn test_every_object_survives_encode_decode() {
        for object in ObjectId::ALL {
            let data = natural_message(object);
            let bytes = encode(object, &data).unwrap();
            let decoded = decode(&bytes).unwrap();

            assert_eq!(decoded.len(), 1, "{}", object);
            let (decoded_object, decoded_data) = &decoded[0];
            assert_eq!(*decoded_object, object);
            assert_eq!(*decoded_data, data, "{}", object);
            assert_eq!(decoded_data.payload(), data.payload(), "{}", object);
        }
    }

    #[test]
    fn test_encode_address_segments() {
        let data = MessageData::from_floats(Addressing::new(7, 2), &[0.1, 0.2]);
        let m = encode_message(ObjectId::CoordinateMappingSourcePositionXy, &data).unwrap();
        assert_eq!(m.addr, "/dbaudio1/coordinatemapping/source_position_xy/2/7");
        assert_eq!(m.args, vec![OscType::Float(0.1), OscType::Float(0.2)]);

        let ping = encode_message(ObjectId::HeartbeatPing, &MessageData::empty(Addressing::NONE)).unwrap();
        assert_eq!(ping.addr, "/ping");
        assert!(ping.args.is_empty());
    }

    #[test]
    fn test_decode_channel_and_record() {
        let (object, data) = decode_message(&msg(
            "/dbaudio1/coordinatemapping/source_position/1/16",
            vec![OscType::Float(0.5), OscType::Float(0.25), OscType::Float(0.0)],
        ))
        .unwrap();
        assert_eq!(object, ObjectId::CoordinateMappingSourcePosition);
        assert_eq!(data.addressing(), Addressing::new(16, 1));
        assert_eq!(data.floats().unwrap(), vec![0.5, 0.25, 0.0]);
    }

    #[test]
    fn test_int_object_accepts_float() {
        let (object, data) =
            decode_message(&msg("/dbaudio1/matrixinput/mute/3", vec![OscType::Float(0.6)])).unwrap();
        assert_eq!(object, ObjectId::MatrixInputMute);
        assert_eq!(data.ints().unwrap(), vec![1]);
    }

    #[test]
    fn test_float_object_accepts_int() {
        let (_, data) =
            decode_message(&msg("/dbaudio1/matrixinput/gain/3", vec![OscType::Int(-6)])).unwrap();
        assert_eq!(data.floats().unwrap(), vec![-6.0]);
    }

    #[test]
    fn test_zero_args_is_poll() {
        let (object, data) = decode_message(&msg("/dbaudio1/matrixinput/gain/3", vec![])).unwrap();
        assert_eq!(object, ObjectId::MatrixInputGain);
        assert!(data.is_empty());
        assert_eq!(data.addressing(), Addressing::channel(3));
    }

    #[test]
    fn test_string_object() {
        let (object, data) = decode_message(&msg(
            "/dbaudio1/matrixinput/channelname/2",
            vec![OscType::String("Vocals".into())],
        ))
        .unwrap();
        assert_eq!(object, ObjectId::MatrixInputChannelName);
        assert_eq!(data.string().unwrap(), "Vocals");

        let bad = decode_message(&msg("/dbaudio1/matrixinput/channelname/2", vec![OscType::Int(1)]));
        assert!(bad.is_err());
    }

    #[test]
    fn test_bad_segments_rejected() {
        assert!(decode_message(&msg("/dbaudio1/matrixinput/gain/x", vec![])).is_err());
        assert!(decode_message(&msg("/dbaudio1/matrixinput/gain/1/2/3", vec![])).is_err());
        assert!(decode_message(&msg("/unknown/thing", vec![])).is_err());
    }

    #[test]
    fn test_string_into_number_rejected() {
        let data = MessageData::from_string(Addressing::channel(1), "loud");
        assert!(encode_message(ObjectId::MatrixInputGain, &data).is_err());
    }

    #[test]
    fn test_bundle_unpacked() {
        let packet = OscPacket::Bundle(OscBundle {
            timetag: OscTime::from((0, 1)),
            content: vec![
                OscPacket::Message(msg("/dbaudio1/matrixinput/gain/1", vec![OscType::Float(1.0)])),
                OscPacket::Bundle(OscBundle {
                    timetag: OscTime::from((0, 1)),
                    content: vec![OscPacket::Message(msg("/pong", vec![]))],
                }),
                OscPacket::Message(msg("/not/ours", vec![])),
            ],
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0, ObjectId::MatrixInputGain);
        assert_eq!(decoded[1].0, ObjectId::HeartbeatPong);
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(decode(&[0xff, 0x00, 0x01]).is_err());
    }
}
