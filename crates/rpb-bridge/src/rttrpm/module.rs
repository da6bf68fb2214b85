//! RTTrPM sub-module payloads
//!
//! Every module starts with the common header:
//! ```text
//! ┌──────────┬───────────────────┬──────────────────────────┐
//! │ type u8  │ size u16 (BE)     │ payload (size - 3 bytes) │
//! └──────────┴───────────────────┴──────────────────────────┘
//! ```
//! `size` covers the header itself. Payload layouts are fixed per type code
//! except for zone collision, whose records are length-prefixed names.

use bytes::{Buf, BufMut, BytesMut};

use super::RttrpmError;

/// Size of the common type + size prefix
pub const MODULE_HEADER_SIZE: usize = 3;

/// Module type codes
pub mod code {
    pub const TRACKABLE: u8 = 0x01;
    pub const CENTROID_POSITION: u8 = 0x02;
    pub const ORIENTATION_QUATERNION: u8 = 0x03;
    pub const ORIENTATION_EULER: u8 = 0x04;
    pub const TRACKED_POINT_POSITION: u8 = 0x06;
    pub const CENTROID_ACCEL_VELO: u8 = 0x20;
    pub const TRACKED_POINT_ACCEL_VELO: u8 = 0x21;
    pub const ZONE_COLLISION: u8 = 0x22;
    pub const TRACKABLE_WITH_TIMESTAMP: u8 = 0x51;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn read(buf: &mut &[u8]) -> Self {
        Self {
            x: buf.get_f64(),
            y: buf.get_f64(),
            z: buf.get_f64(),
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
    }
}

/// One decoded sub-module
#[derive(Debug, Clone, PartialEq)]
pub enum Module {
    CentroidPosition {
        latency: u16,
        position: Vec3,
    },
    OrientationQuaternion {
        latency: u16,
        qx: f64,
        qy: f64,
        qz: f64,
        qw: f64,
    },
    OrientationEuler {
        latency: u16,
        order: u16,
        r1: f64,
        r2: f64,
        r3: f64,
    },
    TrackedPointPosition {
        latency: u16,
        position: Vec3,
        point_index: u8,
    },
    CentroidAccelVelo {
        position: Vec3,
        acceleration: [f32; 3],
        velocity: [f32; 3],
    },
    TrackedPointAccelVelo {
        position: Vec3,
        acceleration: [f32; 3],
        velocity: [f32; 3],
        point_index: u8,
    },
    ZoneCollision {
        zones: Vec<String>,
    },
}

impl Module {
    pub fn type_code(&self) -> u8 {
        match self {
            Module::CentroidPosition { .. } => code::CENTROID_POSITION,
            Module::OrientationQuaternion { .. } => code::ORIENTATION_QUATERNION,
            Module::OrientationEuler { .. } => code::ORIENTATION_EULER,
            Module::TrackedPointPosition { .. } => code::TRACKED_POINT_POSITION,
            Module::CentroidAccelVelo { .. } => code::CENTROID_ACCEL_VELO,
            Module::TrackedPointAccelVelo { .. } => code::TRACKED_POINT_ACCEL_VELO,
            Module::ZoneCollision { .. } => code::ZONE_COLLISION,
        }
    }

    /// Fixed payload size for a type code, `None` for variable or unknown kinds
    pub fn fixed_payload_size(type_code: u8) -> Option<usize> {
        match type_code {
            code::CENTROID_POSITION => Some(2 + 24),
            code::ORIENTATION_QUATERNION => Some(2 + 32),
            code::ORIENTATION_EULER => Some(2 + 2 + 24),
            code::TRACKED_POINT_POSITION => Some(2 + 24 + 1),
            code::CENTROID_ACCEL_VELO => Some(24 + 12 + 12),
            code::TRACKED_POINT_ACCEL_VELO => Some(24 + 12 + 12 + 1),
            _ => None,
        }
    }

    /// Whether `type_code` is a sub-module kind this decoder understands
    pub fn is_known(type_code: u8) -> bool {
        type_code == code::ZONE_COLLISION || Self::fixed_payload_size(type_code).is_some()
    }

    /// Decode the payload of a module whose header has already been consumed.
    ///
    /// `payload` is exactly the declared module size minus the header.
    /// Returns `Ok(None)` for type codes this decoder does not know.
    pub(crate) fn decode_payload(
        type_code: u8,
        mut payload: &[u8],
    ) -> Result<Option<Self>, RttrpmError> {
        if let Some(expected) = Self::fixed_payload_size(type_code) {
            if payload.len() < expected {
                return Err(RttrpmError::ModuleSizeMismatch {
                    module_type: type_code,
                    declared: payload.len() + MODULE_HEADER_SIZE,
                    expected: expected + MODULE_HEADER_SIZE,
                });
            }
        }

        let buf = &mut payload;
        let module = match type_code {
            code::CENTROID_POSITION => Module::CentroidPosition {
                latency: buf.get_u16(),
                position: Vec3::read(buf),
            },
            code::ORIENTATION_QUATERNION => Module::OrientationQuaternion {
                latency: buf.get_u16(),
                qx: buf.get_f64(),
                qy: buf.get_f64(),
                qz: buf.get_f64(),
                qw: buf.get_f64(),
            },
            code::ORIENTATION_EULER => Module::OrientationEuler {
                latency: buf.get_u16(),
                order: buf.get_u16(),
                r1: buf.get_f64(),
                r2: buf.get_f64(),
                r3: buf.get_f64(),
            },
            code::TRACKED_POINT_POSITION => Module::TrackedPointPosition {
                latency: buf.get_u16(),
                position: Vec3::read(buf),
                point_index: buf.get_u8(),
            },
            code::CENTROID_ACCEL_VELO => Module::CentroidAccelVelo {
                position: Vec3::read(buf),
                acceleration: read_f32x3(buf),
                velocity: read_f32x3(buf),
            },
            code::TRACKED_POINT_ACCEL_VELO => Module::TrackedPointAccelVelo {
                position: Vec3::read(buf),
                acceleration: read_f32x3(buf),
                velocity: read_f32x3(buf),
                point_index: buf.get_u8(),
            },
            code::ZONE_COLLISION => Module::ZoneCollision {
                zones: read_zones(buf)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(module))
    }

    /// Append header and payload to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut payload = BytesMut::new();
        match self {
            Module::CentroidPosition { latency, position } => {
                payload.put_u16(*latency);
                position.write(&mut payload);
            }
            Module::OrientationQuaternion {
                latency,
                qx,
                qy,
                qz,
                qw,
            } => {
                payload.put_u16(*latency);
                for v in [qx, qy, qz, qw] {
                    payload.put_f64(*v);
                }
            }
            Module::OrientationEuler {
                latency,
                order,
                r1,
                r2,
                r3,
            } => {
                payload.put_u16(*latency);
                payload.put_u16(*order);
                for v in [r1, r2, r3] {
                    payload.put_f64(*v);
                }
            }
            Module::TrackedPointPosition {
                latency,
                position,
                point_index,
            } => {
                payload.put_u16(*latency);
                position.write(&mut payload);
                payload.put_u8(*point_index);
            }
            Module::CentroidAccelVelo {
                position,
                acceleration,
                velocity,
            } => {
                position.write(&mut payload);
                write_f32x3(&mut payload, acceleration);
                write_f32x3(&mut payload, velocity);
            }
            Module::TrackedPointAccelVelo {
                position,
                acceleration,
                velocity,
                point_index,
            } => {
                position.write(&mut payload);
                write_f32x3(&mut payload, acceleration);
                write_f32x3(&mut payload, velocity);
                payload.put_u8(*point_index);
            }
            Module::ZoneCollision { zones } => {
                payload.put_u8(zones.len().min(u8::MAX as usize) as u8);
                for zone in zones.iter().take(u8::MAX as usize) {
                    put_short_string(&mut payload, zone);
                }
            }
        }
        buf.put_u8(self.type_code());
        buf.put_u16((payload.len() + MODULE_HEADER_SIZE) as u16);
        buf.extend_from_slice(&payload);
    }
}

fn read_f32x3(buf: &mut &[u8]) -> [f32; 3] {
    [buf.get_f32(), buf.get_f32(), buf.get_f32()]
}

fn write_f32x3(buf: &mut BytesMut, values: &[f32; 3]) {
    for v in values {
        buf.put_f32(*v);
    }
}

fn read_zones(buf: &mut &[u8]) -> Result<Vec<String>, RttrpmError> {
    ensure(buf, 1)?;
    let count = buf.get_u8();
    let mut zones = Vec::with_capacity(count as usize);
    for _ in 0..count {
        zones.push(read_short_string(buf)?);
    }
    Ok(zones)
}

/// Fail with `Truncated` unless `needed` more bytes are readable
pub(crate) fn ensure(buf: &[u8], needed: usize) -> Result<(), RttrpmError> {
    if buf.len() < needed {
        return Err(RttrpmError::Truncated {
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// u8 length prefixed name, invalid UTF-8 replaced
pub(crate) fn read_short_string(buf: &mut &[u8]) -> Result<String, RttrpmError> {
    ensure(buf, 1)?;
    let len = buf.get_u8() as usize;
    ensure(buf, len)?;
    let name = String::from_utf8_lossy(&buf[..len]).into_owned();
    buf.advance(len);
    Ok(name)
}

pub(crate) fn put_short_string(buf: &mut BytesMut, value: &str) {
    let mut end = value.len().min(u8::MAX as usize);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_u8(end as u8);
    buf.extend_from_slice(&value.as_bytes()[..end]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_position_layout() {
        let module = Module::CentroidPosition {
            latency: 7,
            position: Vec3::new(1.0, -2.0, 0.5),
        };
        let mut buf = BytesMut::new();
        module.encode(&mut buf);

        assert_eq!(buf.len(), 29);
        assert_eq!(buf[0], code::CENTROID_POSITION);
        assert_eq!(u16::from_be_bytes([buf[1], buf[2]]), 29);
        assert_eq!(u16::from_be_bytes([buf[3], buf[4]]), 7);
        assert_eq!(&buf[5..13], &1.0f64.to_be_bytes());
    }

    #[test]
    fn test_short_payload_is_size_mismatch() {
        let err = Module::decode_payload(code::ORIENTATION_EULER, &[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            RttrpmError::ModuleSizeMismatch {
                module_type: code::ORIENTATION_EULER,
                declared: 13,
                expected: 31,
            }
        );
    }

    #[test]
    fn test_zone_collision_names() {
        let module = Module::ZoneCollision {
            zones: vec!["stage".into(), "wing_left".into()],
        };
        let mut buf = BytesMut::new();
        module.encode(&mut buf);

        let decoded = Module::decode_payload(code::ZONE_COLLISION, &buf[MODULE_HEADER_SIZE..])
            .unwrap()
            .unwrap();
        assert_eq!(decoded, module);
    }

    #[test]
    fn test_zone_collision_truncated_record() {
        // count 2, first name declares 5 bytes but only 2 follow
        let payload = [2u8, 5, b'a', b'b'];
        let err = Module::decode_payload(code::ZONE_COLLISION, &payload).unwrap_err();
        assert!(matches!(err, RttrpmError::Truncated { needed: 5, remaining: 2 }));
    }

    #[test]
    fn test_unknown_type_is_none() {
        assert_eq!(Module::decode_payload(0x7f, &[1, 2, 3]).unwrap(), None);
        assert!(!Module::is_known(0x7f));
        assert!(Module::is_known(code::ZONE_COLLISION));
    }
}
