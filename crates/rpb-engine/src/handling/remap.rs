//! Single-axis X/Y to combined XY position remapping

use dashmap::DashMap;
use rpb_core::{Addressing, MessageData, ObjectId, ProtocolId, ProtocolRole};
use tracing::trace;

use super::bypass::bypass;
use super::{forward_all, DataHandlingStrategy, MessageRouter, RoleMembership, Roles};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Position family: absolute positioning or coordinate mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Positioning,
    Mapping,
}

impl Family {
    fn xy(self) -> ObjectId {
        match self {
            Family::Positioning => ObjectId::PositioningSourcePositionXy,
            Family::Mapping => ObjectId::CoordinateMappingSourcePositionXy,
        }
    }

    fn axis(self, axis: Axis) -> ObjectId {
        match (self, axis) {
            (Family::Positioning, Axis::X) => ObjectId::PositioningSourcePositionX,
            (Family::Positioning, Axis::Y) => ObjectId::PositioningSourcePositionY,
            (Family::Mapping, Axis::X) => ObjectId::CoordinateMappingSourcePositionX,
            (Family::Mapping, Axis::Y) => ObjectId::CoordinateMappingSourcePositionY,
        }
    }
}

fn single_axis(object: ObjectId) -> Option<(Family, Axis)> {
    match object {
        ObjectId::PositioningSourcePositionX => Some((Family::Positioning, Axis::X)),
        ObjectId::PositioningSourcePositionY => Some((Family::Positioning, Axis::Y)),
        ObjectId::CoordinateMappingSourcePositionX => Some((Family::Mapping, Axis::X)),
        ObjectId::CoordinateMappingSourcePositionY => Some((Family::Mapping, Axis::Y)),
        _ => None,
    }
}

fn combined(object: ObjectId) -> Option<Family> {
    match object {
        ObjectId::PositioningSourcePositionXy => Some(Family::Positioning),
        ObjectId::CoordinateMappingSourcePositionXy => Some(Family::Mapping),
        _ => None,
    }
}

/// Cache key: channel in the low 16 bits, record above
pub fn position_key(addressing: Addressing) -> i64 {
    addressing.channel as i64 + ((addressing.record as i64) << 16)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
    x_pending: bool,
    y_pending: bool,
}

/// Merges X and Y from role A into XY for role B and splits XY from role B.
///
/// An XY is emitted once both axes were updated since the last emission, or
/// when an axis repeats before the other one arrived. A lone X (or Y) update
/// is therefore held in the cache, not lost: it reaches role B with the next
/// message for the same address, however late that comes.
pub struct RemapPositionXy {
    roles: Roles,
    positions: DashMap<(Family, i64), Position>,
}

impl RemapPositionXy {
    pub fn new(membership: RoleMembership) -> Self {
        Self {
            roles: Roles::new(membership),
            positions: DashMap::new(),
        }
    }

    /// Merge one axis value; returns the XY to emit, if any
    fn merge(&self, family: Family, axis: Axis, addressing: Addressing, value: f32) -> Option<(f32, f32)> {
        let mut entry = self
            .positions
            .entry((family, position_key(addressing)))
            .or_default();
        let position = entry.value_mut();
        let repeated = match axis {
            Axis::X => {
                position.x = value;
                std::mem::replace(&mut position.x_pending, true)
            }
            Axis::Y => {
                position.y = value;
                std::mem::replace(&mut position.y_pending, true)
            }
        };
        if repeated || (position.x_pending && position.y_pending) {
            position.x_pending = false;
            position.y_pending = false;
            Some((position.x, position.y))
        } else {
            None
        }
    }

    fn split(&self, family: Family, addressing: Addressing, x: f32, y: f32) {
        let mut entry = self
            .positions
            .entry((family, position_key(addressing)))
            .or_default();
        let position = entry.value_mut();
        position.x = x;
        position.y = y;
    }
}

impl DataHandlingStrategy for RemapPositionXy {
    fn mode(&self) -> &'static str {
        "remap_position_xy_to_xy"
    }

    fn set_membership(&self, membership: RoleMembership) {
        self.roles.set(membership);
    }

    fn on_message(
        &self,
        router: &dyn MessageRouter,
        source: ProtocolId,
        object: ObjectId,
        data: &MessageData,
    ) -> bool {
        let roles = self.roles.read();
        let addressing = data.addressing();

        match (roles.role_of(source), single_axis(object), combined(object)) {
            (Some(ProtocolRole::A), Some((family, axis)), _) if !data.is_empty() => {
                let Some(value) = data.float_at(0) else {
                    return false;
                };
                match self.merge(family, axis, addressing, value) {
                    Some((x, y)) => {
                        let xy = MessageData::from_floats(addressing, &[x, y]);
                        forward_all(router, roles.members(ProtocolRole::B), family.xy(), &xy)
                    }
                    None => {
                        trace!("{} {} cached, waiting for other axis", object, addressing);
                        true
                    }
                }
            }
            (Some(ProtocolRole::B), _, Some(family)) if !data.is_empty() => {
                let (Some(x), Some(y)) = (data.float_at(0), data.float_at(1)) else {
                    return false;
                };
                self.split(family, addressing, x, y);
                let x_msg = MessageData::from_floats(addressing, &[x]);
                let y_msg = MessageData::from_floats(addressing, &[y]);
                let destinations = roles.members(ProtocolRole::A);
                let x_ok = forward_all(router, destinations, family.axis(Axis::X), &x_msg);
                let y_ok = forward_all(router, destinations, family.axis(Axis::Y), &y_msg);
                x_ok && y_ok
            }
            _ => bypass(&roles, router, source, object, data),
        }
    }
}
