//! Channel multiplexing between protocol groups
//!
//! The processors of each role are treated as contiguous blocks of channels:
//! the n-th role A processor covers channels `n * a_count ..` of the absolute
//! channel space, likewise for role B with `b_count`. A message is moved to
//! the processor and channel of the opposite role covering the same absolute
//! channel.
//!
//! Two arithmetics exist. [`mux_target`] is 0-based and invertible.
//! [`filtered_mux_target`] divides by `block + 1` and wraps a zero remainder to
//! `block`; it is used by [`MuxChannelsWithFilter`] and only agrees with the
//! plain variant for 1-based channels inside the first two blocks.

use rpb_core::{Addressing, MessageData, ObjectId, ProtocolId, ProtocolRole};
use tracing::{debug, trace};

use super::bypass::bypass;
use super::filter::ValueCache;
use super::{send_logged, DataHandlingStrategy, MessageRouter, RoleMembership, Roles};

/// Destination (processor index, channel) for the plain mux
pub fn mux_target(
    source_index: usize,
    channel: i32,
    source_block: u16,
    dest_block: u16,
) -> Option<(usize, i32)> {
    let absolute = absolute_channel(source_index, channel, source_block, dest_block)?;
    let dest_block = dest_block as i64;
    Some(((absolute / dest_block) as usize, (absolute % dest_block) as i32))
}

/// Destination (processor index, channel) for the filtered mux
pub fn filtered_mux_target(
    source_index: usize,
    channel: i32,
    source_block: u16,
    dest_block: u16,
) -> Option<(usize, i32)> {
    let absolute = absolute_channel(source_index, channel, source_block, dest_block)?;
    let dest_block = dest_block as i64;
    let index = absolute / (dest_block + 1);
    let mut dest_channel = absolute % dest_block;
    if dest_channel == 0 {
        dest_channel = dest_block;
    }
    Some((index as usize, dest_channel as i32))
}

fn absolute_channel(source_index: usize, channel: i32, source_block: u16, dest_block: u16) -> Option<i64> {
    if source_block == 0 || dest_block == 0 || channel < 0 {
        return None;
    }
    Some(source_index as i64 * source_block as i64 + channel as i64)
}

type TargetFn = fn(usize, i32, u16, u16) -> Option<(usize, i32)>;

/// Resolve the destination of one message, or `None` with the reason logged
fn resolve(
    membership: &RoleMembership,
    source: ProtocolId,
    addressing: Addressing,
    counts: (u16, u16),
    target: TargetFn,
) -> Option<(ProtocolId, Addressing)> {
    let (role, index) = membership.locate(source)?;
    let (source_block, dest_block) = match role {
        ProtocolRole::A => counts,
        ProtocolRole::B => (counts.1, counts.0),
    };
    let (dest_index, dest_channel) = target(index, addressing.channel, source_block, dest_block)?;
    match membership.members(role.opposite()).get(dest_index) {
        Some(dest) => Some((*dest, addressing.with_channel(dest_channel))),
        None => {
            debug!(
                "{} channel {} maps to missing {:?} processor #{}",
                source,
                addressing.channel,
                role.opposite(),
                dest_index
            );
            None
        }
    }
}

pub struct MuxChannels {
    a_channel_count: u16,
    b_channel_count: u16,
    roles: Roles,
}

impl MuxChannels {
    pub fn new(a_channel_count: u16, b_channel_count: u16, membership: RoleMembership) -> Self {
        Self {
            a_channel_count,
            b_channel_count,
            roles: Roles::new(membership),
        }
    }
}

impl DataHandlingStrategy for MuxChannels {
    fn mode(&self) -> &'static str {
        "mux_channels"
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
        // channel-less objects are global to the device
        if !data.addressing().has_channel() {
            return bypass(&roles, router, source, object, data);
        }
        let counts = (self.a_channel_count, self.b_channel_count);
        match resolve(&roles, source, data.addressing(), counts, mux_target) {
            Some((dest, addressing)) => {
                send_logged(router, dest, object, &data.with_addressing(addressing))
            }
            None => false,
        }
    }
}

/// Mux combined with a value change filter on the outgoing side
pub struct MuxChannelsWithFilter {
    a_channel_count: u16,
    b_channel_count: u16,
    roles: Roles,
    cache: ValueCache<(ProtocolId, ObjectId, Addressing)>,
}

impl MuxChannelsWithFilter {
    pub fn new(
        a_channel_count: u16,
        b_channel_count: u16,
        precision: f32,
        membership: RoleMembership,
    ) -> Self {
        Self {
            a_channel_count,
            b_channel_count,
            roles: Roles::new(membership),
            cache: ValueCache::new(precision),
        }
    }
}

impl DataHandlingStrategy for MuxChannelsWithFilter {
    fn mode(&self) -> &'static str {
        "mux_channels_with_filter"
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
        let (dest, addressing) = if data.addressing().has_channel() {
            let counts = (self.a_channel_count, self.b_channel_count);
            match resolve(&roles, source, data.addressing(), counts, filtered_mux_target) {
                Some(found) => found,
                None => return false,
            }
        } else {
            // channel-less objects are global; filter per destination then bypass
            let Some(role) = roles.role_of(source) else {
                return false;
            };
            return roles.members(role.opposite()).iter().fold(true, |ok, dest| {
                let sent = if self.cache.update((*dest, object, data.addressing()), data) {
                    send_logged(router, *dest, object, data)
                } else {
                    true
                };
                sent && ok
            });
        };

        let out = data.with_addressing(addressing);
        if !self.cache.update((dest, object, addressing), &out) {
            trace!("{} {} unchanged for {}, filtered", object, addressing, dest);
            return true;
        }
        send_logged(router, dest, object, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn gain(channel: i32, value: f32) -> MessageData {
        MessageData::from_floats(Addressing::channel(channel), &[value])
    }

    #[test]
    fn test_plain_arithmetic() {
        // A blocks of 8, B blocks of 4
        assert_eq!(mux_target(0, 3, 8, 4), Some((0, 3)));
        assert_eq!(mux_target(0, 5, 8, 4), Some((1, 1)));
        assert_eq!(mux_target(1, 2, 8, 4), Some((2, 2)));
        assert_eq!(mux_target(0, 1, 0, 4), None);
        assert_eq!(mux_target(0, -1, 8, 4), None);
    }

    #[test]
    fn test_filtered_arithmetic_contract() {
        // first block: 1-based channels map onto themselves
        assert_eq!(filtered_mux_target(0, 1, 4, 4), Some((0, 1)));
        assert_eq!(filtered_mux_target(0, 4, 4, 4), Some((0, 4)));
        // second block wraps to 1-based channels of processor 1
        assert_eq!(filtered_mux_target(1, 1, 4, 4), Some((1, 1)));
        assert_eq!(filtered_mux_target(1, 4, 4, 4), Some((1, 4)));
        // third block lands on processor 1 again (abs 9 / 5)
        assert_eq!(filtered_mux_target(2, 1, 4, 4), Some((1, 1)));
        // differs from the plain variant at block boundaries
        assert_ne!(
            filtered_mux_target(0, 4, 4, 4),
            mux_target(0, 4, 4, 4)
        );
    }

    #[test]
    fn test_mux_routes_to_block_owner() {
        let strategy = MuxChannels::new(8, 4, membership(&[1], &[10, 11]));
        let router = RecordingRouter::default();

        assert!(strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(6, 0.5)));
        let sent = router.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ProtocolId(11));
        assert_eq!(sent[0].2.addressing(), Addressing::channel(2));

        // B back to A
        assert!(strategy.on_message(&router, ProtocolId(11), ObjectId::MatrixInputGain, &gain(2, 0.5)));
        let sent = router.take();
        assert_eq!(sent[0].0, ProtocolId(1));
        assert_eq!(sent[0].2.addressing(), Addressing::channel(6));
    }

    #[test]
    fn test_mux_out_of_range_fails() {
        let strategy = MuxChannels::new(8, 4, membership(&[1], &[10]));
        let router = RecordingRouter::default();
        assert!(!strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(7, 0.5)));
        assert!(router.take().is_empty());
    }

    #[test]
    fn test_mux_keeps_record() {
        let strategy = MuxChannels::new(4, 4, membership(&[1, 2], &[10, 11]));
        let router = RecordingRouter::default();
        let data = MessageData::from_floats(Addressing::new(1, 3), &[0.1, 0.2]);
        strategy.on_message(&router, ProtocolId(2), ObjectId::CoordinateMappingSourcePositionXy, &data);
        let sent = router.take();
        assert_eq!(sent[0].0, ProtocolId(11));
        assert_eq!(sent[0].2.addressing(), Addressing::new(1, 3));
    }

    #[test]
    fn test_mux_with_filter_drops_repeats() {
        let strategy = MuxChannelsWithFilter::new(4, 4, 0.5, membership(&[1, 2], &[10, 11]));
        let router = RecordingRouter::default();

        assert!(strategy.on_message(&router, ProtocolId(2), ObjectId::MatrixInputGain, &gain(2, 1.0)));
        assert!(strategy.on_message(&router, ProtocolId(2), ObjectId::MatrixInputGain, &gain(2, 1.0)));
        let sent = router.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ProtocolId(11));
        assert_eq!(sent[0].2.addressing(), Addressing::channel(2));
    }

    #[test]
    fn test_channel_less_objects_bypass() {
        let strategy = MuxChannels::new(4, 4, membership(&[1], &[10, 11]));
        let router = RecordingRouter::default();
        let data = MessageData::from_ints(Addressing::NONE, &[2]);
        assert!(strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixSettingsReverbRoomId, &data));
        assert_eq!(router.take().len(), 2);
    }
}
