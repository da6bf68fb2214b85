//! Value change filtering

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rpb_core::{Addressing, MessageData, ObjectId, ProtocolId, ValueType};
use std::hash::Hash;
use tracing::trace;

use super::bypass::bypass;
use super::{DataHandlingStrategy, MessageRouter, RoleMembership, Roles};

/// Whether `new` differs from `old` by at least one precision step.
///
/// Shape changes (type, count, payload size) always count as a change, as do
/// strings and value-less messages. A precision of zero disables filtering.
pub fn is_changed(old: &MessageData, new: &MessageData, precision: f32) -> bool {
    if old.value_type() != new.value_type()
        || old.value_count() != new.value_count()
        || old.payload_size() != new.payload_size()
    {
        return true;
    }
    if precision <= 0.0 {
        return true;
    }
    match new.value_type() {
        ValueType::Int | ValueType::Float => {
            let step = precision as f64;
            old.numeric_values()
                .iter()
                .zip(new.numeric_values())
                .any(|(o, n)| (o / step).floor() != (n / step).floor())
        }
        ValueType::String | ValueType::None => true,
    }
}

/// Last forwarded value per key, sharded for concurrent receive threads
pub struct ValueCache<K: Eq + Hash> {
    precision: f32,
    last: DashMap<K, MessageData>,
}

impl<K: Eq + Hash> ValueCache<K> {
    pub fn new(precision: f32) -> Self {
        Self {
            precision,
            last: DashMap::new(),
        }
    }

    pub fn precision(&self) -> f32 {
        self.precision
    }

    /// Record `data` under `key` if it changed; true when it should be forwarded
    pub fn update(&self, key: K, data: &MessageData) -> bool {
        match self.last.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(data.clone());
                true
            }
            Entry::Occupied(mut entry) => {
                if is_changed(entry.get(), data, self.precision) {
                    entry.insert(data.clone());
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    pub fn clear(&self) {
        self.last.clear();
    }
}

/// Bypass forwarding limited to values that changed
pub struct ValueChangeFilter {
    roles: Roles,
    cache: ValueCache<(ObjectId, Addressing)>,
}

impl ValueChangeFilter {
    pub fn new(precision: f32, membership: RoleMembership) -> Self {
        Self {
            roles: Roles::new(membership),
            cache: ValueCache::new(precision),
        }
    }
}

impl DataHandlingStrategy for ValueChangeFilter {
    fn mode(&self) -> &'static str {
        "value_change_filter"
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
        if !self.cache.update((object, data.addressing()), data) {
            trace!("{} {} unchanged, filtered", object, data.addressing());
            return true;
        }
        bypass(&self.roles.read(), router, source, object, data)
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
    fn test_same_value_forwarded_once() {
        let strategy = ValueChangeFilter::new(0.5, membership(&[1], &[2]));
        let router = RecordingRouter::default();

        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(1, 1.0));
        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(1, 1.0));
        assert_eq!(router.take().len(), 1);
    }

    #[test]
    fn test_change_below_precision_filtered() {
        let strategy = ValueChangeFilter::new(0.5, membership(&[1], &[2]));
        let router = RecordingRouter::default();

        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(1, 1.0));
        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(1, 1.25));
        assert_eq!(router.take().len(), 1);

        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(1, 1.5));
        assert_eq!(router.take().len(), 1);
    }

    #[test]
    fn test_first_value_per_key_forwarded() {
        let strategy = ValueChangeFilter::new(0.5, membership(&[1], &[2]));
        let router = RecordingRouter::default();

        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(1, 1.0));
        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain(2, 1.0));
        strategy.on_message(&router, ProtocolId(1), ObjectId::MatrixOutputGain, &gain(1, 1.0));
        assert_eq!(router.take().len(), 3);
    }

    #[test]
    fn test_zero_precision_always_forwards() {
        let a = gain(1, 1.0);
        assert!(is_changed(&a, &a, 0.0));
    }

    #[test]
    fn test_shape_and_strings_count_as_changed() {
        let one = MessageData::from_floats(Addressing::channel(1), &[1.0]);
        let two = MessageData::from_floats(Addressing::channel(1), &[1.0, 1.0]);
        assert!(is_changed(&one, &two, 1.0));

        let name = MessageData::from_string(Addressing::channel(1), "Kick");
        assert!(is_changed(&name, &name, 1.0));

        let ints = MessageData::from_ints(Addressing::channel(1), &[3]);
        assert!(!is_changed(&ints, &ints, 1.0));
        assert!(is_changed(&ints, &MessageData::from_ints(Addressing::channel(1), &[4]), 1.0));
    }

    #[test]
    fn test_negative_values_floor_toward_minus_infinity() {
        // -0.25 and 0.25 straddle zero: different buckets
        assert!(is_changed(&gain(1, -0.25), &gain(1, 0.25), 0.5));
        assert!(!is_changed(&gain(1, -0.75), &gain(1, -0.6), 0.5));
    }
}
