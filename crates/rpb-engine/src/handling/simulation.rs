//! Simulated device answering polls from a live value grid

use crossbeam_channel::{bounded, select, tick, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use rpb_core::{Addressing, MessageData, ObjectId, ProtocolId, ValueType};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace};

use super::bypass::bypass;
use super::{send_logged, DataHandlingStrategy, MessageRouter, RoleMembership, Roles};
use crate::{EngineError, Result};

/// Phase advance per refresh tick, in radians
const PHASE_STEP: f32 = 0.05;

/// Whether an empty message for `object` is a poll the simulation answers
pub fn answers_poll(object: ObjectId) -> bool {
    object == ObjectId::HeartbeatPing
        || object.is_position()
        || matches!(
            object,
            ObjectId::PositioningSourceSpread
                | ObjectId::PositioningSourceDelayMode
                | ObjectId::MatrixInputReverbSendGain
        )
}

/// Current value of every simulated (object, addressing) pair
pub struct SimulationGrid {
    channel_count: u16,
    mapping_count: u16,
    phase: Mutex<f32>,
    values: DashMap<(ObjectId, Addressing), MessageData>,
}

impl SimulationGrid {
    pub fn new(channel_count: u16, mapping_count: u16) -> Self {
        let grid = Self {
            channel_count,
            mapping_count,
            phase: Mutex::new(0.0),
            values: DashMap::new(),
        };
        grid.write_values(0.0);
        grid
    }

    /// Every address simulated for `object`
    pub fn addresses(&self, object: ObjectId) -> Vec<Addressing> {
        if !object.needs_channel() {
            return vec![Addressing::NONE];
        }
        let channels = 1..=self.channel_count as i32;
        if object.needs_record() {
            channels
                .flat_map(|channel| {
                    (1..=self.mapping_count as i32).map(move |record| Addressing::new(channel, record))
                })
                .collect()
        } else {
            channels.map(Addressing::channel).collect()
        }
    }

    pub fn value(&self, object: ObjectId, addressing: Addressing) -> Option<MessageData> {
        self.values.get(&(object, addressing)).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn phase(&self) -> f32 {
        *self.phase.lock()
    }

    /// Advance the phase one step and rewrite every value
    pub fn advance(&self) {
        let phase = {
            let mut phase = self.phase.lock();
            *phase = (*phase + PHASE_STEP) % std::f32::consts::TAU;
            *phase
        };
        self.write_values(phase);
    }

    fn write_values(&self, phase: f32) {
        for object in ObjectId::bridgeable() {
            for addressing in self.addresses(object) {
                if let Some(data) = simulated_value(object, addressing, phase) {
                    self.values.insert((object, addressing), data);
                }
            }
        }
    }
}

fn simulated_value(object: ObjectId, addressing: Addressing, phase: f32) -> Option<MessageData> {
    let angle = phase + addressing.channel.max(0) as f32;
    let data = match object.value_type() {
        ValueType::None => return None,
        ValueType::String => match object {
            ObjectId::MatrixInputChannelName | ObjectId::MatrixOutputChannelName => {
                MessageData::from_string(addressing, &format!("Channel {}", addressing.channel))
            }
            _ => MessageData::from_string(addressing, "Simulated device"),
        },
        ValueType::Int => {
            let step = (angle / PHASE_STEP) as i32;
            let value = if object == ObjectId::PositioningSourceDelayMode {
                step.rem_euclid(3)
            } else {
                step.rem_euclid(2)
            };
            MessageData::from_ints(addressing, &[value])
        }
        ValueType::Float => {
            let x = 0.5 + 0.5 * angle.sin();
            let y = 0.5 + 0.5 * angle.cos();
            match object {
                ObjectId::PositioningSourcePositionY | ObjectId::CoordinateMappingSourcePositionY => {
                    MessageData::from_floats(addressing, &[y])
                }
                ObjectId::PositioningSourcePositionXy | ObjectId::CoordinateMappingSourcePositionXy => {
                    MessageData::from_floats(addressing, &[x, y])
                }
                ObjectId::PositioningSourcePosition | ObjectId::CoordinateMappingSourcePosition => {
                    MessageData::from_floats(addressing, &[x, y, 0.0])
                }
                _ if object.is_position() => MessageData::from_floats(addressing, &[x]),
                _ => MessageData::from_floats(addressing, &[angle.sin()]),
            }
        }
    };
    Some(data)
}

struct Refresher {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Simulation refresh thread panicked");
            }
        }
    }
}

/// Answers polls with simulated values and bypasses everything else
pub struct DeviceSimulation {
    roles: Roles,
    grid: Arc<SimulationGrid>,
    _refresher: Refresher,
}

impl DeviceSimulation {
    pub fn new(
        channel_count: u16,
        mapping_count: u16,
        refresh_interval_ms: u64,
        membership: RoleMembership,
    ) -> Result<Self> {
        let grid = Arc::new(SimulationGrid::new(channel_count, mapping_count));
        let interval = Duration::from_millis(refresh_interval_ms.max(1));

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let refreshed = Arc::clone(&grid);
        let handle = thread::Builder::new()
            .name("rpb-simulation".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => refreshed.advance(),
                    }
                }
            })
            .map_err(|e| EngineError::Routing(format!("failed to spawn simulation thread: {}", e)))?;

        debug!(
            "Simulating {} channels x {} mappings ({} values)",
            channel_count,
            mapping_count,
            grid.len()
        );
        Ok(Self {
            roles: Roles::new(membership),
            grid,
            _refresher: Refresher {
                stop: Some(stop_tx),
                handle: Some(handle),
            },
        })
    }

    pub fn grid(&self) -> &SimulationGrid {
        &self.grid
    }
}

impl DataHandlingStrategy for DeviceSimulation {
    fn mode(&self) -> &'static str {
        "device_simulation"
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
        if !data.is_empty() || !answers_poll(object) {
            return bypass(&self.roles.read(), router, source, object, data);
        }
        if self.roles.read().role_of(source).is_none() {
            return false;
        }

        if object == ObjectId::HeartbeatPing {
            let pong = MessageData::empty(Addressing::NONE);
            return send_logged(router, source, ObjectId::HeartbeatPong, &pong);
        }

        match self.grid.value(object, data.addressing()) {
            Some(value) => send_logged(router, source, object, &value),
            None => {
                trace!("No simulated {} at {}", object, data.addressing());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn simulation() -> DeviceSimulation {
        DeviceSimulation::new(4, 2, 10_000, membership(&[1], &[2])).unwrap()
    }

    #[test]
    fn test_grid_covers_addresses() {
        let grid = SimulationGrid::new(4, 2);
        assert_eq!(grid.addresses(ObjectId::MatrixInputGain).len(), 4);
        assert_eq!(grid.addresses(ObjectId::CoordinateMappingSourcePositionXy).len(), 8);
        assert_eq!(grid.addresses(ObjectId::MatrixSettingsReverbRoomId), vec![Addressing::NONE]);
        assert!(grid.value(ObjectId::HeartbeatPing, Addressing::NONE).is_none());
        assert!(grid
            .value(ObjectId::CoordinateMappingSourcePositionXy, Addressing::new(4, 2))
            .is_some());
    }

    #[test]
    fn test_advance_changes_positions() {
        let grid = SimulationGrid::new(2, 1);
        let address = Addressing::channel(1);
        let before = grid.value(ObjectId::PositioningSourcePositionXy, address).unwrap();
        grid.advance();
        let after = grid.value(ObjectId::PositioningSourcePositionXy, address).unwrap();
        assert!(grid.phase() > 0.0);
        assert_ne!(before.payload(), after.payload());
        for v in after.floats().unwrap() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_delay_mode_in_range() {
        let grid = SimulationGrid::new(16, 1);
        for _ in 0..20 {
            grid.advance();
            for address in grid.addresses(ObjectId::PositioningSourceDelayMode) {
                let mode = grid
                    .value(ObjectId::PositioningSourceDelayMode, address)
                    .and_then(|v| v.int_at(0))
                    .unwrap();
                assert!((0..3).contains(&mode));
            }
        }
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let sim = simulation();
        let router = RecordingRouter::default();
        assert!(sim.on_message(&router, ProtocolId(2), ObjectId::HeartbeatPing, &MessageData::empty(Addressing::NONE)));
        let sent = router.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ProtocolId(2));
        assert_eq!(sent[0].1, ObjectId::HeartbeatPong);
        assert!(sent[0].2.is_empty());
    }

    #[test]
    fn test_position_poll_answered_to_sender() {
        let sim = simulation();
        let router = RecordingRouter::default();
        let poll = MessageData::empty(Addressing::new(3, 1));
        assert!(sim.on_message(&router, ProtocolId(1), ObjectId::CoordinateMappingSourcePositionXy, &poll));
        let sent = router.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ProtocolId(1));
        assert_eq!(sent[0].2.value_count(), 2);
        assert_eq!(sent[0].2.addressing(), Addressing::new(3, 1));
    }

    #[test]
    fn test_poll_outside_grid_fails() {
        let sim = simulation();
        let router = RecordingRouter::default();
        let poll = MessageData::empty(Addressing::channel(99));
        assert!(!sim.on_message(&router, ProtocolId(1), ObjectId::PositioningSourceSpread, &poll));
        assert!(router.take().is_empty());
    }

    #[test]
    fn test_values_and_other_polls_bypass() {
        let sim = simulation();
        let router = RecordingRouter::default();
        let gain = MessageData::from_floats(Addressing::channel(1), &[-3.0]);
        assert!(sim.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain));
        let poll = MessageData::empty(Addressing::channel(1));
        assert!(sim.on_message(&router, ProtocolId(2), ObjectId::MatrixOutputGain, &poll));
        let sent = router.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, ProtocolId(2));
        assert_eq!(sent[1].0, ProtocolId(1));
    }

    #[test]
    fn test_refresh_thread_stops_on_drop() {
        let sim = DeviceSimulation::new(1, 1, 1, RoleMembership::default()).unwrap();
        let start = sim.grid().phase();
        std::thread::sleep(Duration::from_millis(50));
        assert_ne!(sim.grid().phase(), start);
        drop(sim);
    }
}
