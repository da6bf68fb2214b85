//! Strategies shared between several receive threads

use parking_lot::Mutex;
use rpb_core::{Addressing, MessageData, ObjectId, ProtocolId};
use rpb_engine::handling::{DeviceSimulation, RemapPositionXy, ValueChangeFilter};
use rpb_engine::{DataHandlingStrategy, MessageRouter, Result, RoleMembership};
use std::sync::Barrier;
use std::thread;

const THREADS: usize = 8;
const ROUNDS: usize = 200;

#[derive(Default)]
struct RecordingRouter {
    sent: Mutex<Vec<(ProtocolId, ObjectId, MessageData)>>,
}

impl RecordingRouter {
    fn take(&self) -> Vec<(ProtocolId, ObjectId, MessageData)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl MessageRouter for RecordingRouter {
    fn send_to(&self, destination: ProtocolId, object: ObjectId, data: &MessageData) -> Result<()> {
        self.sent.lock().push((destination, object, data.clone()));
        Ok(())
    }
}

fn membership() -> RoleMembership {
    RoleMembership::new(vec![ProtocolId(1)], vec![ProtocolId(2)])
}

/// Run `work(thread_index)` on every thread, released together
fn run_together<F>(work: F)
where
    F: Fn(usize) + Sync,
{
    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        for index in 0..THREADS {
            let barrier = &barrier;
            let work = &work;
            scope.spawn(move || {
                barrier.wait();
                work(index);
            });
        }
    });
}

#[test]
fn test_filter_forwards_a_shared_value_once() {
    let filter = ValueChangeFilter::new(0.1, membership());
    let router = RecordingRouter::default();
    let gain = MessageData::from_floats(Addressing::channel(3), &[-12.0]);

    run_together(|_| {
        for _ in 0..ROUNDS {
            assert!(filter.on_message(&router, ProtocolId(1), ObjectId::MatrixInputGain, &gain));
        }
    });

    let sent = router.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ProtocolId(2));
    assert_eq!(sent[0].2.floats().unwrap(), vec![-12.0]);
}

#[test]
fn test_filter_keys_stay_independent_across_threads() {
    let filter = ValueChangeFilter::new(0.1, membership());
    let router = RecordingRouter::default();

    run_together(|_| {
        for round in 0..ROUNDS {
            let channel = (round % 16) as i32 + 1;
            let mute = MessageData::from_ints(Addressing::channel(channel), &[1]);
            filter.on_message(&router, ProtocolId(1), ObjectId::MatrixInputMute, &mute);
        }
    });

    let mut channels: Vec<_> = router
        .take()
        .into_iter()
        .map(|(_, _, data)| data.addressing().channel)
        .collect();
    channels.sort_unstable();
    assert_eq!(channels, (1..=16).collect::<Vec<_>>());
}

#[test]
fn test_remap_merges_only_sent_values() {
    let remap = RemapPositionXy::new(membership());
    let router = RecordingRouter::default();
    let address = Addressing::channel(5);
    let x_of = |index: usize| index as f32 * 0.125;
    let y_of = |index: usize| 10.0 + index as f32 * 0.125;

    // seed the cache so no axis is ever read before it was written
    let seed_x = MessageData::from_floats(address, &[x_of(THREADS)]);
    let seed_y = MessageData::from_floats(address, &[y_of(THREADS)]);
    remap.on_message(&router, ProtocolId(1), ObjectId::PositioningSourcePositionX, &seed_x);
    remap.on_message(&router, ProtocolId(1), ObjectId::PositioningSourcePositionY, &seed_y);
    assert_eq!(router.take().len(), 1);

    run_together(|index| {
        let x = MessageData::from_floats(address, &[x_of(index)]);
        let y = MessageData::from_floats(address, &[y_of(index)]);
        for _ in 0..ROUNDS {
            assert!(remap.on_message(&router, ProtocolId(1), ObjectId::PositioningSourcePositionX, &x));
            assert!(remap.on_message(&router, ProtocolId(1), ObjectId::PositioningSourcePositionY, &y));
        }
    });

    let xs: Vec<f32> = (0..=THREADS).map(x_of).collect();
    let ys: Vec<f32> = (0..=THREADS).map(y_of).collect();
    let sent = router.take();
    // a message that does not emit leaves one axis pending, so the next one emits
    assert!(sent.len() >= THREADS * ROUNDS);
    for (destination, object, data) in &sent {
        assert_eq!(*destination, ProtocolId(2));
        assert_eq!(*object, ObjectId::PositioningSourcePositionXy);
        assert_eq!(data.addressing(), address);
        let values = data.floats().unwrap();
        assert!(xs.contains(&values[0]), "x {} was never sent", values[0]);
        assert!(ys.contains(&values[1]), "y {} was never sent", values[1]);
    }
}

#[test]
fn test_simulation_answers_polls_while_refreshing() {
    let simulation = DeviceSimulation::new(4, 1, 1, membership()).unwrap();
    let router = RecordingRouter::default();

    run_together(|index| {
        let poll = MessageData::empty(Addressing::channel(index as i32 % 4 + 1));
        for _ in 0..ROUNDS {
            assert!(simulation.on_message(
                &router,
                ProtocolId(1),
                ObjectId::PositioningSourcePositionXy,
                &poll
            ));
        }
    });

    let sent = router.take();
    assert_eq!(sent.len(), THREADS * ROUNDS);
    for (destination, _, data) in &sent {
        assert_eq!(*destination, ProtocolId(1));
        for value in data.floats().unwrap() {
            assert!((0.0..=1.0).contains(&value));
        }
    }
}
