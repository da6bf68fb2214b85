//! MIDI input processor
//!
//! MIDI is observed, not bridged: incoming events are decoded and traced,
//! and `send` is unsupported. The midir connection is not `Send`, so it lives
//! on a dedicated thread for the lifetime of the processor run.

use parking_lot::Mutex;
use rpb_core::{ConfigError, MessageData, ObjectId, ProtocolConfig, ProtocolId, ProtocolRole, ProtocolType};
use std::fmt;
use std::thread::JoinHandle;
use tracing::info;

use crate::{BridgeError, ProtocolProcessor, Result};

/// Decoded channel voice or realtime message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
    /// Centered: -8192..=8191
    PitchBend { channel: u8, value: i16 },
    Clock,
    Start,
    Continue,
    Stop,
}

impl MidiEvent {
    /// Decode one message; `None` for kinds not tracked (sysex, aftertouch, ...)
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;
        let event = match status {
            0xF8 => MidiEvent::Clock,
            0xFA => MidiEvent::Start,
            0xFB => MidiEvent::Continue,
            0xFC => MidiEvent::Stop,
            _ => match (status & 0xF0, data) {
                (0x80, [note, velocity, ..]) => MidiEvent::NoteOff {
                    channel,
                    note: *note,
                    velocity: *velocity,
                },
                // note on with zero velocity is a note off
                (0x90, [note, 0, ..]) => MidiEvent::NoteOff {
                    channel,
                    note: *note,
                    velocity: 0,
                },
                (0x90, [note, velocity, ..]) => MidiEvent::NoteOn {
                    channel,
                    note: *note,
                    velocity: *velocity,
                },
                (0xB0, [controller, value, ..]) => MidiEvent::ControlChange {
                    channel,
                    controller: *controller,
                    value: *value,
                },
                (0xC0, [program, ..]) => MidiEvent::ProgramChange {
                    channel,
                    program: *program,
                },
                (0xD0, [pressure, ..]) => MidiEvent::ChannelPressure {
                    channel,
                    pressure: *pressure,
                },
                (0xE0, [lsb, msb, ..]) => MidiEvent::PitchBend {
                    channel,
                    value: ((((*msb & 0x7F) as i16) << 7) | (*lsb & 0x7F) as i16) - 8192,
                },
                _ => return None,
            },
        };
        Some(event)
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiEvent::NoteOff { channel, note, velocity } => {
                write!(f, "note off ch{} {} vel {}", channel + 1, note, velocity)
            }
            MidiEvent::NoteOn { channel, note, velocity } => {
                write!(f, "note on ch{} {} vel {}", channel + 1, note, velocity)
            }
            MidiEvent::ControlChange { channel, controller, value } => {
                write!(f, "cc ch{} #{} = {}", channel + 1, controller, value)
            }
            MidiEvent::ProgramChange { channel, program } => {
                write!(f, "program ch{} {}", channel + 1, program)
            }
            MidiEvent::ChannelPressure { channel, pressure } => {
                write!(f, "pressure ch{} {}", channel + 1, pressure)
            }
            MidiEvent::PitchBend { channel, value } => {
                write!(f, "pitch bend ch{} {}", channel + 1, value)
            }
            MidiEvent::Clock => f.write_str("clock"),
            MidiEvent::Start => f.write_str("start"),
            MidiEvent::Continue => f.write_str("continue"),
            MidiEvent::Stop => f.write_str("stop"),
        }
    }
}

/// Names of the host's MIDI input ports
#[cfg(feature = "midi")]
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = midir::MidiInput::new("rpb MIDI scanner")
        .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

#[cfg(not(feature = "midi"))]
pub fn list_input_ports() -> Result<Vec<String>> {
    Err(BridgeError::Unsupported("built without MIDI support".into()))
}

struct Worker {
    // dropping the sender releases the connection thread
    stop: crossbeam_channel::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct MidiProcessor {
    config: ProtocolConfig,
    worker: Mutex<Option<Worker>>,
}

impl MidiProcessor {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        if config.protocol_type != ProtocolType::Midi {
            return Err(BridgeError::Config(ConfigError::invalid(
                config.id.to_string(),
                "type",
                format!("expected MIDI, got {}", config.protocol_type),
            )));
        }
        config.validate()?;
        Ok(Self {
            config,
            worker: Mutex::new(None),
        })
    }

    #[cfg(feature = "midi")]
    fn spawn_worker(&self) -> Result<Worker> {
        use crossbeam_channel::bounded;
        use midir::{Ignore, MidiInput};
        use tracing::debug;

        let id = self.config.id;
        let device = self.config.input_device.clone();
        let (ready_tx, ready_rx) = bounded::<Result<String>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = std::thread::Builder::new()
            .name(format!("midi-{}", id.0))
            .spawn(move || {
                let mut midi_in = match MidiInput::new("rpb MIDI input") {
                    Ok(m) => m,
                    Err(e) => {
                        let _ = ready_tx.send(Err(BridgeError::ConnectionFailed(e.to_string())));
                        return;
                    }
                };
                midi_in.ignore(Ignore::Sysex | Ignore::ActiveSense);

                let ports = midi_in.ports();
                let port = match device.as_deref() {
                    Some(wanted) => ports.into_iter().find(|p| {
                        midi_in
                            .port_name(p)
                            .map(|name| name.contains(wanted))
                            .unwrap_or(false)
                    }),
                    None => ports.into_iter().next(),
                };
                let Some(port) = port else {
                    let wanted = device.unwrap_or_else(|| "any input".to_string());
                    let _ = ready_tx.send(Err(BridgeError::DeviceNotFound(wanted)));
                    return;
                };
                let port_name = midi_in
                    .port_name(&port)
                    .unwrap_or_else(|_| "Unknown".to_string());

                let _connection = match midi_in.connect(
                    &port,
                    "rpb-midi",
                    move |stamp, bytes, _| match MidiEvent::parse(bytes) {
                        Some(event) => debug!("{}: MIDI {} @{}us", id, event, stamp),
                        None => debug!("{}: MIDI {:02x?} @{}us", id, bytes, stamp),
                    },
                    (),
                ) {
                    Ok(connection) => connection,
                    Err(e) => {
                        let _ = ready_tx.send(Err(BridgeError::ConnectionFailed(e.to_string())));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(port_name));
                // returns once the processor drops the sender
                let _ = stop_rx.recv();
            })?;

        match ready_rx.recv_timeout(std::time::Duration::from_secs(2)) {
            Ok(Ok(port_name)) => {
                info!("{}: MIDI input opened on {}", id, port_name);
                Ok(Worker {
                    stop: stop_tx,
                    handle,
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                drop(stop_tx);
                let _ = handle.join();
                Err(BridgeError::ConnectionFailed(
                    "MIDI input did not open in time".into(),
                ))
            }
        }
    }

    #[cfg(not(feature = "midi"))]
    fn spawn_worker(&self) -> Result<Worker> {
        Err(BridgeError::Unsupported("built without MIDI support".into()))
    }
}

impl ProtocolProcessor for MidiProcessor {
    fn id(&self) -> ProtocolId {
        self.config.id
    }

    fn role(&self) -> ProtocolRole {
        self.config.role
    }

    fn protocol_type(&self) -> ProtocolType {
        ProtocolType::Midi
    }

    fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn apply_config(&mut self, config: &ProtocolConfig) -> Result<()> {
        crate::traits::check_config(&self.config, config)?;
        self.config = config.clone();
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }
        *worker = Some(self.spawn_worker()?);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        if let Some(Worker { stop, handle }) = worker {
            drop(stop);
            let _ = handle.join();
            info!("{}: MIDI input closed", self.config.id);
        }
        Ok(())
    }

    fn send(&self, object: ObjectId, _data: &MessageData) -> Result<()> {
        Err(BridgeError::Unsupported(format!(
            "MIDI output is not bridged, cannot send {}",
            object
        )))
    }

    fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Drop for MidiProcessor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
