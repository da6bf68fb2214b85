//! Periodic polling of active objects

use crossbeam_channel::{bounded, select, tick, Sender};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// Thread sending a fixed set of pre-encoded poll datagrams every interval
pub(crate) struct Poller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub(crate) fn spawn(
        name: String,
        interval: Duration,
        socket: Arc<UdpSocket>,
        target: SocketAddr,
        polls: Vec<Vec<u8>>,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::Builder::new().name(name).spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        for poll in &polls {
                            if let Err(e) = socket.send_to(poll, target) {
                                debug!("Poll to {} failed: {}", target, e);
                            }
                        }
                    }
                }
            }
        })?;
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(&mut self) {
        // disconnecting the channel wakes the select
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
