//! Blocking UDP endpoint shared by the datagram based processors

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{BridgeError, Result, RECV_POLL_TIMEOUT};

/// Largest UDP payload
pub(crate) const MAX_DATAGRAM_SIZE: usize = 65507;

/// Bound socket plus the thread reading from it.
///
/// The receive loop wakes at least every [`RECV_POLL_TIMEOUT`] to check the
/// shutdown flag, so [`UdpEndpoint::close`] returns within one timeout.
pub(crate) struct UdpEndpoint {
    socket: Arc<UdpSocket>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UdpEndpoint {
    /// Bind `0.0.0.0:port` and spawn `name` running `on_datagram` for every
    /// datagram received.
    pub(crate) fn open<F>(name: String, port: u16, mut on_datagram: F) -> Result<Self>
    where
        F: FnMut(&[u8], SocketAddr) + Send + 'static,
    {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|e| BridgeError::ConnectionFailed(format!("bind UDP port {}: {}", port, e)))?;
        socket.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;
        let socket = Arc::new(socket);
        info!("UDP bound to {}", socket.local_addr()?);

        let shutdown = Arc::new(AtomicBool::new(false));
        let recv_socket = Arc::clone(&socket);
        let recv_shutdown = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || {
                let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
                while !recv_shutdown.load(Ordering::Acquire) {
                    match recv_socket.recv_from(&mut buf) {
                        Ok((len, from)) => {
                            if recv_shutdown.load(Ordering::Acquire) {
                                break;
                            }
                            debug!("UDP received {} bytes from {}", len, from);
                            on_datagram(&buf[..len], from);
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                            ) => {}
                        // ICMP port unreachable from an earlier send surfaces here on some platforms
                        Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                            debug!("UDP peer unreachable: {}", e);
                        }
                        Err(e) => {
                            error!("UDP receive error: {}", e);
                            thread::sleep(RECV_POLL_TIMEOUT);
                        }
                    }
                }
                debug!("UDP receive loop finished");
            })?;

        Ok(Self {
            socket,
            shutdown,
            handle: Some(handle),
        })
    }

    pub(crate) fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Shared handle for threads that only send
    pub(crate) fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    pub(crate) fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        self.socket
            .send_to(data, target)
            .map_err(|e| BridgeError::Send(format!("{} to {}", e, target)))?;
        Ok(())
    }

    /// Signal the receive loop and wait for it to exit.
    ///
    /// Once this returns the datagram callback will not run again. Called from
    /// the receive thread itself it only signals, since joining would never
    /// complete.
    pub(crate) fn close(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                warn!("UDP endpoint closed from its own receive thread");
                return;
            }
            if handle.join().is_err() {
                error!("UDP receive thread panicked");
            }
        }
    }
}

impl Drop for UdpEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
