//! Common test helpers for the bridge crates
//!
//! - UDP port allocation
//! - Condition-based waiting (no hardcoded sleeps)
//! - An OSC peer socket standing in for a remote device
//! - A thread-safe collector for callback-driven assertions

use parking_lot::Mutex;
use rosc::{OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available UDP port for testing
pub fn find_available_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Poll `check` until it holds or `max_wait` elapses
pub fn wait_for<F>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        thread::sleep(interval);
    }
    check()
}

/// Wait for an atomic counter to reach a target value
pub fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || counter.load(Ordering::SeqCst) >= target,
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
}

/// Wait for a boolean flag to become true
pub fn wait_for_flag(flag: &AtomicBool, max_wait: Duration) -> bool {
    wait_for(|| flag.load(Ordering::SeqCst), DEFAULT_CHECK_INTERVAL, max_wait)
}

// ============================================================================
// OSC Peer
// ============================================================================

/// Loopback UDP socket playing the remote OSC device
pub struct OscPeer {
    socket: UdpSocket,
}

impl OscPeer {
    pub fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(DEFAULT_CHECK_INTERVAL))
            .unwrap();
        Self { socket }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    /// Send one OSC message to `127.0.0.1:port`
    pub fn send(&self, port: u16, addr: &str, args: Vec<OscType>) {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let bytes = rosc::encoder::encode(&packet).unwrap();
        self.send_raw(port, &bytes);
    }

    /// Send arbitrary bytes to `127.0.0.1:port`
    pub fn send_raw(&self, port: u16, bytes: &[u8]) {
        self.socket.send_to(bytes, ("127.0.0.1", port)).unwrap();
    }

    /// Next OSC message (bundles flattened), or `None` after `max_wait`
    pub fn recv(&self, max_wait: Duration) -> Option<(OscMessage, SocketAddr)> {
        let start = Instant::now();
        let mut buf = [0u8; 65536];
        while start.elapsed() < max_wait {
            if let Ok((len, from)) = self.socket.recv_from(&mut buf) {
                if let Ok((_, packet)) = rosc::decoder::decode_udp(&buf[..len]) {
                    if let Some(msg) = first_message(packet) {
                        return Some((msg, from));
                    }
                }
            }
        }
        None
    }

    /// Next message with address `addr`, skipping others
    pub fn recv_addr(&self, addr: &str, max_wait: Duration) -> Option<OscMessage> {
        let start = Instant::now();
        while start.elapsed() < max_wait {
            let remaining = max_wait.saturating_sub(start.elapsed());
            match self.recv(remaining) {
                Some((msg, _)) if msg.addr == addr => return Some(msg),
                Some(_) => continue,
                None => break,
            }
        }
        None
    }

    /// Drain pending datagrams
    pub fn drain(&self) {
        while self.recv(DEFAULT_CHECK_INTERVAL).is_some() {}
    }
}

fn first_message(packet: OscPacket) -> Option<OscMessage> {
    match packet {
        OscPacket::Message(msg) => Some(msg),
        OscPacket::Bundle(bundle) => bundle.content.into_iter().find_map(first_message),
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Thread-safe list of items pushed from callbacks
pub struct Collector<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Collector<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Collector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn count(&self) -> usize {
        self.items.lock().len()
    }

    /// Wait until at least `n` items were collected
    pub fn wait_for_count(&self, n: usize, max_wait: Duration) -> bool {
        wait_for(|| self.count() >= n, DEFAULT_CHECK_INTERVAL, max_wait)
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.items.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_for_times_out() {
        assert!(!wait_for(|| false, Duration::from_millis(5), Duration::from_millis(30)));
        assert!(wait_for(|| true, Duration::from_millis(5), Duration::from_millis(30)));
    }

    #[test]
    fn test_peer_loopback() {
        let a = OscPeer::bind();
        let b = OscPeer::bind();
        a.send(b.port(), "/ping", vec![]);
        let (msg, from) = b.recv(DEFAULT_TIMEOUT).unwrap();
        assert_eq!(msg.addr, "/ping");
        assert_eq!(from.port(), a.port());
    }

    #[test]
    fn test_collector_shared() {
        let collector = Collector::new();
        let clone = collector.clone();
        thread::spawn(move || clone.push(7)).join().unwrap();
        assert!(collector.wait_for_count(1, DEFAULT_TIMEOUT));
        assert_eq!(collector.last(), Some(7));
    }
}
