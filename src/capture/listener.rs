//! Per-listener capture loop.
//!
//! Each listener owns one bound UDP socket and the capture state for every
//! peer that socket has heard from. The loop keeps exactly one receive
//! outstanding and fully finishes a datagram (registry lookup, rotation
//! check, encode, append) before re-arming, so datagrams from one peer are
//! always processed in arrival order and no per-peer locking is needed.

use std::io::{self, ErrorKind, Write};
use std::net::SocketAddr;
use std::path::Path;

use chrono::Utc;
use log::{error, info, trace, warn};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::capture::encoder;
use crate::capture::registry::PeerRegistry;
use crate::capture::rotation::Rotator;
use crate::capture::types::PeerKey;
use crate::configuration::types::{ListenerConfig, RotationPolicy};
use crate::error_handling::types::{CaptureError, NetworkError};

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65535;

pub struct CaptureListener {
    config: ListenerConfig,
    policy: RotationPolicy,
}

impl CaptureListener {
    pub fn new(config: ListenerConfig, policy: RotationPolicy) -> Self {
        Self { config, policy }
    }

    /// Prepares the working subdirectory and binds the socket.
    ///
    /// Either step failing aborts only this listener; the caller decides
    /// whether other listeners keep running. Must be called from within the
    /// runtime since the socket is registered with it.
    pub fn start(self) -> Result<RunningListener, CaptureError> {
        let working = self.config.working_dir();
        ensure_working_dir(&working)?;

        let socket = bind_socket(self.config.bind)?;
        Ok(RunningListener {
            label: self.config.label,
            rotator: Rotator::new(&working, self.policy),
            registry: PeerRegistry::new(),
            socket,
        })
    }
}

#[derive(Debug)]
pub struct RunningListener {
    label: String,
    rotator: Rotator,
    registry: PeerRegistry,
    socket: UdpSocket,
}

impl RunningListener {
    /// The address actually bound, needed when the config asked for port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives datagrams until shutdown is signalled or the socket dies.
    ///
    /// Per-datagram failures (peer file creation, write) drop that datagram
    /// and leave the peer as if it had never sent it; transient receive
    /// errors are logged and swallowed; a receive error that means the
    /// socket is unusable stops this listener only.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), CaptureError> {
        let local = self.socket.local_addr().map_err(NetworkError::SockError)?;
        info!("Listener {} capturing on {}", self.label, local);

        // Single-flight discipline makes one reused buffer per listener safe.
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((n, peer_addr)) => {
                            self.handle_datagram(&buf[..n], peer_addr, local);
                        }
                        Err(e) if is_fatal_recv_error(&e) => {
                            error!("udp({}) read error, stopping listener: {}", local, e);
                            self.registry.close_all();
                            return Err(NetworkError::RecvError(e).into());
                        }
                        Err(e) => {
                            warn!("udp({}) transient read error: {}", local, e);
                        }
                    }
                }
            }
        }

        info!(
            "Listener {} stopped, {} peer(s) captured",
            self.label,
            self.registry.peer_count()
        );
        self.registry.close_all();
        Ok(())
    }

    fn handle_datagram(&mut self, payload: &[u8], peer_addr: SocketAddr, local: SocketAddr) {
        let peer = PeerKey::from(peer_addr);
        trace!("{} byte(s) from {} on {}", payload.len(), peer, self.label);
        if let Err(e) = self.append_record(payload, peer, local) {
            // Drop the datagram and forget the peer so the next one
            // re-attempts setup from scratch.
            error!("Dropping datagram from {}: {}", peer, e);
            self.registry.remove(&peer);
        }
    }

    fn append_record(
        &mut self,
        payload: &[u8],
        peer: PeerKey,
        local: SocketAddr,
    ) -> Result<(), CaptureError> {
        let state = self.registry.get_or_create(peer, &self.rotator)?;

        let incoming = encoder::record_len(payload.len());
        if self.rotator.needs_rotation(state.offset, incoming) {
            *state = self.rotator.rotate(&peer)?;
        }

        let now = Utc::now();
        let record = encoder::encode_record(
            payload,
            (peer.addr, peer.port),
            (local.ip(), local.port()),
            now.timestamp() as u32,
            now.timestamp_subsec_micros(),
        );

        // The handle is unbuffered, so the record reaches the kernel before
        // the next receive is armed; nothing is pending in userspace on a
        // crash.
        state.file.write_all(&record).map_err(CaptureError::WriteFailed)?;
        state.file.flush().map_err(CaptureError::WriteFailed)?;
        state.offset += record.len() as u64;
        Ok(())
    }
}

fn ensure_working_dir(working: &Path) -> Result<(), CaptureError> {
    if !working.exists() {
        std::fs::create_dir_all(working)
            .map_err(|e| CaptureError::DirectorySetup(working.to_path_buf(), e))?;
    } else if !working.is_dir() {
        return Err(CaptureError::DirectoryOccupied(working.to_path_buf()));
    }
    Ok(())
}

/// Binds a non-blocking UDP socket and hands it to the runtime. IPv6 binds
/// set `IPV6_V6ONLY` so a dual-stack pair on the same port does not collide;
/// tokio's `UdpSocket` does not expose the option, hence socket2.
fn bind_socket(addr: SocketAddr) -> Result<UdpSocket, CaptureError> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(NetworkError::SockError)?;
    if addr.is_ipv6() {
        socket.set_only_v6(true).map_err(NetworkError::SockError)?;
    }
    socket
        .set_nonblocking(true)
        .map_err(NetworkError::SockError)?;
    socket
        .bind(&addr.into())
        .map_err(NetworkError::BindError)?;
    UdpSocket::from_std(socket.into())
        .map_err(NetworkError::SockError)
        .map_err(Into::into)
}

/// A receive error that means the socket itself is gone. Everything else
/// (ICMP-induced resets, spurious wakeups) is swallowed and the loop keeps
/// receiving.
fn is_fatal_recv_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::NotConnected | ErrorKind::BrokenPipe | ErrorKind::InvalidInput
    )
}
