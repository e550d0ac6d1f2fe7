use std::fmt;
use std::fs::File;
use std::net::{IpAddr, SocketAddr};

/// Identity of a remote sender within one listener.
///
/// Field order gives the derived ordering: address bytes first (IPv4 sorts
/// before IPv6, per `IpAddr`'s ordering), then port, so the key can back an
/// ordered map. The `Display` form (`1.2.3.4:5678`, `[::1]:5678`) is also the
/// stem of the peer's capture file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeerKey {
    pub addr: IpAddr,
    pub port: u16,
}

impl From<SocketAddr> for PeerKey {
    fn from(sa: SocketAddr) -> Self {
        Self {
            addr: sa.ip(),
            port: sa.port(),
        }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SocketAddr::new(self.addr, self.port).fmt(f)
    }
}

/// Open capture state for one peer: the current generation-1 file and how
/// many bytes have been written to it so far (global header included).
///
/// Owned by the listener that created it; exactly one writer ever touches
/// the handle.
#[derive(Debug)]
pub struct PeerFileState {
    pub file: File,
    pub offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_key_orders_by_address_then_port() {
        let a: PeerKey = "10.0.0.1:9000".parse::<SocketAddr>().unwrap().into();
        let b: PeerKey = "10.0.0.2:1000".parse::<SocketAddr>().unwrap().into();
        let c: PeerKey = "10.0.0.2:2000".parse::<SocketAddr>().unwrap().into();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn peer_key_display_matches_socket_addr() {
        let key: PeerKey = "10.0.0.5:4000".parse::<SocketAddr>().unwrap().into();
        assert_eq!(key.to_string(), "10.0.0.5:4000");
        let v6: PeerKey = "[::1]:4000".parse::<SocketAddr>().unwrap().into();
        assert_eq!(v6.to_string(), "[::1]:4000");
    }

    #[test]
    fn mapped_v4_and_plain_v4_are_distinct_keys() {
        let plain: PeerKey = "127.0.0.1:80".parse::<SocketAddr>().unwrap().into();
        let mapped: PeerKey = "[::ffff:127.0.0.1]:80".parse::<SocketAddr>().unwrap().into();
        assert_ne!(plain, mapped);
    }
}
