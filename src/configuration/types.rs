use std::net::SocketAddr;
use std::path::PathBuf;

/// Retention numbers shared by every listener.
///
/// `max_rotate` is how many generation files are kept per peer and
/// `max_file_size` the byte limit a single capture file may not exceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_rotate: u32,
    pub max_file_size: u64,
}

/// One resolved listener: the socket address to bind and the working
/// subdirectory its capture files go to.
///
/// The directory is named after the original, unresolved listen spec, so a
/// spec that resolves to several addresses shares one directory. Immutable
/// once the capture loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Original listen spec string, used as the subdirectory name.
    pub label: String,
    pub bind: SocketAddr,
    /// Root working directory; the listener appends `label` itself.
    pub directory: PathBuf,
}

impl ListenerConfig {
    pub fn working_dir(&self) -> PathBuf {
        self.directory.join(&self.label)
    }
}
