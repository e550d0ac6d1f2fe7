//! Daemon configuration: listen specs, destination directory and rotation
//! numbers, loaded from command-line flags or a TOML file and resolved into
//! per-listener bind addresses before any capture loop starts.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Deserialize;
use tokio::net::lookup_host;

use super::types::{ListenerConfig, RotationPolicy};
use crate::error_handling::types::ConfigError;

pub const DEFAULT_MAX_ROTATE: u32 = 10;
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct FileConfig {
    listen: Vec<String>,
    directory: Option<PathBuf>,
    max_rotate: Option<u32>,
    max_size: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Unresolved listen specs: `host:port`, `[v6]:port` or a bare port.
    pub listen: Vec<String>,
    /// Root destination directory; must already exist.
    pub directory: PathBuf,
    pub policy: RotationPolicy,
}

impl Config {
    pub fn new(
        listen: Vec<String>,
        directory: PathBuf,
        max_rotate: u32,
        max_size: u64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            listen,
            directory,
            policy: RotationPolicy {
                max_rotate,
                max_file_size: max_size,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let file: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        Self::new(
            file.listen,
            file.directory.unwrap_or_else(|| PathBuf::from(".")),
            file.max_rotate.unwrap_or(DEFAULT_MAX_ROTATE),
            file.max_size.unwrap_or(DEFAULT_MAX_SIZE),
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.is_empty() {
            return Err(ConfigError::ListenEmpty);
        }
        if !self.directory.exists() {
            return Err(ConfigError::DirectoryDoesNotExist(self.directory.clone()));
        }
        if !self.directory.is_dir() {
            return Err(ConfigError::NotADirectory(self.directory.clone()));
        }
        if self.policy.max_rotate == 0 {
            return Err(ConfigError::NotInRange("max_rotate must be positive".into()));
        }
        if self.policy.max_file_size == 0 {
            return Err(ConfigError::NotInRange("max_size must be positive".into()));
        }
        Ok(())
    }

    /// Resolves every listen spec into bind addresses, one `ListenerConfig`
    /// per resolved address. All addresses from one spec share its label.
    ///
    /// A spec that fails to resolve is reported and skipped; the remaining
    /// listeners still start. Resolution happens once, before any listener
    /// binds.
    pub async fn resolve_listeners(&self) -> Vec<ListenerConfig> {
        let mut listeners = Vec::new();
        for spec in &self.listen {
            match resolve_spec(spec).await {
                Ok(addrs) => {
                    for bind in addrs {
                        info!("Listening on {} from spec {}", bind, spec);
                        listeners.push(ListenerConfig {
                            label: spec.clone(),
                            bind,
                            directory: self.directory.clone(),
                        });
                    }
                }
                Err(e) => error!("Skipping listen spec {}: {}", spec, e),
            }
        }
        listeners
    }
}

/// Parses one listen spec. `host:port` splits on the last colon (so IPv6
/// literals keep their colons; brackets are stripped for resolution); a bare
/// spec is a port on the wildcard addresses, one IPv4 and one IPv6.
async fn resolve_spec(spec: &str) -> Result<Vec<SocketAddr>, ConfigError> {
    match spec.rsplit_once(':') {
        None => {
            let port: u16 = spec
                .parse()
                .map_err(|_| ConfigError::BadListenSpec(spec.to_string()))?;
            Ok(vec![
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
            ])
        }
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::BadListenSpec(spec.to_string()))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let addrs: Vec<SocketAddr> = lookup_host((host, port))
                .await
                .map_err(|e| ConfigError::ResolveFailed(spec.to_string(), e))?
                .collect();
            if addrs.is_empty() {
                return Err(ConfigError::BadListenSpec(spec.to_string()));
            }
            Ok(addrs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn listen() -> Vec<String> {
        vec!["127.0.0.1:4000".to_string()]
    }

    #[test]
    fn rejects_missing_directory() {
        let err = Config::new(listen(), PathBuf::from("/nonexistent/udpcapd"), 10, 1024)
            .unwrap_err();
        assert!(matches!(err, ConfigError::DirectoryDoesNotExist(_)));
    }

    #[test]
    fn rejects_empty_listen_and_zero_policy() {
        let dir = TempDir::new().unwrap();
        let err = Config::new(Vec::new(), dir.path().into(), 10, 1024).unwrap_err();
        assert!(matches!(err, ConfigError::ListenEmpty));

        let err = Config::new(listen(), dir.path().into(), 0, 1024).unwrap_err();
        assert!(matches!(err, ConfigError::NotInRange(_)));

        let err = Config::new(listen(), dir.path().into(), 10, 0).unwrap_err();
        assert!(matches!(err, ConfigError::NotInRange(_)));
    }

    #[test]
    fn loads_toml_file_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("udpcapd.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "listen = [\"127.0.0.1:4000\"]\ndirectory = \"{}\"",
            dir.path().display()
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.listen, listen());
        assert_eq!(config.policy.max_rotate, DEFAULT_MAX_ROTATE);
        assert_eq!(config.policy.max_file_size, DEFAULT_MAX_SIZE);
    }

    #[tokio::test]
    async fn resolves_explicit_and_bare_port_specs() {
        let addrs = resolve_spec("127.0.0.1:4000").await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:4000".parse().unwrap()]);

        let addrs = resolve_spec("4000").await.unwrap();
        assert_eq!(addrs.len(), 2);
        assert!(addrs.iter().any(|a| a.is_ipv4() && a.port() == 4000));
        assert!(addrs.iter().any(|a| a.is_ipv6() && a.port() == 4000));

        let addrs = resolve_spec("[::1]:4000").await.unwrap();
        assert_eq!(addrs, vec!["[::1]:4000".parse().unwrap()]);
    }

    #[tokio::test]
    async fn bad_specs_are_rejected() {
        assert!(matches!(
            resolve_spec("not-a-port").await.unwrap_err(),
            ConfigError::BadListenSpec(_)
        ));
        assert!(matches!(
            resolve_spec("127.0.0.1:notaport").await.unwrap_err(),
            ConfigError::BadListenSpec(_)
        ));
    }

    #[tokio::test]
    async fn unresolvable_spec_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(
            vec![
                "127.0.0.1:4000".to_string(),
                "definitely.invalid.udpcapd:4000".to_string(),
            ],
            dir.path().into(),
            10,
            1024,
        )
        .unwrap();

        let listeners = config.resolve_listeners().await;
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].label, "127.0.0.1:4000");
        assert_eq!(listeners[0].working_dir(), dir.path().join("127.0.0.1:4000"));
    }
}
