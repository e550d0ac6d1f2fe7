//! Fan-out of capture listeners and process-level shutdown.

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::capture::listener::CaptureListener;
use crate::configuration::types::{ListenerConfig, RotationPolicy};

/// Owns every capture listener for the process lifetime.
///
/// One task per resolved bind address; listener lifetimes are independent, a
/// listener that fails to start or dies at runtime never takes the others
/// with it. Shutdown is supervisor-driven: the signal layer calls
/// [`shutdown`](Self::shutdown) and every listener finishes its in-flight
/// datagram, closes its files and exits.
pub struct ListenerSupervisor {
    policy: RotationPolicy,
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl ListenerSupervisor {
    pub fn new(policy: RotationPolicy) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            policy,
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Starts one listener per config. A listener whose directory setup or
    /// bind fails is reported and skipped; the rest run. Returns how many
    /// actually started.
    pub fn spawn_listeners(&mut self, configs: Vec<ListenerConfig>) -> usize {
        let mut started = 0;
        for config in configs {
            let label = config.label.clone();
            let bind = config.bind;
            match CaptureListener::new(config, self.policy).start() {
                Ok(running) => {
                    let shutdown_rx = self.shutdown_tx.subscribe();
                    self.tasks.spawn(async move {
                        if let Err(e) = running.run(shutdown_rx).await {
                            error!("Listener {} ({}) died: {}", label, bind, e);
                        }
                    });
                    started += 1;
                }
                Err(e) => {
                    error!("Listener {} ({}) failed to start: {}", label, bind, e);
                }
            }
        }
        started
    }

    pub fn listener_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stops issuing receives on all listeners. In-flight datagrams complete
    /// before their listeners exit, so no truncated record is left behind.
    pub fn shutdown(&self) {
        info!("Shutting down all listeners");
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for every listener task to finish.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Listener task join error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::UdpSocket;

    fn policy() -> RotationPolicy {
        RotationPolicy {
            max_rotate: 3,
            max_file_size: 10 * 1024,
        }
    }

    fn config(dir: &TempDir, label: &str, bind: &str) -> ListenerConfig {
        ListenerConfig {
            label: label.to_string(),
            bind: bind.parse().unwrap(),
            directory: dir.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn one_failed_bind_does_not_stop_the_others() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();

        // occupy a port so the first listener cannot bind it
        let blocker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let taken = blocker.local_addr().unwrap();

        let mut supervisor = ListenerSupervisor::new(policy());
        let started = supervisor.spawn_listeners(vec![
            config(&dir, "taken", &taken.to_string()),
            config(&dir, "free", "127.0.0.1:0"),
        ]);

        assert_eq!(started, 1);
        assert_eq!(supervisor.listener_count(), 1);

        supervisor.shutdown();
        tokio::time::timeout(Duration::from_secs(2), supervisor.wait())
            .await
            .expect("listeners did not drain");
    }

    #[tokio::test]
    async fn shutdown_drains_all_listeners() {
        let dir = TempDir::new().unwrap();
        let mut supervisor = ListenerSupervisor::new(policy());
        let started = supervisor.spawn_listeners(vec![
            config(&dir, "a", "127.0.0.1:0"),
            config(&dir, "b", "127.0.0.1:0"),
        ]);
        assert_eq!(started, 2);

        supervisor.shutdown();
        tokio::time::timeout(Duration::from_secs(2), supervisor.wait())
            .await
            .expect("listeners did not drain");
    }
}
