//! Online/offline signal
//!
//! A [`ConnectivityMonitor`] holds the latest known state in a `watch`
//! channel. A background probe keeps it current by opening TCP connections to
//! the model host; tests and embedders can also drive it directly.

use crate::{log_debug, log_info};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Reachability of the model host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Source of connectivity state and change notifications
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// A monitor that always reports online
    pub fn always_online() -> Self {
        Self::new(Connectivity::Online)
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current() == Connectivity::Online
    }

    /// Record a new state; subscribers are only woken on change
    pub fn set(&self, state: Connectivity) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            log_info!("Connectivity changed: {:?}", state);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }

    /// Periodically probe `target` (`host:port`) and update the state
    pub fn spawn_probe(&self, target: String, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let state = probe(&target, interval).await;
                log_debug!("Connectivity probe {} -> {:?}", target, state);
                monitor.set(state);
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::always_online()
    }
}

/// One reachability check with a bounded wait
pub async fn probe(target: &str, wait: Duration) -> Connectivity {
    match tokio::time::timeout(wait, TcpStream::connect(target)).await {
        Ok(Ok(_)) => Connectivity::Online,
        _ => Connectivity::Offline,
    }
}

/// Resolves when the receiver observes `Offline`; pends forever if the
/// monitor goes away.
pub async fn wait_for_offline(rx: &mut watch::Receiver<Connectivity>) {
    let observed = rx
        .wait_for(|state| *state == Connectivity::Offline)
        .await
        .is_ok();
    if !observed {
        std::future::pending::<()>().await;
    }
}
