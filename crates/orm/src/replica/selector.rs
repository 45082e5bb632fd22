//! Replica discovery and round-robin selection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::OrmResult;
use crate::session::{Connection, with_deadline};

use super::{Connector, Dsn, HostResolver};

/// Timing of replica discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaSelectorConfig {
    /// Time between background refreshes.
    pub interval: Duration,
    /// Deadline for one resolution.
    pub timeout: Duration,
}

impl Default for ReplicaSelectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(1),
        }
    }
}

/// One discovered replica.
#[derive(Clone)]
pub struct Replica {
    /// Connection name.
    pub name: String,
    /// DSN with the domain replaced by the resolved address.
    pub dsn: String,
    /// The open connection.
    pub connection: Arc<dyn Connection>,
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("name", &self.name)
            .field("dsn", &self.dsn)
            .finish_non_exhaustive()
    }
}

/// The replica list as of one resolution. Replaced whole, never edited.
#[derive(Debug, Clone)]
pub struct ReplicaSet {
    /// The resolved domain.
    pub domain: String,
    /// Replicas in address order.
    pub replicas: Vec<Replica>,
    /// When the list was resolved.
    pub refreshed_at: DateTime<Utc>,
}

/// Round-robin selection over replicas discovered from a domain.
pub struct ReplicaSelector {
    dsn: Dsn,
    config: ReplicaSelectorConfig,
    resolver: Arc<dyn HostResolver>,
    connector: Arc<dyn Connector>,
    current: ArcSwap<ReplicaSet>,
    counter: AtomicUsize,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl std::fmt::Debug for ReplicaSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaSelector")
            .field("domain", &self.dsn.host())
            .field("config", &self.config)
            .field("replicas", &self.current.load().replicas.len())
            .finish_non_exhaustive()
    }
}

impl ReplicaSelector {
    /// Resolves `dsn` once and starts the background refresh.
    ///
    /// Fails if the DSN is malformed or the first resolution fails.
    pub async fn start(
        dsn: &str,
        config: ReplicaSelectorConfig,
        resolver: Arc<dyn HostResolver>,
        connector: Arc<dyn Connector>,
    ) -> OrmResult<Arc<Self>> {
        let dsn = Dsn::parse(dsn)?;
        let replicas = connect_all(
            &discover(&dsn, resolver.as_ref(), config.timeout).await?,
            connector.as_ref(),
            &HashMap::new(),
        )
        .await?;

        let (tx, rx) = mpsc::channel(1);
        let selector = Arc::new(Self {
            current: ArcSwap::from_pointee(ReplicaSet {
                domain: dsn.host().to_string(),
                replicas,
                refreshed_at: Utc::now(),
            }),
            dsn,
            config,
            resolver,
            connector,
            counter: AtomicUsize::new(0),
            shutdown_tx: Mutex::new(Some(tx)),
        });

        info!(
            domain = %selector.dsn.host(),
            replicas = selector.current.load().replicas.len(),
            "Replica selector started"
        );

        let weak = Arc::downgrade(&selector);
        tokio::spawn(async move {
            refresh_loop(rx, weak, config.interval).await;
        });

        Ok(selector)
    }

    /// The current replica list.
    pub fn snapshot(&self) -> Arc<ReplicaSet> {
        self.current.load_full()
    }

    /// The next replica in round-robin order, or `None` if there is none.
    pub fn next(&self) -> Option<Arc<dyn Connection>> {
        let set = self.current.load();
        if set.replicas.is_empty() {
            return None;
        }
        let index = next_index(&self.counter, set.replicas.len());
        Some(Arc::clone(&set.replicas[index].connection))
    }

    /// The connection a read should use; `None` means the primary.
    pub fn pick(&self, use_primary: bool) -> Option<Arc<dyn Connection>> {
        if use_primary {
            return None;
        }
        self.next()
    }

    /// Re-resolves the domain and swaps in the new list.
    ///
    /// On failure the previous list stays in place and the error is returned.
    pub async fn refresh(&self) -> OrmResult<()> {
        let current = self.current.load_full();
        let reuse: HashMap<String, Arc<dyn Connection>> = current
            .replicas
            .iter()
            .map(|r| (r.dsn.clone(), Arc::clone(&r.connection)))
            .collect();

        let dsns = discover(&self.dsn, self.resolver.as_ref(), self.config.timeout).await?;
        let replicas = connect_all(&dsns, self.connector.as_ref(), &reuse).await?;

        debug!(
            domain = %self.dsn.host(),
            before = current.replicas.len(),
            replicas = replicas.len(),
            "Replica list refreshed"
        );
        self.current.store(Arc::new(ReplicaSet {
            domain: self.dsn.host().to_string(),
            replicas,
            refreshed_at: Utc::now(),
        }));
        Ok(())
    }

    /// Stops the background refresh. Later calls do nothing.
    pub async fn shutdown(&self) {
        let tx = self.shutdown_tx.lock().take();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown_tx.lock().is_none()
    }
}

/// Resolves the domain of `dsn` and returns one DSN per address.
pub async fn discover(
    dsn: &Dsn,
    resolver: &dyn HostResolver,
    timeout: Duration,
) -> OrmResult<Vec<Dsn>> {
    let ips = with_deadline(Some(timeout), resolver.resolve(dsn.host(), dsn.port())).await?;
    Ok(ips.into_iter().map(|ip| dsn.with_ip(ip)).collect())
}

async fn connect_all(
    dsns: &[Dsn],
    connector: &dyn Connector,
    reuse: &HashMap<String, Arc<dyn Connection>>,
) -> OrmResult<Vec<Replica>> {
    let mut replicas = Vec::with_capacity(dsns.len());
    for (i, dsn) in dsns.iter().enumerate() {
        let dsn = dsn.to_string();
        let name = format!("replica_{i}");
        let connection = match reuse.get(&dsn) {
            Some(connection) => Arc::clone(connection),
            None => connector.connect(&name, &dsn).await?,
        };
        replicas.push(Replica {
            name,
            dsn,
            connection,
        });
    }
    Ok(replicas)
}

async fn refresh_loop(
    mut shutdown_rx: mpsc::Receiver<()>,
    selector: Weak<ReplicaSelector>,
    period: Duration,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Replica selector shutting down");
                break;
            }
            _ = interval.tick() => {
                let Some(selector) = selector.upgrade() else {
                    break;
                };
                if let Err(e) = selector.refresh().await {
                    warn!(
                        domain = %selector.dsn.host(),
                        error = %e,
                        "Replica refresh failed, keeping previous list"
                    );
                }
            }
        }
    }
}

/// Pre-increment round robin; the counter wraps instead of overflowing.
fn next_index(counter: &AtomicUsize, len: usize) -> usize {
    counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_index_starts_after_first() {
        let counter = AtomicUsize::new(0);
        let picked: Vec<usize> = (0..4).map(|_| next_index(&counter, 3)).collect();
        assert_eq!(picked, vec![1, 2, 0, 1]);
    }

    #[test]
    fn test_next_index_wraps_at_counter_limit() {
        let counter = AtomicUsize::new(usize::MAX);
        assert_eq!(next_index(&counter, 3), 0);
        assert_eq!(next_index(&counter, 3), 1);
    }
}
