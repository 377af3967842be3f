//! Live reload of the merged configuration.

use crate::core::{Generation, LayerSet};
use crate::error::{ConfigError, Result};
use crate::sources::{AbortOnDrop, LayerChanges};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

/// Snapshot of reload counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
    /// Merges attempted after startup.
    pub attempts: u64,
    /// Merges that produced a published generation.
    pub successes: u64,
    /// Merges that failed; the previous generation stayed in force.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Re-merges the layers when one of them changes and publishes the result.
///
/// Publication is a single atomic swap; readers see the old generation or the
/// new one, never a mix. A failed merge is logged and the last good generation
/// keeps serving.
pub struct ReloadCoordinator {
    layers: Arc<LayerSet>,
    current: Arc<ArcSwap<Generation>>,
    publish: Mutex<()>,
    counters: Counters,
    running: AtomicBool,
}

impl ReloadCoordinator {
    /// Create a coordinator publishing into `current`.
    pub fn new(layers: Arc<LayerSet>, current: Arc<ArcSwap<Generation>>) -> Self {
        Self {
            layers,
            current,
            publish: Mutex::new(()),
            counters: Counters::default(),
            running: AtomicBool::new(false),
        }
    }

    /// The generation currently published.
    pub fn generation(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    /// The layers this coordinator merges.
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// Merge all layers now and publish the result.
    ///
    /// # Errors
    ///
    /// Returns the merge error; the current generation is left untouched.
    pub async fn reload(&self) -> Result<Arc<Generation>> {
        self.reload_while(None).await?.ok_or_else(|| {
            ConfigError::Other("Reload was abandoned before publishing".to_string())
        })
    }

    /// Merge and publish unless `shutdown` has fired by the time of the swap.
    async fn reload_while(
        &self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<Option<Arc<Generation>>> {
        let _publishing = self.publish.lock().await;
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);

        let sequence = self.current.load().sequence() + 1;
        let generation = match self.layers.merge(sequence).await {
            Ok(generation) => Arc::new(generation),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        match shutdown {
            Some(shutdown) => {
                // `send` needs the write side, so the signal cannot land between check and swap.
                let stop = shutdown.borrow();
                if *stop || shutdown.has_changed().is_err() {
                    return Ok(None);
                }
                self.current.store(Arc::clone(&generation));
            }
            None => self.current.store(Arc::clone(&generation)),
        }
        self.counters.successes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            sequence,
            tenants = generation.tenants().len(),
            "Published configuration generation"
        );
        Ok(Some(generation))
    }

    /// Current reload counters.
    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            attempts: self.counters.attempts.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Whether a watch loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribe to every layer that reports changes and reload on each one
    /// until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// A layer whose subscription fails is logged and left unwatched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyWatching`] if a watch loop is running.
    pub async fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Result<ReloadHandle> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::AlreadyWatching);
        }

        let mut feeds = Vec::new();
        for layer in self.layers.layers() {
            match layer.changes().await {
                Ok(Some(feed)) => feeds.push((layer.name(), feed)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(layer = %layer.name(), error = %e, "Failed to subscribe to layer changes");
                }
            }
        }

        tracing::info!(watched = feeds.len(), "Reload coordinator started");
        let task = tokio::spawn(Arc::clone(self).run(feeds, shutdown));
        Ok(ReloadHandle { task })
    }

    async fn run(self: Arc<Self>, feeds: Vec<(String, LayerChanges)>, mut shutdown: watch::Receiver<bool>) {
        let (tx, mut rx) = mpsc::channel::<String>(feeds.len().max(1) * 4);
        let forwarders: Vec<AbortOnDrop> = feeds
            .into_iter()
            .map(|(name, mut feed)| {
                let tx = tx.clone();
                AbortOnDrop(tokio::spawn(async move {
                    while feed.next().await.is_some() {
                        if tx.send(name.clone()).await.is_err() {
                            break;
                        }
                    }
                }))
            })
            .collect();
        drop(tx);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                changed = rx.recv() => {
                    let Some(layer) = changed else {
                        tracing::debug!("No layer reports changes any more");
                        shutdown_requested(&mut shutdown).await;
                        break;
                    };
                    // Notifications that piled up during the last merge are covered by this one.
                    while rx.try_recv().is_ok() {}

                    if is_shutdown(&shutdown) {
                        break;
                    }
                    tracing::debug!(layer = %layer, "Layer changed; merging");
                    match self.reload_while(Some(&shutdown)).await {
                        Ok(Some(_)) => {}
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(
                                layer = %layer,
                                error = %e,
                                sequence = self.current.load().sequence(),
                                "Reload failed; keeping previous generation"
                            );
                        }
                    }
                }
            }
        }

        drop(forwarders);
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Reload coordinator stopped");
    }
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("layers", &self.layers)
            .field("generation", &self.current.load().sequence())
            .field("running", &self.is_running())
            .finish()
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown too.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Handle to a running watch loop.
#[derive(Debug)]
pub struct ReloadHandle {
    task: JoinHandle<()>,
}

impl ReloadHandle {
    /// Whether the loop has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WatchError`] if the loop panicked.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ConfigError::WatchError(format!("Reload loop failed: {}", e)))
    }
}
