//! File watching for configuration layers.

use crate::error::{ConfigError, Result};
use crate::sources::{AbortOnDrop, LayerChanges};
use notify::{Event, EventKind, RecursiveMode, Watcher as NotifyWatcher};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Turns file system events for one file into a debounced change feed.
///
/// The parent directory is watched rather than the file itself, so editors
/// that save by writing a new file and renaming it over the old one are still
/// noticed. A burst of events becomes a single notification once the file
/// has been quiet for the debounce period.
///
/// # Examples
///
/// ```rust,no_run
/// use multitenant_config::reload::FileWatcher;
/// use std::time::Duration;
///
/// # async fn example() -> multitenant_config::error::Result<()> {
/// let mut changes = FileWatcher::watch("appsettings.json", Duration::from_millis(250))?;
/// while changes.next().await.is_some() {
///     println!("appsettings.json changed");
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileWatcher;

impl FileWatcher {
    /// Start watching `path`. Must be called from within a Tokio runtime.
    ///
    /// The file itself need not exist yet; creating it later is reported as a
    /// change. The watch lasts as long as the returned feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be resolved or the
    /// platform watcher cannot be created.
    pub fn watch(path: impl AsRef<Path>, debounce: Duration) -> Result<LayerChanges> {
        let path = path.as_ref();
        let file_name: OsString = path.file_name().map(OsString::from).ok_or_else(|| {
            ConfigError::WatchError(format!("Not a file: {}", path.display()))
        })?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let directory = parent.canonicalize().map_err(|e| {
            ConfigError::WatchError(format!("Failed to resolve {}: {}", parent.display(), e))
        })?;
        let watched = directory.join(&file_name);

        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let relevant = matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) && event
                    .paths
                    .iter()
                    .any(|changed| changed.file_name() == Some(file_name.as_os_str()));
                if relevant {
                    let _ = event_tx.send(());
                }
            }
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| {
                ConfigError::WatchError(format!("Failed to watch {}: {}", directory.display(), e))
            })?;

        tracing::debug!(path = %watched.display(), ?debounce, "Watching configuration file");

        let (tx, changes) = LayerChanges::channel();
        let task = tokio::spawn(debounce_events(event_rx, tx, debounce));
        Ok(changes.with_guard((watcher, AbortOnDrop(task))))
    }
}

/// Forward one notification per burst, after `quiet` has passed without events.
async fn debounce_events(
    mut events: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<()>,
    quiet: Duration,
) {
    while events.recv().await.is_some() {
        loop {
            match timeout(quiet, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        if tx.send(()).await.is_err() {
            break;
        }
    }
}
