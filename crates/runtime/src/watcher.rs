//! # Scene Hot-Reloading
//!
//! Watches the scene file with [`notify`] and sends a message on a channel
//! whenever it is written or recreated. The watcher thread only signals; the
//! render loop reloads and re-renders on its own thread.
//!
//! The parent directory is watched rather than the file itself, since most
//! editors save by replacing the file.

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, error, info};

/// Keeps the underlying watcher alive; dropping it stops the notifications.
pub struct SceneWatcher {
    _watcher: RecommendedWatcher,
    changes: Receiver<PathBuf>,
}

impl SceneWatcher {
    /// Blocks until the scene file changes, then drains any queued events so
    /// a burst of writes triggers a single reload.
    ///
    /// Returns `None` once the watcher has shut down.
    pub fn wait_for_change(&self) -> Option<PathBuf> {
        let mut latest = self.changes.recv().ok()?;
        while let Ok(path) = self.changes.try_recv() {
            latest = path;
        }
        Some(latest)
    }
}

/// Starts watching `scene_path`.
///
/// # Errors
///
/// Returns an error if the path has no file name, or if the watcher cannot be
/// created or attached to the parent directory.
pub fn start(scene_path: &Path) -> Result<SceneWatcher> {
    let file_name = scene_path
        .file_name()
        .map(OsString::from)
        .with_context(|| format!("{} does not name a file", scene_path.display()))?;
    let directory = match scene_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (sender, changes) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => forward_event(&event, &file_name, &sender),
        Err(e) => error!("Error watching scene file: {e:?}"),
    })
    .context("failed to create file watcher")?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", directory.display()))?;
    info!("Scene watcher started for {}", scene_path.display());
    Ok(SceneWatcher {
        _watcher: watcher,
        changes,
    })
}

fn forward_event(event: &Event, file_name: &OsString, sender: &Sender<PathBuf>) {
    if !event.kind.is_modify() && !event.kind.is_create() {
        return;
    }
    for path in &event.paths {
        if is_scene_file(path, file_name) {
            debug!("scene file changed: {}", path.display());
            // The receiver is gone only while the process is exiting.
            let _ = sender.send(path.clone());
        }
    }
}

fn is_scene_file(path: &Path, file_name: &OsString) -> bool {
    path.file_name() == Some(file_name.as_os_str())
}
