//! Live view of the CA certificate and bearer token files
//!
//! Both files are read once at startup; a failure there is fatal. After that
//! [`CredentialWatcher::watch`] re-reads a file whenever its directory changes
//! and swaps the new value in only if the file's modification time is strictly
//! newer than the snapshot already held for that same file. A failed re-read
//! keeps the previous snapshot.
//!
//! Readers never block: [`CredentialWatcher::current`] is an `ArcSwap` load.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::WatchError;

/// Which credential file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// CA certificate (PEM) trusted for the secret service
    Ca,
    /// Bearer token presented to the secret service
    Token,
}

impl CredentialKind {
    /// Both kinds, in load order
    pub const ALL: [Self; 2] = [Self::Ca, Self::Token];

    /// Lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ca => "ca",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File contents plus the modification time they were read at
#[derive(Debug, Clone)]
pub struct CredentialSnapshot {
    /// File contents
    pub value: SecretString,
    /// Modification time observed for `value`
    pub modified_at: SystemTime,
}

#[derive(Debug)]
struct Slot {
    path: PathBuf,
    current: ArcSwap<CredentialSnapshot>,
}

/// Reload requests coalesced per kind.
///
/// Any number of file events for a kind collapse into one pending flag, so
/// a busy directory cannot crowd out the other kind's reload.
#[derive(Debug, Default)]
struct PendingReloads {
    ca: AtomicBool,
    token: AtomicBool,
    wake: Notify,
}

impl PendingReloads {
    fn flag(&self, kind: CredentialKind) -> &AtomicBool {
        match kind {
            CredentialKind::Ca => &self.ca,
            CredentialKind::Token => &self.token,
        }
    }

    fn mark(&self, kind: CredentialKind) {
        self.flag(kind).store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn take(&self, kind: CredentialKind) -> bool {
        self.flag(kind).swap(false, Ordering::AcqRel)
    }
}

/// Holds the latest CA and token snapshots
#[derive(Debug)]
pub struct CredentialWatcher {
    ca: Slot,
    token: Slot,
}

impl CredentialWatcher {
    /// Read both files synchronously.
    ///
    /// # Errors
    ///
    /// [`WatchError::Initial`] when either file cannot be read or stat'ed.
    pub fn initialize(
        ca_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Result<Self, WatchError> {
        let ca_path = ca_path.into();
        let token_path = token_path.into();
        let ca = read_initial(CredentialKind::Ca, &ca_path)?;
        let token = read_initial(CredentialKind::Token, &token_path)?;

        tracing::info!(
            ca = %ca_path.display(),
            token = %token_path.display(),
            "loaded secret service credentials"
        );

        Ok(Self {
            ca: Slot {
                path: ca_path,
                current: ArcSwap::from_pointee(ca),
            },
            token: Slot {
                path: token_path,
                current: ArcSwap::from_pointee(token),
            },
        })
    }

    fn slot(&self, kind: CredentialKind) -> &Slot {
        match kind {
            CredentialKind::Ca => &self.ca,
            CredentialKind::Token => &self.token,
        }
    }

    /// Latest snapshot for `kind`
    pub fn current(&self, kind: CredentialKind) -> Arc<CredentialSnapshot> {
        self.slot(kind).current.load_full()
    }

    /// Latest CA certificate PEM
    pub fn ca(&self) -> SecretString {
        self.current(CredentialKind::Ca).value.clone()
    }

    /// Latest bearer token, as read from disk
    pub fn token(&self) -> SecretString {
        self.current(CredentialKind::Token).value.clone()
    }

    /// Path watched for `kind`
    pub fn path(&self, kind: CredentialKind) -> &Path {
        &self.slot(kind).path
    }

    /// Re-read `kind` from disk.
    ///
    /// Returns `Ok(true)` when a strictly newer snapshot was installed and
    /// `Ok(false)` when the file's mtime is not newer than the current one.
    ///
    /// # Errors
    ///
    /// [`WatchError::Refresh`] when the file cannot be read; the current
    /// snapshot is left untouched.
    pub async fn refresh(&self, kind: CredentialKind) -> Result<bool, WatchError> {
        let slot = self.slot(kind);
        let refresh_err = |source| WatchError::Refresh {
            kind,
            path: slot.path.clone(),
            source,
        };

        let metadata = tokio::fs::metadata(&slot.path).await.map_err(refresh_err)?;
        let modified_at = metadata.modified().map_err(refresh_err)?;
        if modified_at <= slot.current.load().modified_at {
            return Ok(false);
        }

        let value = tokio::fs::read_to_string(&slot.path)
            .await
            .map_err(refresh_err)?;
        let candidate = Arc::new(CredentialSnapshot {
            value: SecretString::from(value),
            modified_at,
        });

        // A concurrent refresh may have installed something newer meanwhile.
        let previous = slot.current.rcu(|current| {
            if candidate.modified_at > current.modified_at {
                Arc::clone(&candidate)
            } else {
                Arc::clone(current)
            }
        });
        let replaced = candidate.modified_at > previous.modified_at;

        if replaced {
            tracing::info!(%kind, path = %slot.path.display(), "credential reloaded");
        }
        Ok(replaced)
    }

    /// Start watching both files for changes.
    ///
    /// Parent directories are watched rather than the files themselves so
    /// that atomic replacement (write-then-rename, symlink swaps) is seen.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`WatchError::Notify`] when the OS watcher cannot be registered.
    pub fn watch(self: &Arc<Self>) -> Result<WatchHandle, WatchError> {
        let mut by_dir: HashMap<PathBuf, Vec<CredentialKind>> = HashMap::new();
        for kind in CredentialKind::ALL {
            by_dir
                .entry(watch_dir(self.path(kind)))
                .or_default()
                .push(kind);
        }

        let pending = Arc::new(PendingReloads::default());
        let routes = by_dir.clone();
        let marks = Arc::clone(&pending);
        let mut fs_watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for kind in kinds_for(&routes, &event.paths) {
                        marks.mark(kind);
                    }
                }
                Err(err) => tracing::warn!(error = %err, "credential watch error"),
            })
            .map_err(|source| WatchError::Notify {
                path: PathBuf::new(),
                source,
            })?;

        for dir in by_dir.keys() {
            fs_watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|source| WatchError::Notify {
                    path: dir.clone(),
                    source,
                })?;
            tracing::debug!(path = %dir.display(), "watching credential directory");
        }

        let watcher = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                pending.wake.notified().await;
                for kind in CredentialKind::ALL {
                    if !pending.take(kind) {
                        continue;
                    }
                    if let Err(err) = watcher.refresh(kind).await {
                        tracing::error!(
                            %kind,
                            error = %err,
                            "credential reload failed, keeping previous value"
                        );
                    }
                }
            }
        });

        Ok(WatchHandle {
            _watcher: fs_watcher,
            task,
        })
    }
}

/// Keeps the file watch alive; dropping it stops reloads
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop watching
    pub fn stop(self) {}
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

fn read_initial(kind: CredentialKind, path: &Path) -> Result<CredentialSnapshot, WatchError> {
    let initial_err = |source| WatchError::Initial {
        kind,
        path: path.to_path_buf(),
        source,
    };
    let modified_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(initial_err)?;
    let value = std::fs::read_to_string(path).map_err(initial_err)?;
    Ok(CredentialSnapshot {
        value: SecretString::from(value),
        modified_at,
    })
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn kinds_for(
    routes: &HashMap<PathBuf, Vec<CredentialKind>>,
    paths: &[PathBuf],
) -> Vec<CredentialKind> {
    let mut kinds = Vec::new();
    for (dir, dir_kinds) in routes {
        let touched = paths.is_empty()
            || paths
                .iter()
                .any(|p| p.parent().is_some_and(|parent| parent == dir) || p == dir);
        if touched {
            for kind in dir_kinds {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        }
    }
    kinds
}
