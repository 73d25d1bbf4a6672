//! Runtime filter changes
//!
//! The directive string given to [`init`](super::init) is the base filter.
//! Per-target overrides sit on top of it, so one crate (say
//! `jobserv_credential` while a key rotation is investigated) can be made
//! louder and quiet again without restating the whole filter.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, Registry, reload};

use crate::error::{LogError, LogResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FilterState {
    base: String,
    overrides: BTreeMap<String, String>,
}

impl FilterState {
    fn render(&self) -> String {
        let base = Some(self.base.clone()).filter(|base| !base.is_empty());
        base.into_iter()
            .chain(
                self.overrides
                    .iter()
                    .map(|(target, level)| format!("{target}={level}")),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

struct Shared {
    handle: reload::Handle<EnvFilter, Registry>,
    state: Mutex<FilterState>,
    active: ArcSwap<String>,
}

/// Handle for runtime filter changes
///
/// Cheap to clone; every clone drives the same installed filter.
#[derive(Clone)]
pub struct ReloadHandle {
    shared: Arc<Shared>,
}

impl ReloadHandle {
    /// Wrap `filter` in a reload layer; `base` is the directive string it was parsed from
    pub(super) fn install(
        filter: EnvFilter,
        base: &str,
    ) -> (reload::Layer<EnvFilter, Registry>, Self) {
        let (layer, handle) = reload::Layer::new(filter);
        let state = FilterState {
            base: base.to_owned(),
            overrides: BTreeMap::new(),
        };
        let shared = Shared {
            handle,
            active: ArcSwap::from_pointee(state.render()),
            state: Mutex::new(state),
        };
        (
            layer,
            Self {
                shared: Arc::new(shared),
            },
        )
    }

    /// Replace the base filter; target overrides stay in effect
    ///
    /// # Errors
    ///
    /// [`LogError::Filter`] if the resulting filter does not parse, leaving
    /// the active filter unchanged.
    pub fn reload(&self, filter: &str) -> LogResult<()> {
        self.update(|state| state.base = filter.to_owned())
    }

    /// Log `target` at `level` regardless of the base filter
    ///
    /// # Errors
    ///
    /// [`LogError::Filter`] if `level` is not a valid level.
    pub fn set_target_level(&self, target: &str, level: &str) -> LogResult<()> {
        self.update(|state| {
            state.overrides.insert(target.to_owned(), level.to_owned());
        })
    }

    /// Drop the override for `target`
    pub fn clear_target(&self, target: &str) -> LogResult<()> {
        self.update(|state| {
            state.overrides.remove(target);
        })
    }

    /// Drop every override, back to the base filter
    pub fn clear_overrides(&self) -> LogResult<()> {
        self.update(|state| state.overrides.clear())
    }

    /// Directive string currently in effect
    pub fn current_filter(&self) -> Arc<String> {
        self.shared.active.load_full()
    }

    fn update(&self, change: impl FnOnce(&mut FilterState)) -> LogResult<()> {
        let mut state = self.shared.state.lock();
        let mut next = state.clone();
        change(&mut next);
        if next == *state {
            return Ok(());
        }

        let rendered = next.render();
        let filter = EnvFilter::try_new(&rendered)
            .map_err(|e| LogError::Filter(format!("{rendered}: {e}")))?;
        self.shared
            .handle
            .reload(filter)
            .map_err(|e| LogError::Config(format!("Failed to reload filter: {e}")))?;
        *state = next;
        self.shared.active.store(Arc::new(rendered));
        drop(state);

        tracing::info!(filter = %self.current_filter(), "log filter changed");
        Ok(())
    }
}

impl fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadHandle")
            .field("filter", &self.current_filter())
            .finish_non_exhaustive()
    }
}
