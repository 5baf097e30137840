//! Class-loading hooks
//!
//! A host program that wants identifiers resolved on demand keeps a
//! [`HookRegistry`] and calls it at its own extension points. The autoloader
//! installs itself into that registry on `register()` and removes itself on
//! `unregister()`.

use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Result of asking a resolver to load a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The defining file was found and included (now or earlier)
    Loaded(PathBuf),

    /// A mapping pointed at this file but it could not be included,
    /// usually because it does not exist
    Missing(PathBuf),

    /// No mapping applies to the identifier
    NotFound,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }

    /// `Some(true)` when loaded, `Some(false)` for a dangling mapping,
    /// `None` when nothing matched
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            LoadOutcome::Loaded(_) => Some(true),
            LoadOutcome::Missing(_) => Some(false),
            LoadOutcome::NotFound => None,
        }
    }

    /// File involved in the outcome, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            LoadOutcome::Loaded(path) | LoadOutcome::Missing(path) => Some(path),
            LoadOutcome::NotFound => None,
        }
    }
}

/// Something that can load a class on demand
pub trait ClassResolver: Send + Sync {
    fn resolve(&self, class: &str) -> LoadOutcome;
}

impl<F> ClassResolver for F
where
    F: Fn(&str) -> LoadOutcome + Send + Sync,
{
    fn resolve(&self, class: &str) -> LoadOutcome {
        self(class)
    }
}

/// Handle identifying an installed hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook#{}", self.0)
    }
}

/// Errors raised while installing or removing hooks
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook handle is not (or no longer) installed
    #[error("Hook is not installed: {0}")]
    NotInstalled(HookId),

    /// The registry refused the hook
    #[error("Hook rejected: {0}")]
    Rejected(String),
}

/// Host-side table of class-loading hooks
pub trait HookRegistry: Send + Sync {
    /// Install a hook, at the front of the table when `prepend` is set
    fn install(&self, hook: Arc<dyn ClassResolver>, prepend: bool) -> Result<HookId, HookError>;

    /// Remove a previously installed hook
    fn remove(&self, id: HookId) -> Result<(), HookError>;
}

/// Ordered in-process hook table
///
/// `resolve` walks the hooks front to back and stops at the first one that
/// loads the class. A dangling mapping reported by one hook does not stop
/// later hooks from trying.
#[derive(Default)]
pub struct HookChain {
    hooks: RwLock<Vec<(HookId, Arc<dyn ClassResolver>)>>,
    next_id: AtomicU64,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of installed hooks
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    pub fn contains(&self, id: HookId) -> bool {
        self.hooks.read().iter().any(|(installed, _)| *installed == id)
    }

    /// Installed hook ids, front to back
    pub fn ids(&self) -> Vec<HookId> {
        self.hooks.read().iter().map(|(id, _)| *id).collect()
    }

    /// Ask every hook in turn to load `class`
    pub fn resolve(&self, class: &str) -> LoadOutcome {
        // Hooks may install or remove hooks while running
        let hooks: Vec<Arc<dyn ClassResolver>> =
            self.hooks.read().iter().map(|(_, hook)| Arc::clone(hook)).collect();

        let mut fallback = LoadOutcome::NotFound;
        for hook in hooks {
            match hook.resolve(class) {
                LoadOutcome::Loaded(path) => return LoadOutcome::Loaded(path),
                LoadOutcome::Missing(path) => {
                    if fallback == LoadOutcome::NotFound {
                        fallback = LoadOutcome::Missing(path);
                    }
                }
                LoadOutcome::NotFound => {}
            }
        }
        fallback
    }
}

impl HookRegistry for HookChain {
    fn install(&self, hook: Arc<dyn ClassResolver>, prepend: bool) -> Result<HookId, HookError> {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut hooks = self.hooks.write();
        if prepend {
            hooks.insert(0, (id, hook));
        } else {
            hooks.push((id, hook));
        }
        Ok(id)
    }

    fn remove(&self, id: HookId) -> Result<(), HookError> {
        let mut hooks = self.hooks.write();
        let index = hooks
            .iter()
            .position(|(installed, _)| *installed == id)
            .ok_or(HookError::NotInstalled(id))?;
        hooks.remove(index);
        Ok(())
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain").field("hooks", &self.ids()).finish()
    }
}
