//! Class autoloader
//!
//! Combines a [`ClassMap`] and a [`NamespaceMap`] into a single resolver,
//! includes the resolved file once, and manages installation of itself as a
//! hook in a host [`HookRegistry`].
//!
//! Lookup order is fixed: the class map is consulted first and the namespace
//! map only when the class map has no entry for the identifier.

use crate::class_map::ClassMap;
use crate::hook::{ClassResolver, HookId, HookRegistry, LoadOutcome};
use crate::include::{FileIncluder, IncludeOnce, NoopIncluder};
use crate::namespace_map::{NamespaceMap, PathSpec};
use crate::normalize::normalize_path;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Mapping state guarded as one unit
#[derive(Debug)]
struct Mappings {
    class_map: ClassMap,
    namespace_map: NamespaceMap,
    files: Vec<PathBuf>,
}

struct Inner {
    mappings: RwLock<Mappings>,
    registration: Mutex<Option<HookId>>,
    hooks: Arc<dyn HookRegistry>,
    includes: IncludeOnce,
}

impl Inner {
    fn find_file(&self, class: &str) -> Option<(PathBuf, &'static str)> {
        let mappings = self.mappings.read();
        if let Some(path) = mappings.class_map.class_file(class) {
            return Some((path.to_path_buf(), "class map"));
        }
        mappings
            .namespace_map
            .find_file(class)
            .map(|path| (path, "namespace map"))
    }

    fn load_class(&self, class: &str) -> LoadOutcome {
        // The read guard is released before inclusion so included files may
        // trigger further class loading.
        let Some((path, source)) = self.find_file(class) else {
            tracing::debug!(class, "class not mapped");
            return LoadOutcome::NotFound;
        };

        if self.includes.include_file(&path) {
            tracing::debug!(class, source, path = %path.display(), "class loaded");
            LoadOutcome::Loaded(path)
        } else {
            tracing::warn!(class, source, path = %path.display(), "mapped file could not be included");
            LoadOutcome::Missing(path)
        }
    }

    fn include_files(&self) {
        let files = self.mappings.read().files.clone();
        for file in &files {
            if !self.includes.include_file(file) {
                tracing::warn!(path = %file.display(), "bootstrap file not included");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.registration.get_mut().take() {
            let _ = self.hooks.remove(id);
        }
    }
}

/// Hook installed into the host registry
///
/// Holds the autoloader weakly so that the registry does not keep it alive.
struct LoaderHook(Weak<Inner>);

impl ClassResolver for LoaderHook {
    fn resolve(&self, class: &str) -> LoadOutcome {
        match self.0.upgrade() {
            Some(inner) => inner.load_class(class),
            None => LoadOutcome::NotFound,
        }
    }
}

/// Builder for an [`Autoloader`]
pub struct AutoloaderBuilder {
    hooks: Arc<dyn HookRegistry>,
    class_map: ClassMap,
    namespace_map: NamespaceMap,
    includer: Arc<dyn FileIncluder>,
}

impl AutoloaderBuilder {
    /// Start with pre-populated or custom-configured class mappings
    pub fn class_map(mut self, class_map: ClassMap) -> Self {
        self.class_map = class_map;
        self
    }

    /// Start with a pre-populated or custom-configured namespace map
    pub fn namespace_map(mut self, namespace_map: NamespaceMap) -> Self {
        self.namespace_map = namespace_map;
        self
    }

    /// Set how resolved files are loaded into the host
    pub fn includer(mut self, includer: Arc<dyn FileIncluder>) -> Self {
        self.includer = includer;
        self
    }

    pub fn build(self) -> Autoloader {
        Autoloader {
            inner: Arc::new(Inner {
                mappings: RwLock::new(Mappings {
                    class_map: self.class_map,
                    namespace_map: self.namespace_map,
                    files: Vec::new(),
                }),
                registration: Mutex::new(None),
                hooks: self.hooks,
                includes: IncludeOnce::new(self.includer),
            }),
        }
    }
}

/// Class-name-to-file resolver and loader
///
/// Cloning yields another handle to the same autoloader.
#[derive(Clone)]
pub struct Autoloader {
    inner: Arc<Inner>,
}

impl Autoloader {
    /// Create an autoloader that registers into `hooks`
    pub fn new(hooks: Arc<dyn HookRegistry>) -> Self {
        Self::builder(hooks).build()
    }

    pub fn builder(hooks: Arc<dyn HookRegistry>) -> AutoloaderBuilder {
        AutoloaderBuilder {
            hooks,
            class_map: ClassMap::new(),
            namespace_map: NamespaceMap::new(),
            includer: Arc::new(NoopIncluder),
        }
    }

    /// Install the autoloader as a class-loading hook
    ///
    /// Bootstrap files are included first, in the order they were added;
    /// missing ones are skipped. Calling this while registered does nothing
    /// and returns `true`. Returns `false` if the registry refuses the hook.
    pub fn register(&self) -> bool {
        if self.is_registered() {
            return true;
        }

        // Bootstrap files may call back into the autoloader, so they are
        // included before the registration lock is taken.
        self.inner.include_files();

        let mut registration = self.inner.registration.lock();
        if registration.is_some() {
            return true;
        }

        let hook: Arc<dyn ClassResolver> = Arc::new(LoaderHook(Arc::downgrade(&self.inner)));
        match self.inner.hooks.install(hook, true) {
            Ok(id) => {
                tracing::debug!(hook = %id, "autoloader registered");
                *registration = Some(id);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register autoloader");
                false
            }
        }
    }

    /// Remove the autoloader's hook
    ///
    /// Calling this while unregistered does nothing and returns `true`.
    /// Returns `false` if the registry fails to remove the hook, in which
    /// case the autoloader stays registered.
    pub fn unregister(&self) -> bool {
        let mut registration = self.inner.registration.lock();
        let Some(id) = *registration else {
            return true;
        };

        match self.inner.hooks.remove(id) {
            Ok(()) => {
                tracing::debug!(hook = %id, "autoloader unregistered");
                *registration = None;
                true
            }
            Err(e) => {
                tracing::warn!(hook = %id, error = %e, "failed to unregister autoloader");
                false
            }
        }
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registration.lock().is_some()
    }

    /// Resolve a class and include its file
    pub fn load_class(&self, class: &str) -> LoadOutcome {
        self.inner.load_class(class)
    }

    /// Resolve a class to its file without including it
    ///
    /// A class-map entry is returned as mapped, whether or not its file
    /// exists; namespace matches are only returned for existing files.
    pub fn find_file(&self, class: &str) -> Option<PathBuf> {
        self.inner.find_file(class).map(|(path, _)| path)
    }

    pub fn add_namespace(&self, prefix: &str, path: impl AsRef<Path>, prepend: bool) -> &Self {
        self.inner
            .mappings
            .write()
            .namespace_map
            .add_namespace(prefix, path, prepend);
        self
    }

    pub fn add_namespaces<I, K, S>(&self, namespaces: I) -> &Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: AsRef<str>,
        S: Into<PathSpec>,
    {
        self.inner
            .mappings
            .write()
            .namespace_map
            .add_namespaces(namespaces);
        self
    }

    pub fn add_class(&self, class: impl Into<String>, path: impl AsRef<Path>) -> &Self {
        self.inner.mappings.write().class_map.add_class(class, path);
        self
    }

    pub fn add_classes<I, K, P>(&self, classes: I) -> &Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<Path>,
    {
        self.inner.mappings.write().class_map.add_classes(classes);
        self
    }

    /// Add a bootstrap file, included once when the autoloader registers
    pub fn add_file(&self, path: impl AsRef<Path>) -> &Self {
        self.inner.mappings.write().files.push(normalize_path(path));
        self
    }

    pub fn add_files<I, P>(&self, paths: I) -> &Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut mappings = self.inner.mappings.write();
        mappings.files.extend(paths.into_iter().map(normalize_path));
        self
    }

    /// All namespace prefixes and their directories
    pub fn namespaces(&self) -> IndexMap<String, Vec<PathBuf>> {
        self.inner.mappings.read().namespace_map.all_namespaces().clone()
    }

    /// Snapshot of the class map
    pub fn class_map(&self) -> ClassMap {
        self.inner.mappings.read().class_map.clone()
    }

    /// Snapshot of the namespace map
    pub fn namespace_map(&self) -> NamespaceMap {
        self.inner.mappings.read().namespace_map.clone()
    }

    /// Bootstrap files in the order they were added
    pub fn files(&self) -> Vec<PathBuf> {
        self.inner.mappings.read().files.clone()
    }

    /// Files included so far, in inclusion order
    pub fn included_files(&self) -> Vec<PathBuf> {
        self.inner.includes.included_files()
    }
}

impl ClassResolver for Autoloader {
    fn resolve(&self, class: &str) -> LoadOutcome {
        self.load_class(class)
    }
}

impl std::fmt::Debug for Autoloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (classes, namespaces, files) = {
            let mappings = self.inner.mappings.read();
            (
                mappings.class_map.len(),
                mappings.namespace_map.len(),
                mappings.files.len(),
            )
        };
        let registration = *self.inner.registration.lock();
        f.debug_struct("Autoloader")
            .field("classes", &classes)
            .field("namespaces", &namespaces)
            .field("files", &files)
            .field("registration", &registration)
            .finish()
    }
}
