//! One-time file inclusion
//!
//! Loading the definitions in a file is host specific and sits behind
//! [`FileIncluder`]. [`IncludeOnce`] wraps an includer so that each distinct
//! path is included successfully at most once per process, no matter how
//! many threads or autoloader handles ask for it.

use crate::discovery::parse_source;
use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use thiserror::Error;

/// Errors that can occur while including a file
#[derive(Debug, Error)]
pub enum IncludeError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file defines a symbol that is already defined
    #[error("Cannot redefine {symbol} from {path}: already defined in {defined_in}")]
    Redefinition {
        symbol: String,
        path: PathBuf,
        defined_in: PathBuf,
    },
}

/// Loads the definitions of one file into the host
pub trait FileIncluder: Send + Sync {
    fn include(&self, path: &Path) -> Result<(), IncludeError>;
}

/// Includer that loads nothing; inclusion is only recorded
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIncluder;

impl FileIncluder for NoopIncluder {
    fn include(&self, _path: &Path) -> Result<(), IncludeError> {
        Ok(())
    }
}

/// Includer that records the types each file declares
///
/// A file declaring a symbol that another file already defined is rejected
/// as a whole and records nothing.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: RwLock<IndexMap<String, PathBuf>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self, symbol: &str) -> bool {
        self.symbols.read().contains_key(symbol)
    }

    /// File that defined a symbol
    pub fn defined_in(&self, symbol: &str) -> Option<PathBuf> {
        self.symbols.read().get(symbol).cloned()
    }

    /// Defined symbols in definition order
    pub fn symbols(&self) -> Vec<String> {
        self.symbols.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}

impl FileIncluder for SymbolTable {
    fn include(&self, path: &Path) -> Result<(), IncludeError> {
        let content = std::fs::read_to_string(path).map_err(|source| IncludeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(info) = parse_source(&content) else {
            return Ok(());
        };

        let mut symbols = self.symbols.write();
        let declared = info.qualified_names();
        if let Some((symbol, defined_in)) = declared
            .iter()
            .find_map(|name| symbols.get(name).map(|file| (name, file)))
        {
            return Err(IncludeError::Redefinition {
                symbol: symbol.clone(),
                path: path.to_path_buf(),
                defined_in: defined_in.clone(),
            });
        }

        for symbol in declared {
            symbols.insert(symbol, path.to_path_buf());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncludeState {
    /// The includer is running on this thread
    InProgress(ThreadId),
    Done,
}

/// At-most-once inclusion guard shared across threads
pub struct IncludeOnce {
    includer: Arc<dyn FileIncluder>,
    state: Mutex<IndexMap<PathBuf, IncludeState>>,
    finished: Condvar,
}

impl IncludeOnce {
    pub fn new(includer: Arc<dyn FileIncluder>) -> Self {
        Self {
            includer,
            state: Mutex::new(IndexMap::new()),
            finished: Condvar::new(),
        }
    }

    /// Include a file unless it was included before
    ///
    /// Returns `false` when the file does not exist or the includer fails.
    /// While one thread includes a path, other threads asking for the same
    /// path wait for it to finish and then see its result; a failed include
    /// leaves the path unmarked so a waiting thread tries again. The including
    /// thread itself gets `true` straight away, so a file that includes
    /// itself (directly or through class loading) is not entered twice.
    pub fn include_file(&self, path: &Path) -> bool {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "include skipped, file does not exist");
            return false;
        }

        let current = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let waiting = match state.get(path) {
                None => false,
                Some(IncludeState::Done) => return true,
                Some(IncludeState::InProgress(owner)) => {
                    if *owner == current {
                        return true;
                    }
                    true
                }
            };
            if !waiting {
                break;
            }
            self.finished.wait(&mut state);
        }
        state.insert(path.to_path_buf(), IncludeState::InProgress(current));
        drop(state);

        let result = self.includer.include(path);

        let mut state = self.state.lock();
        let included = match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "included file");
                state.insert(path.to_path_buf(), IncludeState::Done);
                true
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "include failed");
                state.shift_remove(path);
                false
            }
        };
        drop(state);
        self.finished.notify_all();
        included
    }

    /// Whether a file was included successfully
    pub fn is_included(&self, path: &Path) -> bool {
        self.state.lock().get(path) == Some(&IncludeState::Done)
    }

    /// Included files in inclusion order
    pub fn included_files(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .iter()
            .filter(|(_, state)| **state == IncludeState::Done)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

impl std::fmt::Debug for IncludeOnce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncludeOnce")
            .field("included", &self.included_files().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting(AtomicUsize);

    impl FileIncluder for Counting {
        fn include(&self, _path: &Path) -> Result<(), IncludeError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_file_included_once() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("helpers.php");
        std::fs::write(&file, "<?php\n").unwrap();

        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let once = IncludeOnce::new(counter.clone());

        assert!(once.include_file(&file));
        assert!(once.include_file(&file));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(once.included_files(), [file]);
    }

    #[test]
    fn test_missing_file_is_not_included() {
        let once = IncludeOnce::new(Arc::new(NoopIncluder));
        let missing = Path::new("/no/such/file.php");

        assert!(!once.include_file(missing));
        assert!(!once.is_included(missing));
    }

    #[test]
    fn test_include_is_once_across_threads() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("Shared.php");
        std::fs::write(&file, "<?php\n").unwrap();

        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let once = Arc::new(IncludeOnce::new(counter.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let once = Arc::clone(&once);
                let file = file.clone();
                std::thread::spawn(move || once.include_file(&file))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    /// Includer that sleeps before answering
    struct Slow {
        calls: AtomicUsize,
        finished: AtomicBool,
        fail: bool,
    }

    impl Slow {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                finished: AtomicBool::new(false),
                fail,
            }
        }
    }

    impl FileIncluder for Slow {
        fn include(&self, path: &Path) -> Result<(), IncludeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            self.finished.store(true, Ordering::SeqCst);
            if self.fail {
                Err(IncludeError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("boom"),
                })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_concurrent_caller_waits_for_include_to_finish() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("Slow.php");
        std::fs::write(&file, "<?php\n").unwrap();

        let slow = Arc::new(Slow::new(false));
        let once = Arc::new(IncludeOnce::new(slow.clone()));

        let first = {
            let once = Arc::clone(&once);
            let file = file.clone();
            std::thread::spawn(move || once.include_file(&file))
        };
        std::thread::sleep(Duration::from_millis(50));

        assert!(once.include_file(&file));
        assert!(slow.finished.load(Ordering::SeqCst));
        assert!(first.join().unwrap());
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_caller_sees_failed_include() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("Broken.php");
        std::fs::write(&file, "<?php\n").unwrap();

        let slow = Arc::new(Slow::new(true));
        let once = Arc::new(IncludeOnce::new(slow.clone()));

        let first = {
            let once = Arc::clone(&once);
            let file = file.clone();
            std::thread::spawn(move || once.include_file(&file))
        };
        std::thread::sleep(Duration::from_millis(50));

        assert!(!once.include_file(&file));
        assert!(!first.join().unwrap());
        assert!(!once.is_included(&file));
        assert!(once.included_files().is_empty());
    }

    #[test]
    fn test_symbol_table_rejects_redefinition() {
        let temp = tempfile::tempdir().unwrap();
        let first = temp.path().join("Foo.php");
        let second = temp.path().join("Foo2.php");
        std::fs::write(&first, "<?php\nnamespace App;\nclass Foo {}\n").unwrap();
        std::fs::write(&second, "<?php\nnamespace App;\nclass Foo {}\nclass Bar {}\n").unwrap();

        let table = SymbolTable::new();
        table.include(&first).unwrap();
        assert!(table.is_defined("App\\Foo"));

        let err = table.include(&second).unwrap_err();
        assert!(matches!(err, IncludeError::Redefinition { ref symbol, .. } if symbol == "App\\Foo"));
        assert!(!table.is_defined("App\\Bar"));
        assert_eq!(table.defined_in("App\\Foo"), Some(first));
    }

    #[test]
    fn test_failed_include_can_be_retried() {
        let temp = tempfile::tempdir().unwrap();
        let original = temp.path().join("A.php");
        let clash = temp.path().join("B.php");
        std::fs::write(&original, "<?php\nclass A {}\n").unwrap();
        std::fs::write(&clash, "<?php\nclass A {}\n").unwrap();

        let once = IncludeOnce::new(Arc::new(SymbolTable::new()));
        assert!(once.include_file(&original));
        assert!(!once.include_file(&clash));
        assert!(!once.is_included(&clash));
    }
}
