//! Heavy (out-of-core) references and the lazy value wrapper.
//!
//! A [`HeavyRef`] names a group inside a container file. A [`Lazy<T>`] is
//! either resident data or a deferred reference that materializes on first
//! access and keeps the loaded copy for its own lifetime. The backing file is
//! never written through a heavy reference.

use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshFieldError;

/// Lightweight handle to data stored in a container file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeavyRef {
    /// Container file holding the group.
    pub path: PathBuf,
    /// Group name inside the container.
    pub group: String,
    /// When set, a loaded copy may be read but not mutated in place.
    pub read_only: bool,
}

impl HeavyRef {
    pub fn new(path: impl Into<PathBuf>, group: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            group: group.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Types that can be materialized from a [`HeavyRef`].
pub trait HeavyLoad: Sized {
    fn load(source: &HeavyRef) -> Result<Self, MeshFieldError>;
}

/// Resident data or a deferred heavy reference with a once-initialized cache.
#[derive(Clone, Debug)]
pub enum Lazy<T> {
    Resident(T),
    Deferred { source: HeavyRef, cell: OnceCell<T> },
}

impl<T> Lazy<T> {
    pub fn resident(value: T) -> Self {
        Lazy::Resident(value)
    }

    pub fn deferred(source: HeavyRef) -> Self {
        Lazy::Deferred {
            source,
            cell: OnceCell::new(),
        }
    }

    /// True once the data is in memory.
    pub fn is_loaded(&self) -> bool {
        match self {
            Lazy::Resident(_) => true,
            Lazy::Deferred { cell, .. } => cell.get().is_some(),
        }
    }

    /// The backing reference, if any.
    pub fn source(&self) -> Option<&HeavyRef> {
        match self {
            Lazy::Resident(_) => None,
            Lazy::Deferred { source, .. } => Some(source),
        }
    }
}

impl<T: HeavyLoad> Lazy<T> {
    /// Borrow the data, loading it on first access.
    ///
    /// Concurrent first accesses from several threads load once; the other
    /// callers block until the value is available.
    pub fn get(&self) -> Result<&T, MeshFieldError> {
        match self {
            Lazy::Resident(value) => Ok(value),
            Lazy::Deferred { source, cell } => cell.get_or_try_init(|| {
                debug!(
                    "loading heavy group `{}` from {}",
                    source.group,
                    source.path.display()
                );
                T::load(source)
            }),
        }
    }

    /// Mutable access. A deferred value is materialized and becomes resident;
    /// read-only references are rejected.
    pub fn get_mut(&mut self) -> Result<&mut T, MeshFieldError> {
        if let Lazy::Deferred { source, cell } = self {
            if source.read_only {
                return Err(MeshFieldError::ReadOnly(format!(
                    "group `{}` in {}",
                    source.group,
                    source.path.display()
                )));
            }
            let value = match cell.take() {
                Some(value) => value,
                None => T::load(source)?,
            };
            *self = Lazy::Resident(value);
        }
        match self {
            Lazy::Resident(value) => Ok(value),
            Lazy::Deferred { source, .. } => Err(MeshFieldError::ReadOnly(format!(
                "group `{}` is still deferred",
                source.group
            ))),
        }
    }

    /// Take ownership of the data, loading it if needed.
    pub fn into_inner(self) -> Result<T, MeshFieldError> {
        match self {
            Lazy::Resident(value) => Ok(value),
            Lazy::Deferred { source, cell } => match cell.into_inner() {
                Some(value) => Ok(value),
                None => T::load(&source),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static LOADS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, PartialEq)]
    struct Counted(String);

    impl HeavyLoad for Counted {
        fn load(source: &HeavyRef) -> Result<Self, MeshFieldError> {
            LOADS.fetch_add(1, Ordering::SeqCst);
            if source.group == "missing" {
                return Err(MeshFieldError::UnknownGroup {
                    path: source.path.display().to_string(),
                    group: source.group.clone(),
                });
            }
            Ok(Counted(source.group.clone()))
        }
    }

    #[test]
    fn deferred_loads_once() {
        let lazy: Lazy<Counted> = Lazy::deferred(HeavyRef::new("a.mfc", "once"));
        assert!(!lazy.is_loaded());
        let before = LOADS.load(Ordering::SeqCst);
        assert_eq!(lazy.get().unwrap(), &Counted("once".into()));
        assert_eq!(lazy.get().unwrap(), &Counted("once".into()));
        assert_eq!(LOADS.load(Ordering::SeqCst) - before, 1);
        assert!(lazy.is_loaded());
        assert!(lazy.source().is_some());
    }

    #[test]
    fn load_failure_is_retried_later() {
        let lazy: Lazy<Counted> = Lazy::deferred(HeavyRef::new("a.mfc", "missing"));
        assert!(lazy.get().unwrap_err().is_lookup());
        assert!(!lazy.is_loaded());
    }

    #[test]
    fn read_only_rejects_mutation() {
        let mut lazy: Lazy<Counted> =
            Lazy::deferred(HeavyRef::new("a.mfc", "ro").read_only(true));
        assert!(matches!(lazy.get_mut(), Err(MeshFieldError::ReadOnly(_))));
        let mut writable: Lazy<Counted> = Lazy::deferred(HeavyRef::new("a.mfc", "rw"));
        writable.get_mut().unwrap().0.push('!');
        assert!(writable.source().is_none());
        assert_eq!(writable.get().unwrap(), &Counted("rw!".into()));
    }
}
