//! File existence probes
use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// Answers whether a path is already occupied
pub trait FileProbe {
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

/// Probes the real file system
#[derive(Copy, Clone, Default, Debug)]
pub struct OsProbe;

impl FileProbe for OsProbe {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }
}

impl<F> FileProbe for F
where
    F: Fn(&Path) -> io::Result<bool>,
{
    fn exists(&self, path: &Path) -> io::Result<bool> {
        self(path)
    }
}

/// A probe which also treats previously reserved paths as occupied
///
/// Planning a batch does not touch the disk, so targets handed out earlier
/// in the batch have to be remembered to avoid assigning them twice.
#[derive(Debug, Default)]
pub struct Reserving<P> {
    inner: P,
    reserved: RefCell<HashSet<PathBuf>>,
}

impl<P: FileProbe> Reserving<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            reserved: Default::default(),
        }
    }

    /// Mark `path` as taken for the rest of the batch
    pub fn reserve(&self, path: impl Into<PathBuf>) {
        self.reserved.borrow_mut().insert(path.into());
    }
}

impl<P: FileProbe> FileProbe for Reserving<P> {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        if self.reserved.borrow().contains(path) {
            return Ok(true);
        }
        self.inner.exists(path)
    }
}
