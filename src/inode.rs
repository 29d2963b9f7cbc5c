//! Bridges the kernel binding's inode-keyed operations to the path-keyed
//! operations the rest of the crate works in terms of.
//!
//! `fuser::Filesystem` identifies everything by `ino: u64`; `DirectoryStructure`
//! and `OpenFileTable` identify everything by normalized path. `PathTable`
//! assigns a stable inode to every path it has been asked about and
//! remembers the mapping for the life of the mount (inodes are never
//! reused, matching the kernel's expectation that an inode number is
//! never recycled while any reference to it is outstanding).

use std::collections::HashMap;
use std::sync::Mutex;

/// The root directory's inode, fixed by the kernel filesystem protocol.
pub const ROOT_INODE: u64 = 1;

struct Inner {
    next_ino: u64,
    ino_to_path: HashMap<u64, String>,
    path_to_ino: HashMap<String, u64>,
}

pub struct PathTable {
    inner: Mutex<Inner>,
}

impl PathTable {
    pub fn new() -> Self {
        let mut ino_to_path = HashMap::new();
        let mut path_to_ino = HashMap::new();
        ino_to_path.insert(ROOT_INODE, String::new());
        path_to_ino.insert(String::new(), ROOT_INODE);

        Self {
            inner: Mutex::new(Inner {
                next_ino: ROOT_INODE + 1,
                ino_to_path,
                path_to_ino,
            }),
        }
    }

    /// Look up the path for `ino`, if one has been assigned.
    pub fn path_of(&self, ino: u64) -> Option<String> {
        self.inner.lock().unwrap().ino_to_path.get(&ino).cloned()
    }

    /// Return the inode for `path`, assigning a fresh one if this is the
    /// first time `path` has been seen.
    pub fn ino_of(&self, path: &str) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ino) = inner.path_to_ino.get(path) {
            return *ino;
        }

        let ino = inner.next_ino;
        inner.next_ino += 1;
        inner.path_to_ino.insert(path.to_string(), ino);
        inner.ino_to_path.insert(ino, path.to_string());
        ino
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_is_preassigned() {
        let table = PathTable::new();
        assert_eq!(table.path_of(ROOT_INODE), Some(String::new()));
        assert_eq!(table.ino_of(""), ROOT_INODE);
    }

    #[test]
    fn same_path_yields_same_inode() {
        let table = PathTable::new();
        let a = table.ino_of("a/b.txt");
        let b = table.ino_of("a/b.txt");
        assert_eq!(a, b);
        assert_eq!(table.path_of(a).as_deref(), Some("a/b.txt"));
    }

    #[test]
    fn distinct_paths_yield_distinct_inodes() {
        let table = PathTable::new();
        let a = table.ino_of("a.txt");
        let b = table.ino_of("b.txt");
        assert_ne!(a, b);
    }
}
