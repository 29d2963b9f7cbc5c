//! Component G: adapts the kernel filesystem operation set to the
//! directory/cache/bucket components and enforces the read-only policy.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, Request,
};
use libc::ENOENT;
use log::{debug, error};
use tokio::runtime::Handle;

use crate::bucket::{CachedBucket, FileInfo};
use crate::cache::{EvictionWorker, OpenFileTable};
use crate::directory::{DirectoryNode, DirectoryStructure};
use crate::error::BucketFsError;
use crate::inode::PathTable;
use crate::runtime::block_on;

/// Block size reported by `statfs`: 4096 * 16.
const STATFS_BLOCK_SIZE: u32 = 65_536;
/// Total capacity reported by `statfs`: a cosmetic fiction, the bucket has
/// no fixed capacity.
const STATFS_TOTAL_BLOCKS: u64 = 1 << 40;

/// How long the kernel may cache an entry/attr reply before re-asking.
const ATTR_TTL: Duration = Duration::from_secs(1);

pub struct FilesystemFacade {
    directory: StdMutex<DirectoryStructure>,
    bucket: Arc<CachedBucket>,
    open_files: Arc<OpenFileTable>,
    paths: PathTable,
    runtime: Handle,
    eviction_worker: StdMutex<Option<EvictionWorker>>,
}

impl FilesystemFacade {
    pub fn new(
        bucket: Arc<CachedBucket>,
        open_files: Arc<OpenFileTable>,
        runtime: Handle,
        eviction_worker: EvictionWorker,
    ) -> Self {
        Self {
            directory: StdMutex::new(DirectoryStructure::new()),
            bucket,
            open_files,
            paths: PathTable::new(),
            runtime,
            eviction_worker: StdMutex::new(Some(eviction_worker)),
        }
    }

    fn refresh_directory(&self) -> Result<(), anyhow::Error> {
        let listing = block_on(&self.runtime, self.bucket.ls(true))?;
        let file_infos: Vec<FileInfo> = listing.iter().map(|(info, _)| info.clone()).collect();
        self.directory.lock().unwrap().update_structure(&file_infos, &[]);
        Ok(())
    }

    fn path_for_ino(&self, ino: u64) -> Option<String> {
        self.paths.path_of(ino)
    }

    fn attr_for_directory(&self, ino: u64) -> FileAttr {
        let now = SystemTime::now();
        directory_attr(ino, now)
    }

    fn attr_for_file(&self, ino: u64, info: &FileInfo) -> FileAttr {
        file_attr(ino, info)
    }

    fn lookup_attr(&self, path: &str) -> Option<FileAttr> {
        let directory = self.directory.lock().unwrap();
        let ino = self.paths.ino_of(path);
        if directory.is_file(path) {
            let info = directory.get_file_info(path)?;
            Some(self.attr_for_file(ino, info))
        } else if directory.is_directory(path) {
            Some(self.attr_for_directory(ino))
        } else {
            None
        }
    }
}

fn directory_attr(ino: u64, now: SystemTime) -> FileAttr {
    FileAttr {
        ino,
        size: 0,
        blocks: 0,
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: FileType::Directory,
        perm: 0o777,
        nlink: 2,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: STATFS_BLOCK_SIZE,
        flags: 0,
    }
}

fn file_attr(ino: u64, info: &FileInfo) -> FileAttr {
    let mtime = UNIX_EPOCH + Duration::from_millis(info.upload_timestamp.max(0) as u64);
    FileAttr {
        ino,
        size: info.size,
        blocks: (info.size + u64::from(STATFS_BLOCK_SIZE) - 1) / u64::from(STATFS_BLOCK_SIZE),
        atime: mtime,
        mtime,
        ctime: mtime,
        crtime: mtime,
        kind: FileType::RegularFile,
        perm: 0o777,
        nlink: 1,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: STATFS_BLOCK_SIZE,
        flags: 0,
    }
}

/// True if `path`'s parent directory is exactly `folder`.
fn in_folder(path: &str, folder: &str) -> bool {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent == folder,
        None => folder.is_empty(),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

// `create`/`write`/`truncate`/`unlink`/`rename`/`mkdir`/`rmdir`/`utimens`/
// `chmod`/`chown` are deliberately left unimplemented: `fuser::Filesystem`'s
// default method bodies already reply `ENOSYS` without touching the
// bucket, which is all the read-only enforcement this mount needs.
impl Filesystem for FilesystemFacade {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let parent_path = match self.path_for_ino(parent) {
            Some(path) => path,
            None => return reply.error(BucketFsError::NotFound(format!("inode {}", parent)).errno()),
        };
        let name = match name.to_str() {
            Some(name) => name,
            None => return reply.error(ENOENT),
        };
        let path = join(&parent_path, name);
        debug!("lookup '{}'", path);

        match self.lookup_attr(&path) {
            Some(attr) => reply.entry(&ATTR_TTL, &attr, 0),
            None => reply.error(BucketFsError::NotFound(path).errno()),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, _mask: i32, reply: ReplyEmpty) {
        let path = match self.path_for_ino(ino) {
            Some(path) => path,
            None => return reply.error(BucketFsError::AccessDenied(format!("inode {}", ino)).errno()),
        };
        debug!("access '{}'", path);
        let directory = self.directory.lock().unwrap();
        if directory.is_directory(&path) || directory.is_file(&path) {
            reply.ok();
        } else {
            reply.error(BucketFsError::AccessDenied(path).errno());
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let path = match self.path_for_ino(ino) {
            Some(path) => path,
            None => return reply.error(BucketFsError::NotFound(format!("inode {}", ino)).errno()),
        };
        debug!("getattr '{}'", path);

        match self.lookup_attr(&path) {
            Some(attr) => reply.attr(&ATTR_TTL, &attr),
            None => reply.error(BucketFsError::NotFound(path).errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let path = match self.path_for_ino(ino) {
            Some(path) => path,
            None => return reply.error(BucketFsError::NotFound(format!("inode {}", ino)).errno()),
        };
        debug!("readdir '{}' offset={}", path, offset);

        if let Err(err) = self.refresh_directory() {
            error!("readdir: listing refresh failed for '{}': {}", path, err);
            return reply.error(BucketFsError::RemoteFailure(err).errno());
        }

        let directory = self.directory.lock().unwrap();
        let node: &DirectoryNode = match directory.get_directory(&path) {
            Some(node) => node,
            None => return reply.error(BucketFsError::NotFound(path).errno()),
        };

        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];

        for file in &node.files {
            let basename = file.file_name.rsplit('/').next().unwrap_or(&file.file_name);
            let child_ino = self.paths.ino_of(&join(&path, basename));
            entries.push((child_ino, FileType::RegularFile, basename.to_string()));
        }

        for basename in node.subdirectories.keys() {
            let child_ino = self.paths.ino_of(&join(&path, basename));
            entries.push((child_ino, FileType::Directory, basename.clone()));
        }

        let mut seen: HashSet<String> = entries.iter().map(|(_, _, name)| name.clone()).collect();
        for open_path in self.open_files.open_paths() {
            if in_folder(&open_path, &path) {
                let basename = open_path.rsplit('/').next().unwrap_or(&open_path).to_string();
                if seen.insert(basename.clone()) {
                    let child_ino = self.paths.ino_of(&open_path);
                    entries.push((child_ino, FileType::RegularFile, basename));
                }
            }
        }

        for (idx, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (idx + 1) as i64, kind, &name) {
                break;
            }
        }

        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let path = match self.path_for_ino(ino) {
            Some(path) => path,
            None => return reply.error(BucketFsError::AccessDenied(format!("inode {}", ino)).errno()),
        };
        debug!("open '{}'", path);

        let info = {
            let directory = self.directory.lock().unwrap();
            match directory.get_file_info(&path) {
                Some(info) => info.clone(),
                None => return reply.error(BucketFsError::AccessDenied(path).errno()),
            }
        };

        let handle = self.open_files.open(&path, info, self.bucket.clone());
        reply.opened(handle, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path_for_ino(ino) {
            Some(path) => path,
            None => return reply.error(BucketFsError::NotFound(format!("inode {}", ino)).errno()),
        };
        debug!("read '{}' offset={} size={}", path, offset, size);

        let result = block_on(&self.runtime, self.open_files.read(&path, offset as u64, size as u64));
        match result {
            Ok(data) => reply.data(&data),
            Err(err) => {
                error!("read failed for '{}': {}", path, err);
                reply.error(BucketFsError::RemoteFailure(err).errno());
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        if let Some(path) = self.path_for_ino(ino) {
            self.open_files.release(&path);
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let used_blocks: u64 = {
            let directory = self.directory.lock().unwrap();
            total_size(directory.get_directory("").unwrap()) / u64::from(STATFS_BLOCK_SIZE)
        };
        let free_blocks = STATFS_TOTAL_BLOCKS.saturating_sub(used_blocks);

        reply.statfs(
            STATFS_TOTAL_BLOCKS,
            free_blocks,
            free_blocks,
            0,
            0,
            STATFS_BLOCK_SIZE,
            255,
            STATFS_BLOCK_SIZE,
        );
    }

    fn destroy(&mut self) {
        if let Some(worker) = self.eviction_worker.lock().unwrap().take() {
            debug!("stopping eviction worker on unmount");
            block_on(&self.runtime, worker.stop());
        }
    }
}

fn total_size(node: &DirectoryNode) -> u64 {
    let own: u64 = node.files.iter().map(|info| info.size).sum();
    let children: u64 = node.subdirectories.values().map(total_size).sum();
    own + children
}
