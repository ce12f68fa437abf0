use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{BROKEN_EXTENSION, LINK_EXTENSION, WorkItem};
use crate::error::QueueError;
use crate::fs_util;

#[derive(Debug, Clone)]
pub struct LinkQueue {
    root: Utf8PathBuf,
}

impl LinkQueue {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<(), QueueError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| QueueError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn path_for(&self, item: &WorkItem) -> Utf8PathBuf {
        self.root.join(item.link_file_name())
    }

    pub fn enqueue(&self, item: &WorkItem) -> Result<Utf8PathBuf, QueueError> {
        let path = self.path_for(item);
        let content =
            serde_json::to_vec(item).map_err(|err| QueueError::Serialization(err.to_string()))?;
        fs_util::write_atomic(path.as_std_path(), &content)?;
        Ok(path)
    }

    pub fn load(path: &Utf8Path) -> Result<WorkItem, QueueError> {
        let content = match fs::read(path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(QueueError::NotFound(path.as_std_path().to_path_buf()));
            }
            Err(err) => return Err(QueueError::Filesystem(format!("read {path}: {err}"))),
        };
        serde_json::from_slice(&content)
            .map_err(|err| QueueError::Serialization(format!("{path}: {err}")))
    }

    pub fn pending(&self) -> Result<Vec<Utf8PathBuf>, QueueError> {
        self.list(LINK_EXTENSION)
    }

    pub fn broken(&self) -> Result<Vec<Utf8PathBuf>, QueueError> {
        self.list(BROKEN_EXTENSION)
    }

    pub fn complete(path: &Utf8Path) -> Result<(), QueueError> {
        fs::remove_file(path.as_std_path()).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => QueueError::NotFound(path.as_std_path().to_path_buf()),
            _ => QueueError::Filesystem(format!("remove {path}: {err}")),
        })
    }

    pub fn mark_broken(path: &Utf8Path) -> Result<Utf8PathBuf, QueueError> {
        let target = path.with_extension(BROKEN_EXTENSION);
        rename(path, &target)?;
        Ok(target)
    }

    pub fn requeue_broken(&self) -> Result<Vec<Utf8PathBuf>, QueueError> {
        let mut requeued = Vec::new();
        for path in self.broken()? {
            let target = path.with_extension(LINK_EXTENSION);
            rename(&path, &target)?;
            requeued.push(target);
        }
        Ok(requeued)
    }

    fn list(&self, ext: &str) -> Result<Vec<Utf8PathBuf>, QueueError> {
        fs_util::list_with_extension(self.root.as_std_path(), ext)?
            .into_iter()
            .map(|path| {
                Utf8PathBuf::from_path_buf(path).map_err(|path| {
                    QueueError::Filesystem(format!("non-utf8 path {}", path.display()))
                })
            })
            .collect()
    }
}

fn rename(from: &Utf8Path, to: &Utf8Path) -> Result<(), QueueError> {
    fs::rename(from.as_std_path(), to.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => QueueError::NotFound(from.as_std_path().to_path_buf()),
        _ => QueueError::Filesystem(format!("rename {from} -> {to}: {err}")),
    })
}
