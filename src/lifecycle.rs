//! Per-request working files.
//!
//! Each render gets a fresh v4 uuid, so concurrent requests (even for the
//! same recipient) never share a path. The intermediate file lives inside an
//! [`IntermediateFile`] guard that deletes it when the request scope ends.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::RenderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingFileSet {
    pub id: Uuid,
    /// `<work_dir>/temp_certificate_<id>.html`
    pub intermediate: PathBuf,
    /// `<work_dir>/certificate_<id>.pdf`
    pub output: PathBuf,
}

impl WorkingFileSet {
    /// Issue a new id under `work_dir`, creating the directory if needed.
    pub fn allocate(work_dir: &Path) -> Result<Self, RenderError> {
        std::fs::create_dir_all(work_dir).map_err(|e| {
            RenderError::io(format!("creating work dir {}", work_dir.display()), e)
        })?;
        Ok(Self::with_id(work_dir, Uuid::new_v4()))
    }

    pub fn with_id(work_dir: &Path, id: Uuid) -> Self {
        Self {
            id,
            intermediate: work_dir.join(format!("temp_certificate_{id}.html")),
            output: work_dir.join(format!("certificate_{id}.pdf")),
        }
    }
}

/// Owns the filled template on disk and removes it on drop, whichever way
/// the request ends.
#[derive(Debug)]
pub struct IntermediateFile {
    path: PathBuf,
}

impl IntermediateFile {
    /// Write `contents` to `path` and start guarding it.
    pub async fn create(path: PathBuf, contents: &str) -> Result<Self, RenderError> {
        // Guard first so a partial write is still cleaned up.
        let guard = Self { path };
        tokio::fs::write(&guard.path, contents).await.map_err(|e| {
            RenderError::io(format!("writing {}", guard.path.display()), e)
        })?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IntermediateFile {
    fn drop(&mut self) {
        release(&self.path);
    }
}

/// Best-effort removal: a missing file is fine, anything else is logged.
pub fn release(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_naming_scheme() {
        let id = Uuid::nil();
        let set = WorkingFileSet::with_id(Path::new("/w"), id);
        assert_eq!(
            set.intermediate,
            PathBuf::from(format!("/w/temp_certificate_{id}.html"))
        );
        assert_eq!(set.output, PathBuf::from(format!("/w/certificate_{id}.pdf")));
    }

    #[test]
    fn allocate_creates_dir_and_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("nested/work");
        let a = WorkingFileSet::allocate(&work).unwrap();
        let b = WorkingFileSet::allocate(&work).unwrap();
        assert!(work.is_dir());
        assert_ne!(a.id, b.id);
        assert_ne!(a.output, b.output);
    }

    #[tokio::test]
    async fn guard_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.html");
        {
            let guard = IntermediateFile::create(path.clone(), "<p>x</p>").await.unwrap();
            assert!(guard.path().exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn releasing_a_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        release(&dir.path().join("never-written.html"));
    }
}
