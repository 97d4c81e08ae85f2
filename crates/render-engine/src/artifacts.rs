//! Per-job temporary files.
//!
//! Every file a render job writes (input video, caption PNGs, intermediate
//! batch outputs) is allocated from the job's [`ArtifactArena`]. The arena
//! owns a private directory under the configured temp root; closing or
//! dropping it removes everything still inside, on success and failure
//! alike. Intermediate outputs are released as soon as the next batch has
//! consumed them so disk usage stays bounded by two videos plus one
//! batch of images.

use std::path::{Path, PathBuf};

use subburn_common::error::SubburnResult;
use tempfile::TempDir;

/// A file allocated from an arena.
///
/// Not `Clone`: releasing an artifact consumes it.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owner of a job's temporary directory.
#[derive(Debug)]
pub struct ArtifactArena {
    dir: TempDir,
    issued: Vec<PathBuf>,
    counter: usize,
}

impl ArtifactArena {
    /// Create a fresh directory for `job_id` under `root`.
    pub fn new_in(root: &Path, job_id: &str) -> SubburnResult<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("subburn-{}-", sanitize(job_id)))
            .tempdir_in(root)?;
        tracing::debug!(job_id, dir = %dir.path().display(), "Created artifact directory");
        Ok(Self {
            dir,
            issued: Vec::new(),
            counter: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a unique path `<stem>-<n>.<ext>` inside the arena.
    ///
    /// The file is not created; the caller writes it.
    pub fn allocate(&mut self, stem: &str, ext: &str) -> Artifact {
        let path = self
            .dir
            .path()
            .join(format!("{stem}-{:05}.{ext}", self.counter));
        self.counter += 1;
        self.issued.push(path.clone());
        Artifact { path }
    }

    /// Delete an artifact early. A file that was never written is fine.
    pub fn release(&mut self, artifact: Artifact) -> SubburnResult<()> {
        self.issued.retain(|p| p != &artifact.path);
        match std::fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Paths allocated and not yet released.
    pub fn issued(&self) -> &[PathBuf] {
        &self.issued
    }

    /// Remove the directory and everything left in it.
    pub fn close(self) -> SubburnResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!(dir = %path.display(), "Removed artifact directory");
        Ok(())
    }
}

fn sanitize(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_unique_and_inside_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut arena = ArtifactArena::new_in(root.path(), "job-1").unwrap();
        let a = arena.allocate("cue", "png");
        let b = arena.allocate("cue", "png");
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(arena.dir()));
        assert_eq!(arena.issued().len(), 2);
    }

    #[test]
    fn test_release_removes_file_and_tolerates_missing() {
        let root = tempfile::tempdir().unwrap();
        let mut arena = ArtifactArena::new_in(root.path(), "job").unwrap();
        let written = arena.allocate("batch", "mp4");
        std::fs::write(written.path(), b"data").unwrap();
        let path = written.path().to_path_buf();
        arena.release(written).unwrap();
        assert!(!path.exists());

        let never_written = arena.allocate("batch", "mp4");
        arena.release(never_written).unwrap();
        assert!(arena.issued().is_empty());
    }

    #[test]
    fn test_close_and_drop_remove_everything() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut arena = ArtifactArena::new_in(root.path(), "dropped").unwrap();
            let a = arena.allocate("x", "bin");
            std::fs::write(a.path(), b"1").unwrap();
        }
        let mut arena = ArtifactArena::new_in(root.path(), "closed/../id").unwrap();
        let a = arena.allocate("x", "bin");
        std::fs::write(a.path(), b"1").unwrap();
        arena.close().unwrap();

        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
