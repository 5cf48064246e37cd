//! Staging area for every file of one run.
//!
//! Sinks write into a temporary directory next to the output directory. Nothing appears in the
//! output directory until [`StagedOutput::publish`]; dropping an unpublished stage removes
//! everything written so far.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use tracing::{debug, info};

use super::io_error;
use crate::error::Result;

pub struct StagedOutput {
    out_dir: PathBuf,
    staging: TempDir,
}

impl StagedOutput {
    /// The stage lives in the output directory's parent so publishing is a same-filesystem rename.
    pub fn create(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        let parent = out_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        fs::create_dir_all(&parent).map_err(io_error(&parent))?;

        let name = out_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        let staging = Builder::new()
            .prefix(&format!(".{name}.staging-"))
            .tempdir_in(&parent)
            .map_err(io_error(&parent))?;
        debug!(dir = %staging.path().display(), "output stage created");

        Ok(Self { out_dir, staging })
    }

    /// Directory sinks write into.
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Move every staged file into the output directory, keeping its relative path.
    /// Returns the published paths in sorted order.
    pub fn publish(self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        staged_files(self.staging.path(), Path::new(""), &mut files)?;
        files.sort();

        fs::create_dir_all(&self.out_dir).map_err(io_error(&self.out_dir))?;
        let mut published = Vec::with_capacity(files.len());
        for relative in files {
            let target = self.out_dir.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            let staged = self.staging.path().join(&relative);
            fs::rename(&staged, &target).map_err(io_error(&target))?;
            published.push(target);
        }

        info!(dir = %self.out_dir.display(), files = published.len(), "output published");
        Ok(published)
    }
}

fn staged_files(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let dir = root.join(relative);
    for entry in fs::read_dir(&dir).map_err(io_error(&dir))? {
        let entry = entry.map_err(io_error(&dir))?;
        let path = relative.join(entry.file_name());
        if entry.file_type().map_err(io_error(&dir))?.is_dir() {
            staged_files(root, &path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
