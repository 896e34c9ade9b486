use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tempfile::{Builder, TempDir};

/// Owns a directory dedicated to one engine run. Mints uniquely named run
/// files within it and guarantees best-effort recursive deletion on drop,
/// whether the run ended in success, a fatal error, or cancellation.
pub(crate) struct TempSpace {
    dir: TempDir,
}

impl TempSpace {
    pub(crate) fn new(parent: &Path) -> Result<TempSpace, anyhow::Error> {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create temp parent dir: {}", parent.display()))?;
        let dir = Builder::new()
            .prefix("record-file-sort-")
            .tempdir_in(parent)
            .with_context(|| format!("create temp dir under: {}", parent.display()))?;
        Ok(TempSpace { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Mint a fresh, uniquely named run file under this space.
    pub(crate) fn new_run_file(&self) -> Result<(std::fs::File, PathBuf), anyhow::Error> {
        let tmp = Builder::new()
            .prefix("run-")
            .suffix(".tmp")
            .tempfile_in(self.dir.path())
            .with_context(|| format!("create run file under: {}", self.dir.path().display()))?;
        tmp.keep().map_err(|e| anyhow!("persist run file: {e}"))
    }

    /// A nested subdirectory that a single merge pass can populate and then
    /// drop as a unit.
    pub(crate) fn new_pass_dir(&self) -> Result<TempDir, anyhow::Error> {
        Builder::new()
            .prefix("pass-")
            .tempdir_in(self.dir.path())
            .with_context(|| format!("create pass dir under: {}", self.dir.path().display()))
    }
}
