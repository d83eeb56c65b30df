// src/locate.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, warn};

/// Finds the newest file matching a file-name pattern.
///
/// The pipeline, viewer and notifier only ever ask for "the latest" export or
/// snapshot; keeping that behind a trait lets tests hand out fixed paths.
pub trait FileLocator {
    fn latest(&self, pattern: &str) -> Result<Option<PathBuf>>;
}

/// Scans a single directory with `glob` and picks the most recently created match.
pub struct GlobLocator {
    dir: PathBuf,
}

impl GlobLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileLocator for GlobLocator {
    fn latest(&self, pattern: &str) -> Result<Option<PathBuf>> {
        // the directory is literal; only `pattern` carries glob syntax
        let dir = Pattern::escape(&self.dir.display().to_string());
        let full = format!("{}/{}", dir, pattern);
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for entry in glob(&full).with_context(|| format!("bad glob pattern `{}`", full))? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("skipping unreadable glob entry: {}", e);
                    continue;
                }
            };
            let meta = fs::metadata(&path)
                .with_context(|| format!("reading metadata of {}", path.display()))?;
            if !meta.is_file() {
                continue;
            }
            // Not every filesystem records a birth time.
            let stamp = meta.created().or_else(|_| meta.modified())?;

            let newer = match &newest {
                None => true,
                Some((t, p)) => stamp > *t || (stamp == *t && path > *p),
            };
            if newer {
                newest = Some((stamp, path));
            }
        }

        debug!(pattern = %full, found = ?newest.as_ref().map(|(_, p)| p), "latest file");
        Ok(newest.map(|(_, p)| p))
    }
}

/// Hands back a fixed answer; for callers that already know the file.
pub struct FixedLocator(pub Option<PathBuf>);

impl FileLocator for FixedLocator {
    fn latest(&self, _pattern: &str) -> Result<Option<PathBuf>> {
        Ok(self.0.clone())
    }
}
