use std::path::{Component, Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

/// Guards every mutation the pipeline performs under a scanned root
#[derive(Debug, Clone)]
pub struct SafetyManager {
    root: PathBuf,
    dry_run: bool,
}

impl SafetyManager {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: normalize(root),
            dry_run: config.dry_run,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Refuse to overwrite anything already on disk
    pub fn ensure_vacant(&self, target: &Path) -> Result<()> {
        if target.symlink_metadata().is_ok() {
            return Err(Error::SafetyCheck(format!(
                "target already exists: {}",
                target.display()
            )));
        }
        Ok(())
    }

    /// Refuse targets that would escape the scanned root
    pub fn ensure_within_root(&self, target: &Path) -> Result<()> {
        if normalize(target).starts_with(&self.root) {
            Ok(())
        } else {
            Err(Error::SafetyCheck(format!(
                "{} is outside {}",
                target.display(),
                self.root.display()
            )))
        }
    }

    /// Both checks, for quarantine and sort destinations
    pub fn check_move_target(&self, target: &Path) -> Result<()> {
        self.ensure_within_root(target)?;
        self.ensure_vacant(target)
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
