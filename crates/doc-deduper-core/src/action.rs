//! Filesystem mutations: rename, cross-device safe moves, quarantine and trash.
//!
//! Nothing here consults the run mode. The pipeline decides whether to call these
//! or only compute the target paths.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SortStrategy;
use crate::error::{is_cross_device_io, Error, Result};
use crate::logging::{log_file_error, log_fs_modification};
use crate::naming::sanitize_component;
use crate::types::DocumentContext;

/// Rename within the same directory. Never clobbers an existing file.
pub fn rename_in_place(path: &Path, new_name: &str) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let target = parent.join(new_name);
    if target == path {
        return Ok(target);
    }
    if target.symlink_metadata().is_ok() {
        return Err(Error::SafetyCheck(format!(
            "refusing to overwrite {}",
            target.display()
        )));
    }

    fs::rename(path, &target).map_err(|err| {
        log_file_error(path, "rename", &err);
        Error::Io(err)
    })?;
    log_fs_modification("rename", path, Some(&format!("-> {}", target.display())));
    Ok(target)
}

/// Move `src` to `dest`, creating parents as needed.
///
/// A rename across storage devices falls back to copy, fsync, size check and only
/// then removal of the source. If any of those steps fails the copy is removed
/// again and the source stays where it was.
pub fn relocate(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(src, dest) {
        Ok(()) => {}
        Err(err) if is_cross_device_io(&err) => {
            copy_then_remove(src, dest).map_err(|err| {
                log_file_error(src, "move", &err);
                Error::Io(err)
            })?;
        }
        Err(err) => {
            log_file_error(src, "move", &err);
            return Err(Error::Io(err));
        }
    }

    log_fs_modification("move", src, Some(&format!("-> {}", dest.display())));
    Ok(())
}

fn copy_then_remove(src: &Path, dest: &Path) -> io::Result<()> {
    copy_then(src, dest, |path| fs::remove_file(path))
}

/// Copy `src` to `dest` with its modification time, then hand `src` to `remove`.
///
/// Any failure after the copy starts removes `dest` again, so the caller sees
/// either a completed move or an untouched source and no destination.
fn copy_then<F>(src: &Path, dest: &Path, remove: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let result = (|| -> io::Result<()> {
        let source = fs::metadata(src)?;
        let copied = fs::copy(src, dest)?;

        let file = fs::File::options().write(true).open(dest)?;
        file.set_modified(source.modified()?)?;
        file.sync_all()?;
        let expected = source.len();
        if copied != expected || file.metadata()?.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("incomplete copy of {}", src.display()),
            ));
        }
        drop(file);

        remove(src)
    })();

    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

/// `<root>/<dir>/<group_id>/<stem>_dupV<NN><ext>`
pub fn quarantine_target(
    root: &Path,
    quarantine_dir: &str,
    group_id: &str,
    path: &Path,
    rank: usize,
) -> PathBuf {
    let (stem, ext) = split_name(path);
    root.join(quarantine_dir)
        .join(group_id)
        .join(format!("{}_dupV{:02}{}", stem, rank, ext))
}

/// Send a file to recoverable storage and return where it went, if known.
///
/// With `trash_dir` set the file is moved there under a unique name. Otherwise the
/// platform trash takes it.
pub fn send_to_trash(path: &Path, trash_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    match trash_dir {
        Some(dir) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| Error::Trash(format!("invalid file name: {}", path.display())))?;
            fs::create_dir_all(dir)?;
            let dest = unique_destination(dir, file_name);
            relocate(path, &dest)?;
            Ok(Some(dest))
        }
        None => {
            trash::delete(path).map_err(|err| {
                let err = Error::Trash(err.to_string());
                log_file_error(path, "trash", &err);
                err
            })?;
            log_fs_modification("trash", path, None);
            Ok(None)
        }
    }
}

/// `name.ext`, `name(1).ext`, `name(2).ext`, ... whichever is free first
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let initial = dir.join(file_name);
    if initial.symlink_metadata().is_err() {
        return initial;
    }

    let (stem, ext) = split_name(Path::new(file_name));
    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{}({}){}", stem, counter, ext));
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        counter += 1;
    }
}

/// Subfolder (relative to the sort root) a file belongs in
pub fn sort_subfolder(strategy: SortStrategy, context: &DocumentContext) -> PathBuf {
    let mut sub = PathBuf::from(strategy.as_str());
    match strategy {
        SortStrategy::ByCategory => sub.push(sanitize_component(&context.category)),
        SortStrategy::ByDate => {
            sub.push(context.date.format("%Y").to_string());
            sub.push(context.date.format("%Y-%m-%d").to_string());
        }
        SortStrategy::ByType => {
            let ext = context.extension.trim_start_matches('.').to_lowercase();
            sub.push(if ext.is_empty() { "noext".to_string() } else { ext });
        }
    }
    sub
}

/// `<root>/<sorted_dir>/<subfolder>/<name>`.
///
/// A name already on disk or in `claimed` becomes `<stem>_sorted<ext>`, then
/// `<stem>_sorted2<ext>`, `<stem>_sorted3<ext>`, ...
pub fn sort_target(
    root: &Path,
    sorted_dir: &str,
    strategy: SortStrategy,
    path: &Path,
    context: &DocumentContext,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let folder = root.join(sorted_dir).join(sort_subfolder(strategy, context));
    let is_free = |p: &Path| !claimed.contains(p) && p.symlink_metadata().is_err();

    let file_name = path.file_name().unwrap_or_else(|| OsStr::new("unnamed"));
    let target = folder.join(file_name);
    if is_free(&target) {
        return target;
    }

    let (stem, ext) = split_name(path);
    let sorted = folder.join(format!("{}_sorted{}", stem, ext));
    if is_free(&sorted) {
        return sorted;
    }
    let mut counter = 2;
    loop {
        let candidate = folder.join(format!("{}_sorted{}{}", stem, counter, ext));
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}
