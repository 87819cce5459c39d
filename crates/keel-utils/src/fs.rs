use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| {
            FileSystemError::Directory {
                path: path.to_path_buf(),
                action: "create",
                source: err,
            }
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Removes the specified file or directory safely.
///
/// Missing paths are not an error. Directories are removed recursively.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| {
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source: err,
        }
    })
}

/// Copies `src` to `dst`, creating the parent directory of `dst` if needed.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> FileSystemResult<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if let Some(parent) = dst.parent() {
        ensure_dir_exists(parent)?;
    }
    fs::copy(src, dst).map_err(|err| {
        FileSystemError::File {
            path: src.to_path_buf(),
            action: "copy",
            source: err,
        }
    })?;
    Ok(())
}

/// Writes `content` to `path` through a sibling temporary file and a rename,
/// so readers never observe a partially written file.
pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let tmp_path = sibling_path(path, "part");

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()
    };
    write().map_err(|err| {
        FileSystemError::File {
            path: tmp_path.clone(),
            action: "write",
            source: err,
        }
    })?;

    fs::rename(&tmp_path, path).map_err(|err| {
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "rename",
            source: err,
        }
    })
}

/// Moves the directory `staged` into place at `target`.
///
/// An existing `target` is first renamed aside and only deleted once `staged`
/// has been renamed into its place. If the second rename fails the previous
/// directory is restored.
pub fn replace_dir<P: AsRef<Path>, Q: AsRef<Path>>(staged: P, target: Q) -> FileSystemResult<()> {
    let (staged, target) = (staged.as_ref(), target.as_ref());
    let backup = sibling_path(target, "old");

    safe_remove(&backup)?;
    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &backup).map_err(|err| {
            FileSystemError::Directory {
                path: target.to_path_buf(),
                action: "move aside",
                source: err,
            }
        })?;
    }

    if let Err(err) = fs::rename(staged, target) {
        if had_previous {
            if let Err(restore_err) = fs::rename(&backup, target) {
                warn!(
                    path = %target.display(),
                    backup = %backup.display(),
                    error = %restore_err,
                    "failed to restore previous directory"
                );
            }
        }
        return Err(FileSystemError::Directory {
            path: staged.to_path_buf(),
            action: "move into place",
            source: err,
        });
    }

    safe_remove(&backup)
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}
