use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};

use crate::error::ConvertError;

/// Extension of the files picked up for conversion.
pub const INPUT_EXTENSION: &str = "h5";

/// Suffix replacing [`INPUT_EXTENSION`] on converted artifacts.
pub const OUTPUT_SUFFIX: &str = "zarr.zip";

const TEMP_PREFIX: &str = ".h5zarr";

/// Where the artifact for `input` goes.
///
/// With an output directory only the file name of `input` is kept, so inputs
/// from different subdirectories that share a name map to the same path.
/// Without one the artifact sits next to its input.
pub fn output_path_for(input: &Utf8Path, output_dir: Option<&Utf8Path>) -> Utf8PathBuf {
    let stem = input
        .file_stem()
        .or_else(|| input.file_name())
        .unwrap_or_default();
    let file_name = format!("{stem}.{OUTPUT_SUFFIX}");
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), ConvertError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| ConvertError::Filesystem(format!("create {path}: {err}")))
}

fn parent_dir(dest: &Utf8Path) -> Result<&Utf8Path, ConvertError> {
    match dest.parent() {
        Some(parent) if parent.as_str().is_empty() => Ok(Utf8Path::new(".")),
        Some(parent) => Ok(parent),
        None => Err(ConvertError::Filesystem(format!(
            "invalid destination path {dest}"
        ))),
    }
}

/// Scratch directory on the same filesystem as `dest`.
pub fn staging_dir_for(dest: &Utf8Path) -> Result<TempDir, ConvertError> {
    let parent = parent_dir(dest)?;
    ensure_dir(parent)?;
    Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent.as_std_path())
        .map_err(|err| ConvertError::write(dest, err))
}

/// Temporary file next to `dest`, renamed over it by [`persist_atomic`].
pub fn temp_file_for(dest: &Utf8Path) -> Result<NamedTempFile, ConvertError> {
    let parent = parent_dir(dest)?;
    ensure_dir(parent)?;
    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| ConvertError::write(dest, err))
}

/// Replaces `dest` with `temp` in a single rename.
pub fn persist_atomic(temp: NamedTempFile, dest: &Utf8Path) -> Result<(), ConvertError> {
    temp.persist(dest.as_std_path())
        .map_err(|err| ConvertError::write(dest, err.error))?;
    Ok(())
}

/// Every path below `root`, directories included, in no particular order.
///
/// Symbolic links are listed but never descended into.
pub fn walk_dir(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}
