use std::fs;
use std::io::{self, Seek, Write};
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ConvertError;
use crate::store::{INPUT_EXTENSION, walk_dir};

/// All `*.h5` files below `root`, sorted.
pub fn discover_inputs(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ConvertError> {
    let entries = walk_dir(root.as_std_path())
        .map_err(|err| ConvertError::Filesystem(format!("scan {root}: {err}")))?;
    let mut inputs = Vec::new();
    for path in entries {
        let is_input = path.is_file()
            && path
                .extension()
                .map(|ext| ext == INPUT_EXTENSION)
                .unwrap_or(false);
        if !is_input {
            continue;
        }
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => inputs.push(path),
            Err(path) => warn!(path = %path.display(), "skipping non-UTF-8 path"),
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// Packs the files below `source_dir` into an uncompressed zip archive.
///
/// Entry names are relative to `source_dir` with `/` separators, so a Zarr
/// hierarchy staged on disk becomes a zip store.
pub fn zip_dir<W: Write + Seek>(source_dir: &Path, sink: W) -> Result<W, ConvertError> {
    let mut files = walk_dir(source_dir)
        .map_err(|err| ConvertError::Filesystem(err.to_string()))?
        .into_iter()
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();

    let mut writer = ZipWriter::new(sink);
    for path in files {
        let relative = path
            .strip_prefix(source_dir)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        let name = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = fs::metadata(&path)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?
            .len();
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(size >= u32::MAX as u64);

        writer
            .start_file(name, options)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        let mut file =
            fs::File::open(&path).map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        io::copy(&mut file, &mut writer).map_err(|err| ConvertError::Filesystem(err.to_string()))?;
    }
    writer
        .finish()
        .map_err(|err| ConvertError::Filesystem(err.to_string()))
}

/// Reads every entry of the archive once; fails on a truncated or corrupt file.
pub fn validate_zip(zip_path: &Path) -> Result<usize, ConvertError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        ConvertError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| ConvertError::Filesystem(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
    }
    Ok(archive.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_nested_inputs_only() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("site1/deep")).unwrap();
        fs::write(root.join("a.h5"), b"").unwrap();
        fs::write(root.join("site1/deep/b.h5"), b"").unwrap();
        fs::write(root.join("site1/notes.txt"), b"").unwrap();
        fs::write(root.join("site1/c.h5.bak"), b"").unwrap();

        let root = Utf8Path::from_path(root).unwrap();
        let found = discover_inputs(root).unwrap();
        assert_eq!(
            found,
            vec![root.join("a.h5"), root.join("site1/deep/b.h5")]
        );
    }

    #[test]
    fn zip_entries_use_forward_slashes() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("store");
        fs::create_dir_all(source.join("temp")).unwrap();
        fs::write(source.join(".zgroup"), b"{}").unwrap();
        fs::write(source.join("temp/0.0"), b"chunk").unwrap();

        let archive = temp.path().join("store.zip");
        let file = fs::File::create(&archive).unwrap();
        zip_dir(&source, file).unwrap();
        assert_eq!(validate_zip(&archive).unwrap(), 2);

        let mut zip = ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        let mut names = zip.file_names().map(str::to_string).collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec![".zgroup", "temp/0.0"]);
        let mut chunk = Vec::new();
        io::Read::read_to_end(&mut zip.by_name("temp/0.0").unwrap(), &mut chunk).unwrap();
        assert_eq!(chunk, b"chunk");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("site1")).unwrap();
        fs::write(root.join("site1/run.h5"), b"").unwrap();
        std::os::unix::fs::symlink(root, root.join("site1/loop")).unwrap();

        let root = Utf8Path::from_path(root).unwrap();
        let found = discover_inputs(root).unwrap();
        assert_eq!(found, vec![root.join("site1/run.h5")]);
    }

    #[test]
    fn validate_rejects_truncated_archive() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.zip");
        fs::write(&path, b"PK\x03\x04truncated").unwrap();
        assert!(validate_zip(&path).is_err());
    }
}
