//! Zarr (format 2) output packed into a zip archive.
//!
//! Each variable becomes an array at `/<name>` with a `.zarray` carrying the
//! planned chunks and a numcodecs Blosc compressor, and a `.zattrs` carrying
//! the source attributes plus `_ARRAY_DIMENSIONS`. File-level attributes go to
//! the root group. A consolidated `.zmetadata` is written last so readers can
//! open the store with a single lookup.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use camino::Utf8Path;
use serde_json::{Value, json};
use tracing::debug;
use zarrs::array::Array;
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;
use zarrs::metadata::v2::{ArrayMetadataV2, GroupMetadataV2};
use zarrs::metadata::{ArrayMetadata, GroupMetadata};

use crate::domain::{Attributes, ElementKind, SourceDataset, Variable, VariableData};
use crate::error::ConvertError;
use crate::fs_util::{validate_zip, zip_dir};
use crate::plan::{EncodingPlan, EncodingSpec};
use crate::store::{persist_atomic, staging_dir_for, temp_file_for, walk_dir};

/// Attribute listing the dimension names of an array, as read by xarray.
pub const DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

/// Name of the consolidated metadata document at the store root.
pub const CONSOLIDATED_METADATA: &str = ".zmetadata";

const METADATA_FILES: [&str; 3] = [".zgroup", ".zattrs", ".zarray"];

pub trait DatasetWriter: Send + Sync {
    /// Writes `dataset` to `dest` as laid out by `plan`, replacing any
    /// previous artifact. Nothing is left at `dest` if writing fails.
    fn write(
        &self,
        dataset: &SourceDataset,
        plan: &EncodingPlan,
        dest: &Utf8Path,
    ) -> Result<(), ConvertError>;
}

/// Writes a Zarr hierarchy packed into a single zip archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZarrZipWriter;

impl ZarrZipWriter {
    pub fn new() -> Self {
        Self
    }
}

impl DatasetWriter for ZarrZipWriter {
    fn write(
        &self,
        dataset: &SourceDataset,
        plan: &EncodingPlan,
        dest: &Utf8Path,
    ) -> Result<(), ConvertError> {
        let staging = staging_dir_for(dest)?;
        write_hierarchy(dataset, plan, staging.path(), dest)?;
        consolidate_metadata(staging.path()).map_err(|err| ConvertError::write(dest, err))?;

        let temp = temp_file_for(dest)?;
        let temp = zip_dir(staging.path(), temp)?;
        temp.as_file()
            .sync_all()
            .map_err(|err| ConvertError::write(dest, err))?;
        let entries = validate_zip(temp.path()).map_err(|err| ConvertError::write(dest, err))?;
        persist_atomic(temp, dest)?;

        debug!(output = %dest, entries, "artifact written");
        Ok(())
    }
}

fn write_hierarchy(
    dataset: &SourceDataset,
    plan: &EncodingPlan,
    root: &Path,
    dest: &Utf8Path,
) -> Result<(), ConvertError> {
    let store = Arc::new(FilesystemStore::new(root).map_err(|err| ConvertError::write(dest, err))?);

    let mut group = Group::new_with_metadata(
        store.clone(),
        "/",
        GroupMetadata::V2(GroupMetadataV2::new()),
    )
    .map_err(|err| ConvertError::write(dest, err))?;
    group
        .attributes_mut()
        .extend(dataset.attributes().clone());
    group
        .store_metadata()
        .map_err(|err| ConvertError::write(dest, err))?;

    for variable in dataset.variables() {
        let spec = plan.get(variable.name()).ok_or_else(|| {
            ConvertError::write(dest, format!("no encoding for {}", variable.name()))
        })?;
        let failed = |err: String| ConvertError::write(dest, format!("{}: {err}", variable.name()));

        let metadata = array_metadata(variable, spec).map_err(failed)?;
        let mut array = Array::new_with_metadata(
            store.clone(),
            &format!("/{}", variable.name()),
            ArrayMetadata::V2(metadata),
        )
        .map_err(|err| failed(err.to_string()))?;
        *array.attributes_mut() = array_attributes(variable);
        array
            .store_metadata()
            .map_err(|err| failed(err.to_string()))?;

        if variable.data().is_empty() {
            continue;
        }
        let subset = array.subset_all();
        let stored = match variable.data() {
            VariableData::Int8(values) => array.store_array_subset(&subset, values),
            VariableData::Int16(values) => array.store_array_subset(&subset, values),
            VariableData::Int32(values) => array.store_array_subset(&subset, values),
            VariableData::Int64(values) => array.store_array_subset(&subset, values),
            VariableData::UInt8(values) => array.store_array_subset(&subset, values),
            VariableData::UInt16(values) => array.store_array_subset(&subset, values),
            VariableData::UInt32(values) => array.store_array_subset(&subset, values),
            VariableData::UInt64(values) => array.store_array_subset(&subset, values),
            VariableData::Float32(values) => array.store_array_subset(&subset, values),
            VariableData::Float64(values) => array.store_array_subset(&subset, values),
        };
        stored.map_err(|err| failed(err.to_string()))?;
        log_variable(variable, spec.chunk_shape.as_deref());
    }
    Ok(())
}

/// `.zarray` document for `variable` encoded as `spec`.
fn array_metadata(variable: &Variable, spec: &EncodingSpec) -> Result<ArrayMetadataV2, String> {
    let shape = variable.shape();
    // Zarr chunks must be non-empty, even along zero-length axes.
    let chunks: Vec<u64> = spec
        .chunk_shape
        .as_deref()
        .unwrap_or(shape)
        .iter()
        .map(|len| (*len).max(1))
        .collect();
    let kind = variable.data().kind();
    let compressor = &spec.compressor;

    serde_json::from_value(json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": chunks,
        "dtype": v2_dtype(kind),
        "compressor": {
            "id": "blosc",
            "cname": compressor.cname,
            "clevel": compressor.clevel,
            "shuffle": compressor.shuffle.numcodecs_code(kind.size()),
            "blocksize": 0,
        },
        "fill_value": fill_value(kind),
        "order": "C",
        "filters": null,
        "dimension_separator": ".",
    }))
    .map_err(|err| err.to_string())
}

fn array_attributes(variable: &Variable) -> Attributes {
    let mut attributes = variable.attributes().clone();
    attributes.insert(DIMENSIONS_ATTRIBUTE.to_string(), json!(variable.dims()));
    attributes
}

fn v2_dtype(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Int8 => "|i1",
        ElementKind::Int16 => "<i2",
        ElementKind::Int32 => "<i4",
        ElementKind::Int64 => "<i8",
        ElementKind::UInt8 => "|u1",
        ElementKind::UInt16 => "<u2",
        ElementKind::UInt32 => "<u4",
        ElementKind::UInt64 => "<u8",
        ElementKind::Float32 => "<f4",
        ElementKind::Float64 => "<f8",
    }
}

/// NaN for floats, zero for integers.
fn fill_value(kind: ElementKind) -> Value {
    match kind {
        ElementKind::Float32 | ElementKind::Float64 => json!("NaN"),
        _ => json!(0),
    }
}

/// Collects every metadata document below `root` into `.zmetadata`.
pub fn consolidate_metadata(root: &Path) -> Result<(), String> {
    let mut files = walk_dir(root)
        .map_err(|err| err.to_string())?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| METADATA_FILES.contains(&name))
        })
        .collect::<Vec<_>>();
    files.sort();

    let mut metadata = serde_json::Map::new();
    for path in files {
        let key = path
            .strip_prefix(root)
            .map_err(|err| err.to_string())?
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = fs::read(&path).map_err(|err| format!("read {key}: {err}"))?;
        let document: Value =
            serde_json::from_slice(&bytes).map_err(|err| format!("parse {key}: {err}"))?;
        metadata.insert(key, document);
    }

    let consolidated = json!({
        "metadata": metadata,
        "zarr_consolidated_format": 1,
    });
    let bytes = serde_json::to_vec_pretty(&consolidated).map_err(|err| err.to_string())?;
    fs::write(root.join(CONSOLIDATED_METADATA), bytes).map_err(|err| err.to_string())
}

fn log_variable(variable: &Variable, chunk_shape: Option<&[u64]>) {
    debug!(
        variable = variable.name(),
        shape = ?variable.shape(),
        chunks = ?chunk_shape,
        "stored variable"
    );
}
