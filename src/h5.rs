use camino::Utf8Path;
use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, H5Type, Location};
use serde_json::Value;
use tracing::debug;

use crate::domain::{Attributes, SourceDataset, Variable, VariableData};
use crate::error::ConvertError;
use crate::source::{DatasetReader, phony_dimension_names};

/// Attributes maintained by the HDF5 dimension-scale and netCDF-4 layers.
/// They describe file structure rather than data and are not copied.
const STRUCTURAL_ATTRIBUTES: [&str; 9] = [
    "CLASS",
    "NAME",
    "DIMENSION_LIST",
    "REFERENCE_LIST",
    "_Netcdf4Dimid",
    "_Netcdf4Coordinates",
    "_NCProperties",
    "_nc3_strict",
    "_FillValue",
];

/// Reads the root-group datasets of an HDF5 file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Reader;

impl Hdf5Reader {
    pub fn new() -> Self {
        Self
    }
}

impl DatasetReader for Hdf5Reader {
    fn read(&self, path: &Utf8Path) -> Result<SourceDataset, ConvertError> {
        let file =
            hdf5::File::open(path.as_std_path()).map_err(|err| ConvertError::read(path, err))?;
        let datasets = file.datasets().map_err(|err| ConvertError::read(path, err))?;

        let mut loaded = Vec::with_capacity(datasets.len());
        for dataset in &datasets {
            let full_name = dataset.name();
            let name = full_name.rsplit('/').next().unwrap_or(&full_name).to_string();
            let shape: Vec<u64> = dataset.shape().iter().map(|&len| len as u64).collect();
            let data = read_data(dataset, &name).map_err(|err| match err {
                ConvertError::UnsupportedDataType { .. } => err,
                other => ConvertError::read(path, other),
            })?;
            let attributes = read_attributes(dataset, &name);
            debug!(file = %path, variable = %name, ?shape, kind = %data.kind(), "loaded variable");
            loaded.push((name, shape, data, attributes));
        }

        let shapes: Vec<Vec<u64>> = loaded.iter().map(|(_, shape, _, _)| shape.clone()).collect();
        let variables = loaded
            .into_iter()
            .zip(phony_dimension_names(&shapes))
            .map(|((name, shape, data, attributes), dims)| {
                Variable::new(name, dims, shape, data).map(|var| var.with_attributes(attributes))
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        Ok(SourceDataset::new(variables)?.with_attributes(read_attributes(&file, "/")))
    }
}

fn read_data(dataset: &hdf5::Dataset, name: &str) -> Result<VariableData, ConvertError> {
    let descriptor = dataset
        .dtype()
        .and_then(|dtype| dtype.to_descriptor())
        .map_err(|err| ConvertError::InvalidVariable(format!("{name}: {err}")))?;

    let data = match descriptor {
        TypeDescriptor::Integer(IntSize::U1) => VariableData::Int8(read_raw(dataset, name)?),
        TypeDescriptor::Integer(IntSize::U2) => VariableData::Int16(read_raw(dataset, name)?),
        TypeDescriptor::Integer(IntSize::U4) => VariableData::Int32(read_raw(dataset, name)?),
        TypeDescriptor::Integer(IntSize::U8) => VariableData::Int64(read_raw(dataset, name)?),
        TypeDescriptor::Unsigned(IntSize::U1) => VariableData::UInt8(read_raw(dataset, name)?),
        TypeDescriptor::Unsigned(IntSize::U2) => VariableData::UInt16(read_raw(dataset, name)?),
        TypeDescriptor::Unsigned(IntSize::U4) => VariableData::UInt32(read_raw(dataset, name)?),
        TypeDescriptor::Unsigned(IntSize::U8) => VariableData::UInt64(read_raw(dataset, name)?),
        TypeDescriptor::Float(FloatSize::U4) => VariableData::Float32(read_raw(dataset, name)?),
        TypeDescriptor::Float(FloatSize::U8) => VariableData::Float64(read_raw(dataset, name)?),
        other => {
            return Err(ConvertError::UnsupportedDataType {
                variable: name.to_string(),
                dtype: format!("{other:?}"),
            });
        }
    };
    Ok(data)
}

fn read_raw<T: H5Type>(dataset: &hdf5::Dataset, name: &str) -> Result<Vec<T>, ConvertError> {
    dataset
        .read_raw::<T>()
        .map_err(|err| ConvertError::InvalidVariable(format!("{name}: {err}")))
}

/// Numeric and string attributes of `location`. Attributes of any other type,
/// or that fail to read, are skipped with a debug log.
fn read_attributes(location: &Location, owner: &str) -> Attributes {
    let mut attributes = Attributes::new();
    let names = match location.attr_names() {
        Ok(names) => names,
        Err(err) => {
            debug!(owner, error = %err, "cannot list attributes");
            return attributes;
        }
    };
    for name in names {
        if STRUCTURAL_ATTRIBUTES.contains(&name.as_str()) {
            continue;
        }
        match location
            .attr(&name)
            .map_err(|err| err.to_string())
            .and_then(|attr| attribute_value(&attr))
        {
            Ok(value) => {
                attributes.insert(name, value);
            }
            Err(reason) => debug!(owner, attribute = %name, %reason, "skipping attribute"),
        }
    }
    attributes
}

fn attribute_value(attr: &Attribute) -> Result<Value, String> {
    let descriptor = attr
        .dtype()
        .and_then(|dtype| dtype.to_descriptor())
        .map_err(|err| err.to_string())?;
    let values: Vec<Value> = match descriptor {
        TypeDescriptor::Integer(_) => read_attr::<i64>(attr)?.into_iter().map(Value::from).collect(),
        TypeDescriptor::Unsigned(_) => read_attr::<u64>(attr)?.into_iter().map(Value::from).collect(),
        TypeDescriptor::Float(_) => read_attr::<f64>(attr)?.into_iter().map(Value::from).collect(),
        TypeDescriptor::VarLenAscii => read_attr::<VarLenAscii>(attr)?
            .iter()
            .map(|text| Value::from(text.as_str()))
            .collect(),
        TypeDescriptor::VarLenUnicode
        | TypeDescriptor::FixedAscii(_)
        | TypeDescriptor::FixedUnicode(_) => read_attr::<VarLenUnicode>(attr)?
            .iter()
            .map(|text| Value::from(text.as_str()))
            .collect(),
        other => return Err(format!("unsupported type {other:?}")),
    };

    if attr.is_scalar() {
        values
            .into_iter()
            .next()
            .ok_or_else(|| "empty scalar".to_string())
    } else {
        Ok(Value::Array(values))
    }
}

fn read_attr<T: H5Type>(attr: &Attribute) -> Result<Vec<T>, String> {
    attr.read_raw::<T>().map_err(|err| err.to_string())
}
