use std::collections::HashSet;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::store::output_path_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ElementKind {
    /// Width of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementKind::Int8 | ElementKind::UInt8 => 1,
            ElementKind::Int16 | ElementKind::UInt16 => 2,
            ElementKind::Int32 | ElementKind::UInt32 | ElementKind::Float32 => 4,
            ElementKind::Int64 | ElementKind::UInt64 | ElementKind::Float64 => 8,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Int8 => write!(f, "int8"),
            ElementKind::Int16 => write!(f, "int16"),
            ElementKind::Int32 => write!(f, "int32"),
            ElementKind::Int64 => write!(f, "int64"),
            ElementKind::UInt8 => write!(f, "uint8"),
            ElementKind::UInt16 => write!(f, "uint16"),
            ElementKind::UInt32 => write!(f, "uint32"),
            ElementKind::UInt64 => write!(f, "uint64"),
            ElementKind::Float32 => write!(f, "float32"),
            ElementKind::Float64 => write!(f, "float64"),
        }
    }
}

/// Attribute name to JSON value, as stored in Zarr metadata.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Element data of one variable, flattened in C order.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl VariableData {
    pub fn kind(&self) -> ElementKind {
        match self {
            VariableData::Int8(_) => ElementKind::Int8,
            VariableData::Int16(_) => ElementKind::Int16,
            VariableData::Int32(_) => ElementKind::Int32,
            VariableData::Int64(_) => ElementKind::Int64,
            VariableData::UInt8(_) => ElementKind::UInt8,
            VariableData::UInt16(_) => ElementKind::UInt16,
            VariableData::UInt32(_) => ElementKind::UInt32,
            VariableData::UInt64(_) => ElementKind::UInt64,
            VariableData::Float32(_) => ElementKind::Float32,
            VariableData::Float64(_) => ElementKind::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VariableData::Int8(values) => values.len(),
            VariableData::Int16(values) => values.len(),
            VariableData::Int32(values) => values.len(),
            VariableData::Int64(values) => values.len(),
            VariableData::UInt8(values) => values.len(),
            VariableData::UInt16(values) => values.len(),
            VariableData::UInt32(values) => values.len(),
            VariableData::UInt64(values) => values.len(),
            VariableData::Float32(values) => values.len(),
            VariableData::Float64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    dims: Vec<String>,
    shape: Vec<u64>,
    data: VariableData,
    attributes: Attributes,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        dims: Vec<String>,
        shape: Vec<u64>,
        data: VariableData,
    ) -> Result<Self, ConvertError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConvertError::InvalidVariable(
                "variable name is empty".to_string(),
            ));
        }
        if dims.len() != shape.len() {
            return Err(ConvertError::InvalidVariable(format!(
                "{name}: {} dimension names for rank {}",
                dims.len(),
                shape.len()
            )));
        }
        let expected: u64 = shape.iter().product();
        if expected != data.len() as u64 {
            return Err(ConvertError::InvalidVariable(format!(
                "{name}: shape {shape:?} holds {expected} elements, data has {}",
                data.len()
            )));
        }
        Ok(Self {
            name,
            dims,
            shape,
            data,
            attributes: Attributes::new(),
        })
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data(&self) -> &VariableData {
        &self.data
    }

    pub fn leading_dim(&self) -> Option<&str> {
        self.dims.first().map(String::as_str)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// All variables of one input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDataset {
    variables: Vec<Variable>,
    attributes: Attributes,
}

impl SourceDataset {
    pub fn new(variables: Vec<Variable>) -> Result<Self, ConvertError> {
        let mut seen = HashSet::new();
        for variable in &variables {
            if !seen.insert(variable.name()) {
                return Err(ConvertError::InvalidVariable(format!(
                    "duplicate variable name {}",
                    variable.name()
                )));
            }
        }
        Ok(Self {
            variables,
            attributes: Attributes::new(),
        })
    }

    /// Sets the file-level attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|var| var.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub overwrite: bool,
}

impl ConversionTask {
    pub fn new(input: Utf8PathBuf, output_dir: Option<&Utf8Path>, overwrite: bool) -> Self {
        let output = output_path_for(&input, output_dir);
        Self {
            input,
            output,
            overwrite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConversionOutcome {
    Success {
        input: Utf8PathBuf,
        output: Utf8PathBuf,
    },
    Skipped {
        input: Utf8PathBuf,
        output: Utf8PathBuf,
    },
    Failed {
        input: Utf8PathBuf,
        message: String,
    },
}

impl ConversionOutcome {
    pub fn input(&self) -> &Utf8Path {
        match self {
            ConversionOutcome::Success { input, .. }
            | ConversionOutcome::Skipped { input, .. }
            | ConversionOutcome::Failed { input, .. } => input,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConversionOutcome::Failed { .. })
    }
}
