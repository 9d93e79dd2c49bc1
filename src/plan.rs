//! Chunking and compression plan for one dataset.
//!
//! The time axis of a file is found through a marker variable: the first
//! alias in [`TEMPORAL_ALIASES`] present in the dataset names it, and its
//! leading dimension is the time dimension. Variables indexed by that
//! dimension are split into chunks of at most [`TIME_CHUNK_LEN`] steps,
//! everything else is stored as a single chunk. Every variable gets the same
//! compressor.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::SourceDataset;
use crate::error::ConvertError;

/// Marker variable names, in lookup priority order.
pub const TEMPORAL_ALIASES: [&str; 2] = ["UTCTime", "UTC_TIME"];

/// Maximum chunk length along the time dimension.
pub const TIME_CHUNK_LEN: u64 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Bit shuffle for single-byte elements, byte shuffle otherwise.
    Auto,
}

impl ShuffleMode {
    /// Blosc shuffle name for elements of `typesize` bytes.
    pub fn resolve(self, typesize: usize) -> &'static str {
        match self {
            ShuffleMode::Auto if typesize == 1 => "bitshuffle",
            ShuffleMode::Auto => "shuffle",
        }
    }

    /// Numcodecs shuffle code (1 byte shuffle, 2 bit shuffle) for elements of
    /// `typesize` bytes.
    pub fn numcodecs_code(self, typesize: usize) -> u8 {
        match self.resolve(typesize) {
            "bitshuffle" => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressorSpec {
    pub cname: &'static str,
    pub clevel: u8,
    pub shuffle: ShuffleMode,
}

impl CompressorSpec {
    /// Blosc/zstd at the highest level with automatic shuffle.
    pub const fn standard() -> Self {
        Self {
            cname: "zstd",
            clevel: 9,
            shuffle: ShuffleMode::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingSpec {
    pub compressor: CompressorSpec,
    /// `None` stores the variable as one chunk spanning its full shape.
    pub chunk_shape: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingPlan {
    temporal_dim: String,
    specs: BTreeMap<String, EncodingSpec>,
}

impl EncodingPlan {
    pub fn temporal_dim(&self) -> &str {
        &self.temporal_dim
    }

    pub fn get(&self, variable: &str) -> Option<&EncodingSpec> {
        self.specs.get(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EncodingSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Name of the marker variable that identifies the time axis, if any.
pub fn find_temporal_marker(dataset: &SourceDataset) -> Option<&'static str> {
    TEMPORAL_ALIASES
        .into_iter()
        .find(|alias| dataset.contains(alias))
}

pub fn plan_encoding(dataset: &SourceDataset) -> Result<EncodingPlan, ConvertError> {
    let marker = find_temporal_marker(dataset).ok_or_else(|| {
        ConvertError::TemporalDimensionNotFound {
            tried: TEMPORAL_ALIASES.iter().map(|alias| alias.to_string()).collect(),
        }
    })?;
    let temporal_dim = dataset
        .variable(marker)
        .and_then(|var| var.leading_dim())
        .ok_or_else(|| ConvertError::TemporalMarkerScalar(marker.to_string()))?
        .to_string();

    let compressor = CompressorSpec::standard();
    let specs = dataset
        .variables()
        .iter()
        .map(|var| {
            let chunk_shape = (var.leading_dim() == Some(temporal_dim.as_str())).then(|| {
                let mut chunks = var.shape().to_vec();
                chunks[0] = chunks[0].min(TIME_CHUNK_LEN);
                chunks
            });
            (
                var.name().to_string(),
                EncodingSpec {
                    compressor,
                    chunk_shape,
                },
            )
        })
        .collect();

    Ok(EncodingPlan {
        temporal_dim,
        specs,
    })
}
