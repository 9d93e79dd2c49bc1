//! Batch conversion of HDF5 time series into zipped Zarr stores.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod output;
pub mod plan;
pub mod source;
pub mod store;
pub mod worker;
pub mod zarr;
