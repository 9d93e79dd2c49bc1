#![cfg(feature = "hdf5")]

use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use hdf5::types::VarLenUnicode;

use h5zarr::domain::VariableData;
use h5zarr::error::ConvertError;
use h5zarr::h5::Hdf5Reader;
use h5zarr::source::DatasetReader;

fn scratch_file(name: &str) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap();
    (temp, path)
}

fn text(value: &str) -> VarLenUnicode {
    value.parse().unwrap()
}

fn write_series(path: &Utf8PathBuf) {
    let file = hdf5::File::create(path.as_std_path()).unwrap();
    file.new_dataset::<f64>()
        .shape(4)
        .create("UTCTime")
        .unwrap()
        .write_raw(&[0.0, 1.0, 2.0, 3.0])
        .unwrap();
    let temp = file
        .new_dataset::<f32>()
        .shape((4, 3))
        .create("temp")
        .unwrap();
    temp.write_raw(&(0..12).map(|i| i as f32).collect::<Vec<_>>())
        .unwrap();
    temp.new_attr::<VarLenUnicode>()
        .shape(())
        .create("units")
        .unwrap()
        .write_scalar(&text("K"))
        .unwrap();
    temp.new_attr::<f32>()
        .shape(())
        .create("scale")
        .unwrap()
        .write_scalar(&0.5f32)
        .unwrap();
    file.new_dataset::<u8>()
        .shape(3)
        .create("quality")
        .unwrap()
        .write_raw(&[7u8, 8, 9])
        .unwrap();
    file.new_attr::<VarLenUnicode>()
        .shape(())
        .create("mission")
        .unwrap()
        .write_scalar(&text("demo"))
        .unwrap();
    file.new_attr::<i32>()
        .shape(2)
        .create("orbit_range")
        .unwrap()
        .write_raw(&[10, 20])
        .unwrap();

    let nested = file.create_group("calibration").unwrap();
    nested
        .new_dataset::<f64>()
        .shape(2)
        .create("gain")
        .unwrap()
        .write_raw(&[1.0, 2.0])
        .unwrap();
}

#[test]
fn reads_root_datasets_with_types_and_dims() {
    let (_temp, path) = scratch_file("run.h5");
    write_series(&path);

    let dataset = Hdf5Reader::new().read(&path).unwrap();

    let mut names: Vec<&str> = dataset.variables().iter().map(|var| var.name()).collect();
    names.sort();
    assert_eq!(names, vec!["UTCTime", "quality", "temp"]);
    assert!(!dataset.contains("gain"));

    let temp = dataset.variable("temp").unwrap();
    assert_eq!(temp.shape(), &[4, 3]);
    assert_matches!(temp.data(), VariableData::Float32(values) if values[5] == 5.0);
    assert_eq!(temp.dims().len(), 2);
    assert_ne!(temp.dims()[0], temp.dims()[1]);
    assert_eq!(
        Some(temp.dims()[0].as_str()),
        dataset.variable("UTCTime").unwrap().leading_dim()
    );
    assert_matches!(
        dataset.variable("quality").unwrap().data(),
        VariableData::UInt8(values) if values == &vec![7, 8, 9]
    );
}

#[test]
fn carries_file_and_variable_attributes() {
    let (_temp, path) = scratch_file("run.h5");
    write_series(&path);

    let dataset = Hdf5Reader::new().read(&path).unwrap();

    let temp = dataset.variable("temp").unwrap();
    assert_eq!(temp.attributes()["units"], "K");
    assert_eq!(temp.attributes()["scale"], 0.5);
    assert_eq!(dataset.attributes()["mission"], "demo");
    assert_eq!(dataset.attributes()["orbit_range"], serde_json::json!([10, 20]));
}

#[test]
fn boolean_dataset_is_unsupported() {
    let (_temp, path) = scratch_file("flags.h5");
    let file = hdf5::File::create(path.as_std_path()).unwrap();
    file.new_dataset::<bool>()
        .shape(2)
        .create("flags")
        .unwrap()
        .write_raw(&[true, false])
        .unwrap();
    drop(file);

    let err = Hdf5Reader::new().read(&path).unwrap_err();
    assert_matches!(err, ConvertError::UnsupportedDataType { variable, .. } if variable == "flags");
}

#[test]
fn non_hdf5_file_is_a_read_error() {
    let (_temp, path) = scratch_file("broken.h5");
    fs::write(&path, b"definitely not hdf5").unwrap();

    let err = Hdf5Reader::new().read(&path).unwrap_err();
    assert_matches!(err, ConvertError::Read { path: failed, .. } if failed == path);
}
