use assert_matches::assert_matches;

use h5zarr::domain::{SourceDataset, Variable, VariableData};
use h5zarr::error::ConvertError;
use h5zarr::plan::{CompressorSpec, TIME_CHUNK_LEN, find_temporal_marker, plan_encoding};

fn var(name: &str, dims: &[&str], shape: &[u64]) -> Variable {
    let len = shape.iter().product::<u64>() as usize;
    Variable::new(
        name,
        dims.iter().map(|dim| dim.to_string()).collect(),
        shape.to_vec(),
        VariableData::Float32(vec![0.0; len]),
    )
    .unwrap()
}

#[test]
fn long_series_is_chunked_along_time() {
    let dataset = SourceDataset::new(vec![
        var("UTCTime", &["phony_dim_0"], &[500]),
        var("temp", &["phony_dim_0", "phony_dim_1"], &[500, 10]),
    ])
    .unwrap();

    let plan = plan_encoding(&dataset).unwrap();
    assert_eq!(plan.temporal_dim(), "phony_dim_0");
    assert_eq!(plan.get("temp").unwrap().chunk_shape, Some(vec![128, 10]));
    assert_eq!(plan.get("UTCTime").unwrap().chunk_shape, Some(vec![128]));
}

#[test]
fn short_series_is_one_chunk_along_time() {
    let dataset = SourceDataset::new(vec![
        var("UTC_TIME", &["t"], &[100]),
        var("flux", &["t", "band"], &[100, 4]),
    ])
    .unwrap();

    let plan = plan_encoding(&dataset).unwrap();
    assert_eq!(plan.get("flux").unwrap().chunk_shape, Some(vec![100, 4]));
    assert!(TIME_CHUNK_LEN > 100);
}

#[test]
fn non_temporal_variables_stay_whole_but_compressed() {
    let dataset = SourceDataset::new(vec![
        var("UTC_TIME", &["phony_dim_0"], &[200]),
        var("meta", &["phony_dim_1"], &[3]),
    ])
    .unwrap();

    let plan = plan_encoding(&dataset).unwrap();
    assert_eq!(plan.temporal_dim(), "phony_dim_0");
    let meta = plan.get("meta").unwrap();
    assert_eq!(meta.chunk_shape, None);
    assert_eq!(meta.compressor, CompressorSpec::standard());
    assert_eq!(plan.len(), 2);
}

#[test]
fn temporal_dim_only_matches_leading_axis() {
    let dataset = SourceDataset::new(vec![
        var("UTCTime", &["t"], &[300]),
        var("profile", &["level", "t"], &[5, 300]),
    ])
    .unwrap();

    let plan = plan_encoding(&dataset).unwrap();
    assert_eq!(plan.get("profile").unwrap().chunk_shape, None);
}

#[test]
fn missing_marker_names_every_alias() {
    let dataset = SourceDataset::new(vec![var("time", &["t"], &[10])]).unwrap();

    assert_eq!(find_temporal_marker(&dataset), None);
    let err = plan_encoding(&dataset).unwrap_err();
    assert_matches!(&err, ConvertError::TemporalDimensionNotFound { tried } if tried.len() == 2);
    assert_eq!(
        err.to_string(),
        "time dimension not found (tried UTCTime and UTC_TIME)"
    );
}

#[test]
fn every_variable_shares_the_compressor() {
    let dataset = SourceDataset::new(vec![
        var("UTCTime", &["t"], &[10]),
        var("a", &["t"], &[10]),
        var("b", &["x"], &[2]),
    ])
    .unwrap();

    let plan = plan_encoding(&dataset).unwrap();
    assert!(
        plan.iter()
            .all(|(_, spec)| spec.compressor == CompressorSpec::standard())
    );
}
