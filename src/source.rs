use std::collections::HashMap;

use camino::Utf8Path;

use crate::domain::SourceDataset;
use crate::error::ConvertError;

pub trait DatasetReader: Send + Sync {
    fn read(&self, path: &Utf8Path) -> Result<SourceDataset, ConvertError>;
}

/// Names the axes of every shape in `shapes` after their length.
///
/// The n-th axis of a given length within one variable maps to the n-th
/// phony dimension of that length in the file, so axes of equal length share
/// a name across variables but never within one. Names are `phony_dim_<n>`,
/// numbered in the order they are first needed.
pub fn phony_dimension_names(shapes: &[Vec<u64>]) -> Vec<Vec<String>> {
    let mut names: HashMap<(u64, usize), String> = HashMap::new();
    shapes
        .iter()
        .map(|shape| {
            let mut seen: HashMap<u64, usize> = HashMap::new();
            shape
                .iter()
                .map(|len| {
                    let occurrence = seen.entry(*len).or_insert(0);
                    let key = (*len, *occurrence);
                    *occurrence += 1;
                    let next = names.len();
                    names
                        .entry(key)
                        .or_insert_with(|| format!("phony_dim_{next}"))
                        .clone()
                })
                .collect()
        })
        .collect()
}
