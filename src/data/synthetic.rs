//! Synthetic "sum of features" classification data
//!
//! Every record holds `features` integers drawn uniformly from
//! `0..=max_value`; its label is their sum.

use super::{Dataset, Sample};
use crate::Result;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape and seed of a generated dataset
#[derive(Clone, Debug, PartialEq)]
pub struct SumFeaturesConfig {
    pub records: usize,
    pub features: usize,
    pub max_value: u32,
    /// Fraction of records assigned to the training split
    pub train_fraction: f32,
    pub seed: u64,
}

impl Default for SumFeaturesConfig {
    fn default() -> Self {
        Self {
            records: 1000,
            features: 10,
            max_value: 3,
            train_fraction: 0.7,
            seed: 0,
        }
    }
}

impl SumFeaturesConfig {
    pub fn with_records(mut self, records: usize) -> Self {
        self.records = records;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Every possible sum is a class: `0..=features * max_value`
    pub fn num_classes(&self) -> usize {
        self.features * self.max_value as usize + 1
    }

    /// Number of records in the training split
    pub fn train_len(&self) -> usize {
        ((self.records as f32 * self.train_fraction).round() as usize).min(self.records)
    }

    /// Generate the records and split them into (train, test)
    pub fn generate_split(&self) -> Result<(Dataset, Dataset)> {
        sum_of_features(self)?.split_at(self.train_len())
    }
}

/// Generate `config.records` labelled records
pub fn sum_of_features(config: &SumFeaturesConfig) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let samples = (0..config.records)
        .map(|_| {
            let values: Vec<u32> = (0..config.features)
                .map(|_| rng.random_range(0..=config.max_value))
                .collect();
            let label = values.iter().sum::<u32>() as usize;
            let features = values.into_iter().map(|v| v as f32).collect::<Vec<_>>();
            Sample::new(Array1::from(features), label)
        })
        .collect();

    Dataset::new(samples, config.num_classes())
}
