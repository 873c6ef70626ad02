//! Datasets, samples and mini-batch partitioning
//!
//! A [`Dataset`] is an ordered list of labelled feature vectors. Training
//! walks it in order through [`Dataset::minibatches`]; there is no shuffling,
//! so the batch sequence for a given dataset and batch size never changes.

pub mod mnist;
pub mod synthetic;

use crate::{Error, Result};
use ndarray::Array1;
use std::ops::Range;

pub use mnist::{load_mnist, MnistData, MnistOptions};
pub use synthetic::{sum_of_features, SumFeaturesConfig};

/// One labelled example
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub features: Array1<f32>,
    pub label: usize,
}

impl Sample {
    pub fn new(features: Array1<f32>, label: usize) -> Self {
        Self { features, label }
    }
}

/// Ordered collection of samples sharing one feature length
#[derive(Clone, Debug)]
pub struct Dataset {
    samples: Vec<Sample>,
    num_classes: usize,
}

impl Dataset {
    /// Build a dataset, checking feature lengths and label range
    pub fn new(samples: Vec<Sample>, num_classes: usize) -> Result<Self> {
        if let Some(first) = samples.first() {
            let expected = first.features.len();
            if let Some(bad) = samples.iter().find(|s| s.features.len() != expected) {
                return Err(Error::ShapeMismatch {
                    expected: vec![expected],
                    got: vec![bad.features.len()],
                });
            }
        }
        if let Some(bad) = samples.iter().find(|s| s.label >= num_classes) {
            return Err(Error::Config(format!(
                "label {} outside {num_classes} classes",
                bad.label
            )));
        }

        Ok(Self {
            samples,
            num_classes,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Feature length, `None` for an empty dataset
    pub fn feature_len(&self) -> Option<usize> {
        self.samples.first().map(|s| s.features.len())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Copy of `count` consecutive samples starting at `offset`
    pub fn slice(&self, offset: usize, count: usize) -> Result<Dataset> {
        let end = offset
            .checked_add(count)
            .filter(|&end| end <= self.samples.len())
            .ok_or(Error::SliceOutOfRange {
                offset,
                count,
                available: self.samples.len(),
            })?;

        Ok(Dataset {
            samples: self.samples[offset..end].to_vec(),
            num_classes: self.num_classes,
        })
    }

    /// Split into the first `at` samples and the rest
    pub fn split_at(self, at: usize) -> Result<(Dataset, Dataset)> {
        if at > self.samples.len() {
            return Err(Error::SliceOutOfRange {
                offset: 0,
                count: at,
                available: self.samples.len(),
            });
        }

        let mut head = self.samples;
        let tail = head.split_off(at);
        Ok((
            Dataset {
                samples: head,
                num_classes: self.num_classes,
            },
            Dataset {
                samples: tail,
                num_classes: self.num_classes,
            },
        ))
    }

    /// Consecutive batches of `size` samples in dataset order
    ///
    /// The final batch holds the remainder and may be smaller. A `size` of
    /// zero yields no batches.
    pub fn minibatches(&self, size: usize) -> impl Iterator<Item = Batch<'_>> + '_ {
        batch_bounds(self.samples.len(), size)
            .into_iter()
            .enumerate()
            .map(move |(index, range)| Batch {
                index,
                offset: range.start,
                samples: &self.samples[range],
            })
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Contiguous view of the training set handed to one update step
#[derive(Clone, Copy, Debug)]
pub struct Batch<'a> {
    /// Zero-based position of the batch within its epoch
    pub index: usize,
    /// Index of the first sample in the dataset
    pub offset: usize,
    pub samples: &'a [Sample],
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Index ranges of consecutive batches covering `0..len`
pub fn batch_bounds(len: usize, size: usize) -> Vec<Range<usize>> {
    if size == 0 {
        return Vec::new();
    }
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}
