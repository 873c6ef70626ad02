//! Parameter storage shared by the layers of one network

use crate::io::{SavedModel, SavedParameter};
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Position of a parameter inside its [`ParamStore`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamId(usize);

impl ParamId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Named, trainable tensors in registration order
///
/// Optimizers keep per-parameter state by position, so the order never
/// changes after construction.
pub struct ParamStore {
    tensors: Vec<Tensor>,
    names: Vec<String>,
    shapes: Vec<Vec<usize>>,
    rng: StdRng,
}

impl ParamStore {
    /// Empty store whose initializers draw from a generator seeded with `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            tensors: Vec::new(),
            names: Vec::new(),
            shapes: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn register(&mut self, name: String, shape: Vec<usize>, values: Array1<f32>) -> ParamId {
        self.tensors.push(Tensor::new(values, true));
        self.names.push(name);
        self.shapes.push(shape);
        ParamId(self.tensors.len() - 1)
    }

    /// Xavier/Glorot uniform: `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`
    pub fn xavier(
        &mut self,
        name: impl Into<String>,
        shape: Vec<usize>,
        fan_in: usize,
        fan_out: usize,
    ) -> ParamId {
        let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
        let len = shape.iter().product::<usize>();
        let values = Array1::from_shape_fn(len, |_| self.rng.random_range(-limit..=limit));
        self.register(name.into(), shape, values)
    }

    pub fn zeros(&mut self, name: impl Into<String>, shape: Vec<usize>) -> ParamId {
        let len = shape.iter().product::<usize>();
        self.register(name.into(), shape, Array1::zeros(len))
    }

    pub fn get(&self, id: ParamId) -> &Tensor {
        &self.tensors[id.0]
    }

    pub fn get_mut(&mut self, id: ParamId) -> &mut Tensor {
        &mut self.tensors[id.0]
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn tensors_mut(&mut self) -> &mut [Tensor] {
        &mut self.tensors
    }

    /// Constant copies for inference; gradients of the live tensors stay untouched
    pub fn detached(&self) -> Vec<Tensor> {
        self.tensors.iter().map(Tensor::detach).collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalar parameters
    pub fn num_values(&self) -> usize {
        self.tensors.iter().map(Tensor::len).sum()
    }

    pub fn zero_grad(&self) {
        self.tensors.iter().for_each(Tensor::zero_grad);
    }

    /// Average accumulated gradients over `count` samples
    pub fn average_grads(&self, count: usize) {
        let factor = 1.0 / count.max(1) as f32;
        self.tensors.iter().for_each(|t| t.scale_grad(factor));
    }

    pub fn to_saved(&self) -> Vec<SavedParameter> {
        self.names
            .iter()
            .zip(&self.shapes)
            .zip(&self.tensors)
            .map(|((name, shape), tensor)| SavedParameter {
                name: name.clone(),
                shape: shape.clone(),
                values: tensor.data().to_vec(),
            })
            .collect()
    }

    /// Overwrite every parameter with the same-named values from `saved`
    ///
    /// Nothing is written unless every parameter is present with a matching
    /// shape.
    pub fn load_saved(&mut self, saved: &SavedModel) -> Result<()> {
        let mut updates = Vec::with_capacity(self.tensors.len());
        for (name, shape) in self.names.iter().zip(&self.shapes) {
            let param = saved.get_parameter(name).ok_or_else(|| {
                Error::Serialization(format!("saved model has no parameter {name}"))
            })?;
            if &param.shape != shape || param.values.len() != shape.iter().product::<usize>() {
                return Err(Error::ShapeMismatch {
                    expected: shape.clone(),
                    got: param.shape.clone(),
                });
            }
            updates.push(Array1::from(param.values.clone()));
        }

        for (tensor, values) in self.tensors.iter_mut().zip(updates) {
            *tensor.data_mut() = values;
            tensor.zero_grad();
        }
        Ok(())
    }
}

impl std::fmt::Debug for ParamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamStore")
            .field("names", &self.names)
            .field("num_values", &self.num_values())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ModelMetadata;

    #[test]
    fn test_xavier_stays_within_limit() {
        let mut store = ParamStore::new(7);
        let id = store.xavier("fc.weight", vec![10, 120], 120, 10);

        let limit = (6.0f32 / 130.0).sqrt();
        let tensor = store.get(id);
        assert_eq!(tensor.len(), 1200);
        assert!(tensor.data().iter().all(|v| v.abs() <= limit));
        assert!(tensor.data().iter().any(|&v| v != 0.0));
        assert!(tensor.requires_grad());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let build = || {
            let mut store = ParamStore::new(3);
            store.xavier("w", vec![4, 4], 4, 4);
            store.tensors()[0].data().clone()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_average_grads() {
        let mut store = ParamStore::new(0);
        let id = store.zeros("b", vec![2]);
        store.get(id).accumulate_grad(ndarray::arr1(&[4.0, -2.0]));

        store.average_grads(4);
        assert_eq!(store.get(id).grad().unwrap().to_vec(), vec![1.0, -0.5]);

        store.zero_grad();
        assert!(store.get(id).grad().is_none());
    }

    #[test]
    fn test_saved_round_trip() {
        let mut source = ParamStore::new(1);
        source.xavier("w", vec![2, 3], 3, 2);
        source.zeros("b", vec![2]);

        let saved = SavedModel::new(ModelMetadata::new("t", "dense"), source.to_saved());

        let mut target = ParamStore::new(99);
        target.xavier("w", vec![2, 3], 3, 2);
        target.zeros("b", vec![2]);
        target.load_saved(&saved).unwrap();

        assert_eq!(source.tensors()[0].data(), target.tensors()[0].data());
    }

    #[test]
    fn test_load_saved_rejects_shape_change() {
        let mut source = ParamStore::new(1);
        source.zeros("w", vec![3]);
        let saved = SavedModel::new(ModelMetadata::new("t", "dense"), source.to_saved());

        let mut target = ParamStore::new(1);
        target.xavier("w", vec![4], 4, 1);
        let before = target.tensors()[0].data().clone();

        assert!(matches!(
            target.load_saved(&saved),
            Err(Error::ShapeMismatch { .. })
        ));
        assert_eq!(target.tensors()[0].data(), &before);
    }
}
