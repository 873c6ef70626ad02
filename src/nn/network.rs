//! Sequential network with its own optimizer

use super::layers::{AvgPool2d, ConnectionTable, Conv2d, Dense, Layer, Tanh};
use super::loss::{LossFn, LossKind, MSELoss, TargetEncoding};
use super::params::ParamStore;
use crate::autograd::{backward, softmax, ConvGeometry, PoolGeometry};
use crate::data::{Batch, Dataset};
use crate::io::{save_model, ModelMetadata, SaveConfig, SavedModel};
use crate::optim::Optimizer;
use crate::train::{Evaluation, Model};
use crate::{Error, Result, Tensor};
use ndarray::Array1;
use std::path::Path;
use tracing::debug;

/// Layers, parameters, loss and optimizer of one trainable classifier
pub struct Network {
    name: String,
    input_len: usize,
    params: ParamStore,
    layers: Vec<Box<dyn Layer>>,
    loss: Box<dyn LossFn>,
    encoding: TargetEncoding,
    optimizer: Box<dyn Optimizer>,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.layers
            .last()
            .map_or(self.input_len, |layer| layer.out_len())
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn num_parameters(&self) -> usize {
        self.params.num_values()
    }

    /// Layer stack joined with ` -> `
    pub fn architecture(&self) -> String {
        self.layers
            .iter()
            .map(|layer| layer.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn check_input(&self, features: &Array1<f32>) -> Result<()> {
        if features.len() != self.input_len {
            return Err(Error::ShapeMismatch {
                expected: vec![self.input_len],
                got: vec![features.len()],
            });
        }
        Ok(())
    }

    fn forward(&self, params: &[Tensor], input: Tensor) -> Tensor {
        self.layers
            .iter()
            .fold(input, |x, layer| layer.forward(params, &x))
    }

    /// Output activations for one input, computed on detached parameters
    pub fn infer(&self, features: &Array1<f32>) -> Result<Array1<f32>> {
        self.check_input(features)?;
        let params = self.params.detached();
        let input = Tensor::new(features.clone(), false);
        Ok(self.forward(&params, input).data().clone())
    }

    /// Summed MSE between the softmax of each output and its one-hot label
    ///
    /// Independent of the training loss, so networks trained with different
    /// losses report on the same scale.
    pub fn softmax_mse(&self, dataset: &Dataset) -> Result<f32> {
        let mut total = 0.0;
        for sample in dataset {
            let probs = softmax(&Tensor::new(self.infer(&sample.features)?, false));
            let target = TargetEncoding::ONE_HOT.encode(sample.label, probs.len());
            total += MSELoss.forward(&probs, &target).data()[0];
        }
        Ok(total)
    }

    /// Replace the weights with those of a saved model
    pub fn load_weights(&mut self, saved: &SavedModel) -> Result<()> {
        self.params.load_saved(saved)
    }

    pub fn to_saved(&self) -> SavedModel {
        let metadata = ModelMetadata::new(&self.name, self.architecture())
            .with_custom("input_len", serde_json::json!(self.input_len))
            .with_custom("output_len", serde_json::json!(self.output_len()))
            .with_custom("loss", serde_json::json!(self.loss.name()))
            .with_custom("optimizer", serde_json::json!(self.optimizer.name()));
        SavedModel::new(metadata, self.params.to_saved())
    }
}

impl Model for Network {
    /// Per-sample gradients are summed over the batch, averaged, then applied
    /// in one optimizer step
    fn train_batch(&mut self, batch: &Batch<'_>) -> Result<()> {
        if batch.is_empty() {
            return Err(Error::Model(format!("batch {} is empty", batch.index)));
        }

        self.params.zero_grad();
        let mut loss_sum = 0.0;
        for sample in batch.samples {
            self.check_input(&sample.features)?;
            let input = Tensor::new(sample.features.clone(), false);
            let output = self.forward(self.params.tensors(), input);
            let target = self.encoding.encode(sample.label, output.len());

            let loss = self.loss.forward(&output, &target);
            loss_sum += loss.data()[0];
            backward(&loss, None);
        }

        if !loss_sum.is_finite() {
            self.params.zero_grad();
            return Err(Error::Model(format!(
                "loss diverged in batch {} (offset {})",
                batch.index, batch.offset
            )));
        }

        self.params.average_grads(batch.len());
        self.optimizer.step(self.params.tensors_mut());
        self.optimizer.zero_grad(self.params.tensors_mut());

        debug!(
            batch = batch.index,
            samples = batch.len(),
            loss = loss_sum / batch.len() as f32,
            "trained batch"
        );
        Ok(())
    }

    fn predict(&self, features: &Array1<f32>) -> Result<usize> {
        let output = self.infer(features)?;
        Tensor::new(output, false)
            .argmax()
            .ok_or_else(|| Error::Model("network produced no outputs".to_string()))
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<Evaluation> {
        let params = self.params.detached();
        let mut loss_sum = 0.0;
        let mut correct = 0;

        for sample in dataset {
            self.check_input(&sample.features)?;
            let output = self.forward(&params, Tensor::new(sample.features.clone(), false));
            let target = self.encoding.encode(sample.label, output.len());
            loss_sum += self.loss.forward(&output, &target).data()[0];
            if output.argmax() == Some(sample.label) {
                correct += 1;
            }
        }

        Evaluation::from_totals(loss_sum, correct, dataset.len())
    }

    fn save(&self, path: &Path) -> Result<()> {
        save_model(&self.to_saved(), path, &SaveConfig::for_path(path)?)
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("architecture", &self.architecture())
            .field("parameters", &self.num_parameters())
            .field("loss", &self.loss.name())
            .field("optimizer", &self.optimizer.name())
            .finish()
    }
}

/// Assembles a [`Network`] layer by layer
///
/// Each layer's input length must equal the previous layer's output length;
/// `build` reports the first mismatch.
pub struct NetworkBuilder {
    name: String,
    input_len: usize,
    store: ParamStore,
    layers: Vec<Box<dyn Layer>>,
    loss_kind: LossKind,
    encoding: TargetEncoding,
    error: Option<Error>,
}

impl NetworkBuilder {
    /// Start a network reading `input_len` features; `seed` drives weight init
    pub fn new(name: impl Into<String>, input_len: usize, seed: u64) -> Self {
        Self {
            name: name.into(),
            input_len,
            store: ParamStore::new(seed),
            layers: Vec::new(),
            loss_kind: LossKind::Mse,
            encoding: TargetEncoding::ONE_HOT,
            error: None,
        }
    }

    fn current_len(&self) -> usize {
        self.layers
            .last()
            .map_or(self.input_len, |layer| layer.out_len())
    }

    fn push(mut self, layer: Box<dyn Layer>) -> Self {
        if self.error.is_none() && layer.in_len() != self.current_len() {
            self.error = Some(Error::ShapeMismatch {
                expected: vec![self.current_len()],
                got: vec![layer.in_len()],
            });
        }
        self.layers.push(layer);
        self
    }

    pub fn conv(mut self, name: &str, geom: ConvGeometry) -> Self {
        let layer = Conv2d::new(&mut self.store, name, geom);
        self.push(Box::new(layer))
    }

    pub fn conv_with_table(mut self, name: &str, geom: ConvGeometry, table: &ConnectionTable) -> Self {
        match Conv2d::with_table(&mut self.store, name, geom, table) {
            Ok(layer) => self.push(Box::new(layer)),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    pub fn avg_pool(self, geom: PoolGeometry) -> Self {
        self.push(Box::new(AvgPool2d::new(geom)))
    }

    pub fn tanh(self) -> Self {
        let len = self.current_len();
        self.push(Box::new(Tanh::new(len)))
    }

    /// Fully connected layer reading the current output
    pub fn dense(mut self, name: &str, outputs: usize) -> Self {
        let inputs = self.current_len();
        let layer = Dense::new(&mut self.store, name, inputs, outputs);
        self.push(Box::new(layer))
    }

    pub fn loss(mut self, kind: LossKind, encoding: TargetEncoding) -> Self {
        self.loss_kind = kind;
        self.encoding = encoding;
        self
    }

    pub fn build(self, optimizer: Box<dyn Optimizer>) -> Result<Network> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.layers.is_empty() {
            return Err(Error::Model(format!("network {} has no layers", self.name)));
        }

        Ok(Network {
            name: self.name,
            input_len: self.input_len,
            params: self.store,
            layers: self.layers,
            loss: self.loss_kind.build(),
            encoding: self.encoding,
            optimizer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sample;
    use crate::optim::{OptimizerKind, SGD};
    use tempfile::TempDir;

    fn toy_dataset() -> Dataset {
        // Class = which of the two features is larger
        let samples = (0..40)
            .map(|i| {
                let a = (i % 7) as f32 / 7.0;
                let b = (i % 5) as f32 / 5.0 + 0.05;
                Sample::new(ndarray::arr1(&[a, b]), usize::from(a > b))
            })
            .collect();
        Dataset::new(samples, 2).unwrap()
    }

    fn toy_network(seed: u64) -> Network {
        NetworkBuilder::new("toy", 2, seed)
            .dense("fc1", 8)
            .tanh()
            .dense("fc2", 2)
            .tanh()
            .loss(LossKind::Mse, TargetEncoding::TANH)
            .build(Box::new(SGD::new(0.2, 0.0)))
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_length_mismatch() {
        let result = NetworkBuilder::new("bad", 4, 0)
            .avg_pool(PoolGeometry {
                in_width: 3,
                in_height: 3,
                channels: 1,
                pool: 1,
            })
            .build(OptimizerKind::Sgd.build(0.1, 1));

        match result {
            Err(Error::ShapeMismatch { expected, got }) => {
                assert_eq!(expected, vec![4]);
                assert_eq!(got, vec![9]);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_requires_layers() {
        assert!(NetworkBuilder::new("empty", 3, 0)
            .build(OptimizerKind::Sgd.build(0.1, 1))
            .is_err());
    }

    #[test]
    fn test_architecture_and_counts() {
        let net = toy_network(0);
        assert_eq!(
            net.architecture(),
            "dense(2->8) -> tanh -> dense(8->2) -> tanh"
        );
        assert_eq!(net.num_parameters(), 2 * 8 + 8 + 8 * 2 + 2);
        assert_eq!(net.output_len(), 2);
    }

    #[test]
    fn test_training_reduces_loss() {
        let data = toy_dataset();
        let mut net = toy_network(1);
        let before = net.evaluate(&data).unwrap().loss;

        for _ in 0..30 {
            for batch in data.minibatches(8) {
                net.train_batch(&batch).unwrap();
            }
        }

        let after = net.evaluate(&data).unwrap().loss;
        assert!(after < before, "loss went from {before} to {after}");
    }

    #[test]
    fn test_evaluate_leaves_gradients_alone() {
        let data = toy_dataset();
        let net = toy_network(2);

        let first = net.evaluate(&data).unwrap();
        let second = net.evaluate(&data).unwrap();

        assert_eq!(first, second);
        assert!(net.params().tensors().iter().all(|t| t.grad().is_none()));
    }

    #[test]
    fn test_wrong_input_length_is_an_error() {
        let net = toy_network(0);
        assert!(matches!(
            net.predict(&ndarray::arr1(&[1.0, 2.0, 3.0])),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let mut net = toy_network(0);
        let batch = Batch {
            index: 3,
            offset: 0,
            samples: &[],
        };
        assert!(matches!(net.train_batch(&batch), Err(Error::Model(_))));
    }

    #[test]
    fn test_compute_loss_is_summed() {
        let data = toy_dataset();
        let net = toy_network(4);
        let eval = net.evaluate(&data).unwrap();
        let total = net.compute_loss(&data).unwrap();
        approx::assert_relative_eq!(total, eval.loss * 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_softmax_mse_matches_per_sample_sum() {
        let data = toy_dataset();
        let net = toy_network(7);

        let expected: f32 = data
            .iter()
            .map(|sample| {
                let out = net.infer(&sample.features).unwrap();
                let exp = out.mapv(|v| (v - out.fold(f32::NEG_INFINITY, |a, &b| a.max(b))).exp());
                let probs = &exp / exp.sum();
                let target = TargetEncoding::ONE_HOT.encode(sample.label, 2);
                (&probs - &target).mapv(|d| d * d).mean().unwrap()
            })
            .sum();

        let total = net.softmax_mse(&data).unwrap();
        approx::assert_relative_eq!(total, expected, epsilon = 1e-4);
        // Two classes: each sample contributes at most 1
        assert!(total > 0.0 && total < data.len() as f32);
    }

    #[test]
    fn test_save_and_reload_weights() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toy.safetensors");
        let trained = toy_network(5);
        trained.save(&path).unwrap();

        let mut fresh = toy_network(6);
        let input = ndarray::arr1(&[0.3, 0.7]);
        assert_ne!(trained.infer(&input).unwrap(), fresh.infer(&input).unwrap());

        fresh
            .load_weights(&crate::io::load_model(&path).unwrap())
            .unwrap();
        assert_eq!(trained.infer(&input).unwrap(), fresh.infer(&input).unwrap());
    }
}
