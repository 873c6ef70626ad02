//! Stock network topologies

use super::layers::ConnectionTable;
use super::loss::{LossKind, TargetEncoding};
use super::network::{Network, NetworkBuilder};
use crate::autograd::{ConvGeometry, PoolGeometry};
use crate::optim::Optimizer;
use crate::Result;

/// Side length of the padded MNIST input
pub const LENET_INPUT_SIDE: usize = 32;
pub const LENET_CLASSES: usize = 10;

const O: bool = true;
const X: bool = false;

/// S2→C3 connections from LeCun et al. 1998, Table 1 (6 rows × 16 columns)
#[rustfmt::skip]
const LENET_C3_TABLE: [bool; 96] = [
    O, X, X, X, O, O, O, X, X, O, O, O, O, X, O, O,
    O, O, X, X, X, O, O, O, X, X, O, O, O, O, X, O,
    O, O, O, X, X, X, O, O, O, X, X, O, X, O, O, O,
    X, O, O, O, X, X, O, O, O, O, X, X, O, X, O, O,
    X, X, O, O, O, X, X, O, O, O, O, X, O, O, X, O,
    X, X, X, O, O, O, X, X, O, O, O, O, X, O, O, O,
];

pub fn lenet_c3_table() -> Result<ConnectionTable> {
    ConnectionTable::new(6, 16, LENET_C3_TABLE.to_vec())
}

fn conv(side: usize, in_channels: usize, out_channels: usize) -> ConvGeometry {
    ConvGeometry {
        in_width: side,
        in_height: side,
        kernel: 5,
        in_channels,
        out_channels,
    }
}

fn pool(side: usize, channels: usize) -> PoolGeometry {
    PoolGeometry {
        in_width: side,
        in_height: side,
        channels,
        pool: 2,
    }
}

/// LeNet-5 for 32×32 single-channel digits
///
/// ```text
/// C1 conv 1@32x32 -> 6@28x28, tanh
/// S2 avg-pool     -> 6@14x14, tanh
/// C3 conv (table) -> 16@10x10, tanh
/// S4 avg-pool     -> 16@5x5, tanh
/// C5 conv         -> 120@1x1, tanh
/// F6 dense        -> 10, tanh
/// ```
///
/// Trained with MSE against ±0.8 targets.
pub fn lenet5(seed: u64, optimizer: Box<dyn Optimizer>) -> Result<Network> {
    NetworkBuilder::new("LeNet-5", LENET_INPUT_SIDE * LENET_INPUT_SIDE, seed)
        .conv("c1", conv(32, 1, 6))
        .tanh()
        .avg_pool(pool(28, 6))
        .tanh()
        .conv_with_table("c3", conv(14, 6, 16), &lenet_c3_table()?)
        .tanh()
        .avg_pool(pool(10, 16))
        .tanh()
        .conv("c5", conv(5, 16, 120))
        .tanh()
        .dense("f6", LENET_CLASSES)
        .tanh()
        .loss(LossKind::Mse, TargetEncoding::TANH)
        .build(optimizer)
}

/// One-hidden-layer classifier trained with softmax cross entropy
pub fn mlp(
    inputs: usize,
    hidden: usize,
    classes: usize,
    seed: u64,
    optimizer: Box<dyn Optimizer>,
) -> Result<Network> {
    NetworkBuilder::new("mlp", inputs, seed)
        .dense("fc1", hidden)
        .tanh()
        .dense("fc2", classes)
        .loss(LossKind::CrossEntropy, TargetEncoding::ONE_HOT)
        .build(optimizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, Sample};
    use crate::optim::OptimizerKind;
    use crate::train::Model;

    #[test]
    fn test_c3_table_fan_in() {
        let table = lenet_c3_table().unwrap();
        // Columns 0-5 read 3 maps, 6-14 read 4, column 15 reads all 6
        let fan_in: Vec<usize> = (0..16).map(|o| table.fan_in(o)).collect();
        assert_eq!(
            fan_in,
            vec![3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 6]
        );
    }

    #[test]
    fn test_lenet_shape() {
        let net = lenet5(0, OptimizerKind::Adagrad.build(0.1, 32)).unwrap();

        assert_eq!(net.input_len(), 1024);
        assert_eq!(net.output_len(), 10);
        // C1 156, C3 2416, C5 48120, F6 1210 (masked C3 kernels still stored)
        assert_eq!(net.num_parameters(), 156 + (16 * 6 * 25 + 16) + 48_120 + 1_210);
        assert!(net.architecture().starts_with("conv5x5(1@32x32->6@28x28)"));
        assert!(net.architecture().contains("conv5x5(6@14x14->16@10x10, table)"));
    }

    #[test]
    fn test_lenet_trains_one_batch() {
        let mut net = lenet5(1, OptimizerKind::Adagrad.build(0.1, 2)).unwrap();
        let samples = (0..2)
            .map(|label| {
                let features = ndarray::Array1::from_shape_fn(1024, |i| {
                    if (i / 32 + label) % 2 == 0 { 0.5 } else { -1.0 }
                });
                Sample::new(features, label)
            })
            .collect();
        let data = Dataset::new(samples, 10).unwrap();

        let before = net.params().tensors()[0].data().clone();
        let batch = data.minibatches(2).next().unwrap();
        net.train_batch(&batch).unwrap();
        assert_ne!(&before, net.params().tensors()[0].data());

        let eval = net.evaluate(&data).unwrap();
        assert_eq!(eval.total, 2);
        assert!(eval.loss.is_finite());
        assert!(net.predict(&data.samples()[0].features).unwrap() < 10);
    }

    #[test]
    fn test_mlp_shape() {
        let net = mlp(10, 50, 31, 0, OptimizerKind::Adam.build(0.001, 64)).unwrap();
        assert_eq!(net.num_parameters(), 10 * 50 + 50 + 50 * 31 + 31);
        assert_eq!(net.output_len(), 31);
    }
}
