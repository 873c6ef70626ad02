//! Layers of a sequential network
//!
//! Layers hold [`ParamId`]s rather than tensors. `forward` receives the
//! parameter slice explicitly, so the same layer stack runs on the live
//! trainable tensors during training and on detached copies for inference.

use super::params::{ParamId, ParamStore};
use crate::autograd::{self, ConvGeometry, PoolGeometry};
use crate::{Error, Result, Tensor};
use ndarray::Array1;

pub trait Layer {
    fn forward(&self, params: &[Tensor], input: &Tensor) -> Tensor;

    fn in_len(&self) -> usize;

    fn out_len(&self) -> usize;

    /// Short description used in summaries and saved metadata
    fn describe(&self) -> String;
}

/// Fully connected layer: `y = W x + b` with `W` stored `outputs × inputs`
pub struct Dense {
    weight: ParamId,
    bias: ParamId,
    inputs: usize,
    outputs: usize,
}

impl Dense {
    pub fn new(store: &mut ParamStore, name: &str, inputs: usize, outputs: usize) -> Self {
        let weight = store.xavier(format!("{name}.weight"), vec![outputs, inputs], inputs, outputs);
        let bias = store.zeros(format!("{name}.bias"), vec![outputs]);
        Self {
            weight,
            bias,
            inputs,
            outputs,
        }
    }
}

impl Layer for Dense {
    fn forward(&self, params: &[Tensor], input: &Tensor) -> Tensor {
        let w = &params[self.weight.index()];
        let b = &params[self.bias.index()];
        let wx = autograd::matmul(w, input, self.outputs, self.inputs, 1);
        autograd::add(&wx, b)
    }

    fn in_len(&self) -> usize {
        self.inputs
    }

    fn out_len(&self) -> usize {
        self.outputs
    }

    fn describe(&self) -> String {
        format!("dense({}->{})", self.inputs, self.outputs)
    }
}

/// Which input channels feed which output channels of a convolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionTable {
    in_channels: usize,
    out_channels: usize,
    connected: Vec<bool>,
}

impl ConnectionTable {
    /// Row-major table: row `c` lists the output channels input `c` feeds
    pub fn new(in_channels: usize, out_channels: usize, connected: Vec<bool>) -> Result<Self> {
        if connected.len() != in_channels * out_channels {
            return Err(Error::ShapeMismatch {
                expected: vec![in_channels, out_channels],
                got: vec![connected.len()],
            });
        }
        Ok(Self {
            in_channels,
            out_channels,
            connected,
        })
    }

    pub fn is_connected(&self, input: usize, output: usize) -> bool {
        self.connected[input * self.out_channels + output]
    }

    /// Number of inputs feeding `output`
    pub fn fan_in(&self, output: usize) -> usize {
        (0..self.in_channels)
            .filter(|&c| self.is_connected(c, output))
            .count()
    }

    /// 0/1 mask over an `out × in × k × k` kernel tensor
    fn weight_mask(&self, kernel: usize) -> Array1<f32> {
        let area = kernel * kernel;
        let mut mask = Vec::with_capacity(self.in_channels * self.out_channels * area);
        for o in 0..self.out_channels {
            for c in 0..self.in_channels {
                let v = if self.is_connected(c, o) { 1.0 } else { 0.0 };
                mask.extend(std::iter::repeat_n(v, area));
            }
        }
        Array1::from(mask)
    }
}

/// Valid-padding, stride-1 convolution with one bias per output channel
pub struct Conv2d {
    geom: ConvGeometry,
    weight: ParamId,
    bias: ParamId,
    mask: Option<Tensor>,
}

impl Conv2d {
    pub fn new(store: &mut ParamStore, name: &str, geom: ConvGeometry) -> Self {
        let area = geom.kernel * geom.kernel;
        let weight = store.xavier(
            format!("{name}.weight"),
            vec![geom.out_channels, geom.in_channels, geom.kernel, geom.kernel],
            geom.in_channels * area,
            geom.out_channels * area,
        );
        let bias = store.zeros(format!("{name}.bias"), vec![geom.out_channels]);
        Self {
            geom,
            weight,
            bias,
            mask: None,
        }
    }

    /// Convolution where only the channel pairs in `table` are connected
    ///
    /// Disconnected kernels are zeroed in the store and masked in every
    /// forward pass, so they neither contribute nor receive updates.
    pub fn with_table(
        store: &mut ParamStore,
        name: &str,
        geom: ConvGeometry,
        table: &ConnectionTable,
    ) -> Result<Self> {
        if (table.in_channels, table.out_channels) != (geom.in_channels, geom.out_channels) {
            return Err(Error::ShapeMismatch {
                expected: vec![geom.in_channels, geom.out_channels],
                got: vec![table.in_channels, table.out_channels],
            });
        }

        let mut layer = Self::new(store, name, geom);
        let mask = table.weight_mask(geom.kernel);
        *store.get_mut(layer.weight).data_mut() *= &mask;
        layer.mask = Some(Tensor::new(mask, false));
        Ok(layer)
    }
}

impl Layer for Conv2d {
    fn forward(&self, params: &[Tensor], input: &Tensor) -> Tensor {
        let weight = &params[self.weight.index()];
        let out = match &self.mask {
            Some(mask) => autograd::conv2d(input, &autograd::mul(weight, mask), self.geom),
            None => autograd::conv2d(input, weight, self.geom),
        };
        autograd::add_channel_bias(&out, &params[self.bias.index()], self.geom.out_channels)
    }

    fn in_len(&self) -> usize {
        self.geom.input_len()
    }

    fn out_len(&self) -> usize {
        self.geom.output_len()
    }

    fn describe(&self) -> String {
        let g = self.geom;
        format!(
            "conv{k}x{k}({}@{}x{}->{}@{}x{}{})",
            g.in_channels,
            g.in_width,
            g.in_height,
            g.out_channels,
            g.out_width(),
            g.out_height(),
            if self.mask.is_some() { ", table" } else { "" },
            k = g.kernel,
        )
    }
}

/// Average pooling over non-overlapping windows
pub struct AvgPool2d {
    geom: PoolGeometry,
}

impl AvgPool2d {
    pub fn new(geom: PoolGeometry) -> Self {
        Self { geom }
    }
}

impl Layer for AvgPool2d {
    fn forward(&self, _params: &[Tensor], input: &Tensor) -> Tensor {
        autograd::avg_pool2d(input, self.geom)
    }

    fn in_len(&self) -> usize {
        self.geom.input_len()
    }

    fn out_len(&self) -> usize {
        self.geom.output_len()
    }

    fn describe(&self) -> String {
        let g = self.geom;
        format!(
            "avg_pool{}({}@{}x{}->{}@{}x{})",
            g.pool,
            g.channels,
            g.in_width,
            g.in_height,
            g.channels,
            g.out_width(),
            g.out_height()
        )
    }
}

/// Element-wise tanh activation
pub struct Tanh {
    len: usize,
}

impl Tanh {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Layer for Tanh {
    fn forward(&self, _params: &[Tensor], input: &Tensor) -> Tensor {
        autograd::tanh(input)
    }

    fn in_len(&self) -> usize {
        self.len
    }

    fn out_len(&self) -> usize {
        self.len
    }

    fn describe(&self) -> String {
        "tanh".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;

    #[test]
    fn test_dense_forward() {
        let mut store = ParamStore::new(0);
        let layer = Dense::new(&mut store, "fc", 2, 1);
        *store.get_mut(layer.weight).data_mut() = ndarray::arr1(&[2.0, -1.0]);
        *store.get_mut(layer.bias).data_mut() = ndarray::arr1(&[0.5]);

        let out = layer.forward(store.tensors(), &Tensor::from_vec(vec![3.0, 4.0], false));
        assert_relative_eq!(out.data()[0], 2.5);
    }

    #[test]
    fn test_dense_gradients_reach_store() {
        let mut store = ParamStore::new(0);
        let layer = Dense::new(&mut store, "fc", 3, 2);

        let out = layer.forward(store.tensors(), &Tensor::from_vec(vec![1.0, 0.0, 2.0], false));
        backward(&out, None);

        let gw = store.get(layer.weight).grad().unwrap();
        assert_eq!(gw.to_vec(), vec![1.0, 0.0, 2.0, 1.0, 0.0, 2.0]);
        assert_eq!(store.get(layer.bias).grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_connection_table_validation() {
        assert!(ConnectionTable::new(2, 3, vec![true; 5]).is_err());

        let table = ConnectionTable::new(2, 2, vec![true, false, true, true]).unwrap();
        assert!(table.is_connected(0, 0));
        assert!(!table.is_connected(0, 1));
        assert_eq!(table.fan_in(0), 2);
        assert_eq!(table.fan_in(1), 1);
    }

    #[test]
    fn test_table_masks_disconnected_kernels() {
        let geom = ConvGeometry {
            in_width: 3,
            in_height: 3,
            kernel: 2,
            in_channels: 2,
            out_channels: 2,
        };
        // Input 0 feeds only output 0; input 1 feeds both
        let table = ConnectionTable::new(2, 2, vec![true, false, true, true]).unwrap();
        let mut store = ParamStore::new(5);
        let layer = Conv2d::with_table(&mut store, "c3", geom, &table).unwrap();

        // Kernel (o=1, c=0) occupies weights 8..12 and starts zeroed
        let weights = store.get(layer.weight).data().clone();
        assert!(weights.slice(ndarray::s![8..12]).iter().all(|&w| w == 0.0));

        let input = Tensor::from_vec((0..18).map(|v| v as f32 * 0.1).collect(), false);
        let out = layer.forward(store.tensors(), &input);
        assert_eq!(out.len(), geom.output_len());

        backward(&out, None);
        let gw = store.get(layer.weight).grad().unwrap();
        assert!(gw.slice(ndarray::s![8..12]).iter().all(|&g| g == 0.0));
        assert!(gw.slice(ndarray::s![0..4]).iter().any(|&g| g != 0.0));
    }

    #[test]
    fn test_table_shape_must_match_geometry() {
        let geom = ConvGeometry {
            in_width: 5,
            in_height: 5,
            kernel: 3,
            in_channels: 2,
            out_channels: 3,
        };
        let table = ConnectionTable::new(3, 2, vec![true; 6]).unwrap();
        let mut store = ParamStore::new(0);
        assert!(Conv2d::with_table(&mut store, "c", geom, &table).is_err());
    }

    #[test]
    fn test_layer_lengths_and_descriptions() {
        let mut store = ParamStore::new(0);
        let conv = Conv2d::new(
            &mut store,
            "c1",
            ConvGeometry {
                in_width: 32,
                in_height: 32,
                kernel: 5,
                in_channels: 1,
                out_channels: 6,
            },
        );
        assert_eq!(conv.in_len(), 1024);
        assert_eq!(conv.out_len(), 6 * 28 * 28);
        assert_eq!(conv.describe(), "conv5x5(1@32x32->6@28x28)");

        let pool = AvgPool2d::new(PoolGeometry {
            in_width: 28,
            in_height: 28,
            channels: 6,
            pool: 2,
        });
        assert_eq!(pool.out_len(), 6 * 14 * 14);
        assert_eq!(Tanh::new(10).describe(), "tanh");
    }
}
