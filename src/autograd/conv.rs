//! Image-shaped autograd operations
//!
//! Feature maps are stored channel-major: element `(c, y, x)` of a
//! `channels × height × width` map lives at `(c * height + y) * width + x`.

use super::tensor::GradCell;
use super::{BackwardOp, Tensor};
use ndarray::Array1;
use std::rc::Rc;

/// Geometry of a valid-padding, stride-1 convolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvGeometry {
    pub in_width: usize,
    pub in_height: usize,
    pub kernel: usize,
    pub in_channels: usize,
    pub out_channels: usize,
}

impl ConvGeometry {
    pub fn out_width(&self) -> usize {
        self.in_width + 1 - self.kernel
    }

    pub fn out_height(&self) -> usize {
        self.in_height + 1 - self.kernel
    }

    pub fn input_len(&self) -> usize {
        self.in_channels * self.in_height * self.in_width
    }

    pub fn output_len(&self) -> usize {
        self.out_channels * self.out_height() * self.out_width()
    }

    /// Weight layout is `out_channels × in_channels × kernel × kernel`
    pub fn weight_len(&self) -> usize {
        self.out_channels * self.in_channels * self.kernel * self.kernel
    }

    fn weight_index(&self, o: usize, c: usize, ky: usize, kx: usize) -> usize {
        ((o * self.in_channels + c) * self.kernel + ky) * self.kernel + kx
    }
}

/// Geometry of a non-overlapping average pooling window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolGeometry {
    pub in_width: usize,
    pub in_height: usize,
    pub channels: usize,
    pub pool: usize,
}

impl PoolGeometry {
    pub fn out_width(&self) -> usize {
        self.in_width / self.pool
    }

    pub fn out_height(&self) -> usize {
        self.in_height / self.pool
    }

    pub fn input_len(&self) -> usize {
        self.channels * self.in_height * self.in_width
    }

    pub fn output_len(&self) -> usize {
        self.channels * self.out_height() * self.out_width()
    }
}

/// 2-D convolution (valid padding, stride 1, no bias)
pub fn conv2d(input: &Tensor, weight: &Tensor, geom: ConvGeometry) -> Tensor {
    assert_eq!(input.len(), geom.input_len(), "conv2d: input size mismatch");
    assert_eq!(weight.len(), geom.weight_len(), "conv2d: weight size mismatch");

    let (ow, oh) = (geom.out_width(), geom.out_height());
    let x = input.data();
    let w = weight.data();
    let mut out = vec![0.0; geom.output_len()];

    for o in 0..geom.out_channels {
        for c in 0..geom.in_channels {
            for ky in 0..geom.kernel {
                for kx in 0..geom.kernel {
                    let wv = w[geom.weight_index(o, c, ky, kx)];
                    if wv == 0.0 {
                        continue;
                    }
                    for y in 0..oh {
                        let in_row = (c * geom.in_height + y + ky) * geom.in_width + kx;
                        let out_row = (o * oh + y) * ow;
                        for xo in 0..ow {
                            out[out_row + xo] += wv * x[in_row + xo];
                        }
                    }
                }
            }
        }
    }

    let requires_grad = input.requires_grad() || weight.requires_grad();
    let mut result = Tensor::new(Array1::from(out), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(Conv2dBackward {
            input: input.clone(),
            weight: weight.clone(),
            geom,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct Conv2dBackward {
    input: Tensor,
    weight: Tensor,
    geom: ConvGeometry,
    result_grad: GradCell,
}

impl BackwardOp for Conv2dBackward {
    fn backward(&self) {
        if let Some(g) = self.result_grad.borrow().as_ref() {
            let geom = self.geom;
            let (ow, oh) = (geom.out_width(), geom.out_height());
            let x = self.input.data();
            let w = self.weight.data();

            let mut grad_x = self
                .input
                .requires_grad()
                .then(|| vec![0.0; geom.input_len()]);
            let mut grad_w = self
                .weight
                .requires_grad()
                .then(|| vec![0.0; geom.weight_len()]);

            for o in 0..geom.out_channels {
                for c in 0..geom.in_channels {
                    for ky in 0..geom.kernel {
                        for kx in 0..geom.kernel {
                            let wi = geom.weight_index(o, c, ky, kx);
                            let wv = w[wi];
                            let mut dw = 0.0;
                            for y in 0..oh {
                                let in_row = (c * geom.in_height + y + ky) * geom.in_width + kx;
                                let out_row = (o * oh + y) * ow;
                                for xo in 0..ow {
                                    let go = g[out_row + xo];
                                    dw += go * x[in_row + xo];
                                    if let Some(gx) = grad_x.as_mut() {
                                        gx[in_row + xo] += go * wv;
                                    }
                                }
                            }
                            if let Some(gw) = grad_w.as_mut() {
                                gw[wi] += dw;
                            }
                        }
                    }
                }
            }

            if let Some(gx) = grad_x {
                self.input.accumulate_grad(Array1::from(gx));
            }
            if let Some(gw) = grad_w {
                self.weight.accumulate_grad(Array1::from(gw));
            }

            if let Some(op) = self.input.backward_op() {
                op.backward();
            }
            if let Some(op) = self.weight.backward_op() {
                op.backward();
            }
        }
    }
}

/// Add one bias value to every element of the matching channel
pub fn add_channel_bias(input: &Tensor, bias: &Tensor, channels: usize) -> Tensor {
    assert_eq!(bias.len(), channels, "channel bias: one value per channel");
    assert_eq!(
        input.len() % channels,
        0,
        "channel bias: input not divisible into channels"
    );

    let plane = input.len() / channels;
    let mut data = input.data().clone();
    for (c, chunk) in data
        .as_slice_mut()
        .expect("fresh array is contiguous")
        .chunks_mut(plane)
        .enumerate()
    {
        let b = bias.data()[c];
        chunk.iter_mut().for_each(|v| *v += b);
    }

    let requires_grad = input.requires_grad() || bias.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ChannelBiasBackward {
            input: input.clone(),
            bias: bias.clone(),
            plane,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ChannelBiasBackward {
    input: Tensor,
    bias: Tensor,
    plane: usize,
    result_grad: GradCell,
}

impl BackwardOp for ChannelBiasBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.input.requires_grad() {
                self.input.accumulate_grad(grad.clone());
            }
            if self.bias.requires_grad() {
                let per_channel: Vec<f32> = grad
                    .iter()
                    .copied()
                    .collect::<Vec<_>>()
                    .chunks(self.plane)
                    .map(|chunk| chunk.iter().sum())
                    .collect();
                self.bias.accumulate_grad(Array1::from(per_channel));
            }

            if let Some(op) = self.input.backward_op() {
                op.backward();
            }
            if let Some(op) = self.bias.backward_op() {
                op.backward();
            }
        }
    }
}

/// Average pooling over non-overlapping `pool × pool` windows
pub fn avg_pool2d(input: &Tensor, geom: PoolGeometry) -> Tensor {
    assert_eq!(input.len(), geom.input_len(), "avg_pool2d: input size mismatch");

    let (ow, oh, p) = (geom.out_width(), geom.out_height(), geom.pool);
    let norm = 1.0 / (p * p) as f32;
    let x = input.data();
    let mut out = vec![0.0; geom.output_len()];

    for c in 0..geom.channels {
        for y in 0..oh {
            for xo in 0..ow {
                let mut acc = 0.0;
                for dy in 0..p {
                    let row = (c * geom.in_height + y * p + dy) * geom.in_width + xo * p;
                    for dx in 0..p {
                        acc += x[row + dx];
                    }
                }
                out[(c * oh + y) * ow + xo] = acc * norm;
            }
        }
    }

    let requires_grad = input.requires_grad();
    let mut result = Tensor::new(Array1::from(out), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AvgPoolBackward {
            input: input.clone(),
            geom,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AvgPoolBackward {
    input: Tensor,
    geom: PoolGeometry,
    result_grad: GradCell,
}

impl BackwardOp for AvgPoolBackward {
    fn backward(&self) {
        if let Some(g) = self.result_grad.borrow().as_ref() {
            if self.input.requires_grad() {
                let geom = self.geom;
                let (ow, oh, p) = (geom.out_width(), geom.out_height(), geom.pool);
                let norm = 1.0 / (p * p) as f32;
                let mut grad_x = vec![0.0; geom.input_len()];

                for c in 0..geom.channels {
                    for y in 0..oh {
                        for xo in 0..ow {
                            let share = g[(c * oh + y) * ow + xo] * norm;
                            for dy in 0..p {
                                let row =
                                    (c * geom.in_height + y * p + dy) * geom.in_width + xo * p;
                                for dx in 0..p {
                                    grad_x[row + dx] += share;
                                }
                            }
                        }
                    }
                }
                self.input.accumulate_grad(Array1::from(grad_x));
            }

            if let Some(op) = self.input.backward_op() {
                op.backward();
            }
        }
    }
}
