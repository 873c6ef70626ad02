//! Tape-based autograd engine
//!
//! Tensors are flat `Array1<f32>` buffers; image-shaped operations take their
//! geometry as explicit arguments. Each operation records a [`BackwardOp`]
//! on its result, and calling [`backward`] on a scalar walks the graph back
//! to the leaf parameters, accumulating gradients into their shared cells.

mod backward;
mod conv;
mod ops;
mod tensor;


pub use backward::BackwardOp;
pub use conv::{add_channel_bias, avg_pool2d, conv2d, ConvGeometry, PoolGeometry};
pub use ops::*;
pub use tensor::Tensor;
pub(crate) use tensor::GradCell;

/// Perform backward pass on a tensor
///
/// Without an explicit `grad_output` the tensor is treated as a scalar loss
/// and seeded with ones.
pub fn backward(tensor: &Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    let seed = grad_output.unwrap_or_else(|| ndarray::Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
