//! Backward operation trait

/// A node of the gradient tape
///
/// Implementations read the gradient of the tensor they produced, push the
/// corresponding gradients into their inputs and recurse into the inputs'
/// own backward operations.
pub trait BackwardOp {
    fn backward(&self);
}
