//! Singleton batch dimension handling
//!
//! Graphs expect a leading batch axis. When the engine is not in batch mode,
//! callbacks work one example at a time and the engine adds/removes the axis.

use ndarray::Axis;

use crate::graph::Tensor;

/// Prepend a leading axis of size 1
pub fn add_batch_dim(tensor: Tensor) -> Tensor {
    tensor.insert_axis(Axis(0))
}

/// Drop a leading axis of size 1; anything else is returned unchanged
pub fn remove_batch_dim(tensor: Tensor) -> Tensor {
    if tensor.ndim() > 0 && tensor.shape()[0] == 1 {
        tensor.index_axis_move(Axis(0), 0)
    } else {
        tensor
    }
}
