//! Embedding matrix representations.

use ndarray::{Array1, ArrayViewMut1};

mod dense;
pub use self::dense::DenseMatrix;

mod quantized;
pub use self::quantized::{ProductQuantizer, Quantize, QuantizedMatrix, N_CENTROIDS};

mod wrappers;
pub use self::wrappers::StorageWrap;

/// Embedding matrix storage.
///
/// To allow for embeddings to be stored in different manners (e.g.
/// regular *n x d* matrix or as quantized vectors), this trait
/// abstracts over concrete storage types. The only capability that
/// vector aggregation needs is adding a (scaled) row to a vector.
pub trait Storage {
    /// Add `scale` times row `idx` to `vec`.
    ///
    /// Panics when `idx` is not a valid row or the length of `vec`
    /// differs from the number of columns.
    fn add_row_into(&self, vec: ArrayViewMut1<f32>, idx: usize, scale: f32);

    /// Shape of the matrix as *(rows, cols)*.
    fn shape(&self) -> (usize, usize);

    /// Get a copy of row `idx`.
    fn embedding(&self, idx: usize) -> Array1<f32> {
        let mut embedding = Array1::zeros(self.shape().1);
        self.add_row_into(embedding.view_mut(), idx, 1.0);
        embedding
    }
}
