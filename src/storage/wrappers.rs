use std::io::{Read, Write};

use ndarray::ArrayViewMut1;

use super::{DenseMatrix, QuantizedMatrix, Storage};
use crate::error::Result;

/// Storage types wrapper.
///
/// A fastText model stores its input matrix either as a dense matrix
/// or as a product-quantized matrix. `StorageWrap` covers both, so
/// that a model does not have to be generic over its storage.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageWrap {
    Dense(DenseMatrix),
    // Boxed: clippy complains about large variant otherwise.
    Quantized(Box<QuantizedMatrix>),
}

impl StorageWrap {
    /// Returns `true` if the wrapped matrix is quantized.
    pub fn is_quantized(&self) -> bool {
        match self {
            StorageWrap::Dense(_) => false,
            StorageWrap::Quantized(_) => true,
        }
    }

    /// Read a matrix, `quantized` selects the storage layout.
    ///
    /// Reading fails if the matrix does not have the given shape.
    pub fn read<R>(reader: &mut R, quantized: bool, shape: (usize, usize)) -> Result<Self>
    where
        R: Read,
    {
        if quantized {
            QuantizedMatrix::read(reader, shape).map(Into::into)
        } else {
            DenseMatrix::read(reader, shape).map(Into::into)
        }
    }

    /// Write the wrapped matrix.
    pub fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: Write,
    {
        match self {
            StorageWrap::Dense(inner) => inner.write(writer),
            StorageWrap::Quantized(inner) => inner.write(writer),
        }
    }
}

impl Storage for StorageWrap {
    fn add_row_into(&self, vec: ArrayViewMut1<f32>, idx: usize, scale: f32) {
        match self {
            StorageWrap::Dense(inner) => inner.add_row_into(vec, idx, scale),
            StorageWrap::Quantized(inner) => inner.add_row_into(vec, idx, scale),
        }
    }

    fn shape(&self) -> (usize, usize) {
        match self {
            StorageWrap::Dense(inner) => inner.shape(),
            StorageWrap::Quantized(inner) => inner.shape(),
        }
    }
}

impl From<DenseMatrix> for StorageWrap {
    fn from(s: DenseMatrix) -> Self {
        StorageWrap::Dense(s)
    }
}

impl From<QuantizedMatrix> for StorageWrap {
    fn from(s: QuantizedMatrix) -> Self {
        StorageWrap::Quantized(Box::new(s))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ndarray::Array2;

    use super::StorageWrap;
    use crate::error::Error;
    use crate::storage::{DenseMatrix, Storage};

    #[test]
    fn dense_wrap_roundtrip() {
        let check: StorageWrap =
            DenseMatrix::new(Array2::from_shape_fn((3, 2), |(r, c)| (r * 2 + c) as f32)).into();
        assert!(!check.is_quantized());
        assert_eq!(check.shape(), (3, 2));

        let mut cursor = Cursor::new(Vec::new());
        check.write(&mut cursor).unwrap();
        cursor.set_position(0);
        assert_eq!(StorageWrap::read(&mut cursor, false, (3, 2)).unwrap(), check);
    }

    #[test]
    fn dense_wrap_with_other_shape_fails() {
        let check: StorageWrap = DenseMatrix::new(Array2::zeros((3, 2))).into();
        let mut cursor = Cursor::new(Vec::new());
        check.write(&mut cursor).unwrap();
        cursor.set_position(0);
        assert!(matches!(
            StorageWrap::read(&mut cursor, false, (2, 3)),
            Err(Error::Format(_))
        ));
    }
}
