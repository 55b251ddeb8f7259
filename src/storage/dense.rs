use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use super::Storage;
use crate::error::{Error, Result};
use crate::util::{read_f32s, to_usize};

/// Dense in-memory embedding matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    inner: Array2<f32>,
}

impl DenseMatrix {
    pub fn new(arr: Array2<f32>) -> Self {
        DenseMatrix { inner: arr }
    }

    /// Construct a zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        DenseMatrix {
            inner: Array2::zeros((rows, cols)),
        }
    }

    /// Construct a matrix with components drawn uniformly from
    /// *[-bound, bound)*.
    ///
    /// Returns a precondition error when `bound` is not positive and
    /// finite.
    pub fn uniform<R>(rows: usize, cols: usize, bound: f32, rng: &mut R) -> Result<Self>
    where
        R: Rng,
    {
        if !bound.is_finite() || bound <= 0. {
            return Err(Error::Precondition(format!(
                "Uniform initialization needs a positive, finite bound, got: {}",
                bound
            )));
        }

        let dist = Uniform::new(-bound, bound);
        Ok(DenseMatrix {
            inner: Array2::from_shape_fn((rows, cols), |_| dist.sample(&mut *rng)),
        })
    }

    /// Set all components to zero.
    pub fn zero(&mut self) {
        self.inner.fill(0.);
    }

    /// Add `scale` times `vec` to row `idx`.
    pub fn add_to_row(&mut self, vec: ArrayView1<f32>, idx: usize, scale: f32) {
        self.inner.row_mut(idx).scaled_add(scale, &vec);
    }

    /// Get a view of the matrix.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.inner.view()
    }

    /// Get a mutable view of the matrix.
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.inner.view_mut()
    }

    /// Read a matrix: rows (i64), cols (i64), row-major f32 data.
    ///
    /// The shape in the file must be `shape`.
    pub fn read<R>(reader: &mut R, shape: (usize, usize)) -> Result<Self>
    where
        R: Read,
    {
        let rows = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of embedding matrix rows", e))?;
        let cols = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| {
                Error::read_error("Cannot read number of embedding matrix columns", e)
            })?;
        let rows = to_usize(rows, "number of embedding matrix rows")?;
        let cols = to_usize(cols, "number of embedding matrix columns")?;
        if (rows, cols) != shape {
            return Err(Error::Format(format!(
                "Embedding matrix has shape {:?}, expected: {:?}",
                (rows, cols),
                shape
            )));
        }

        let len = rows.checked_mul(cols).ok_or(Error::Overflow)?;
        let data = read_f32s(reader, len, "Cannot read embedding matrix")?;

        Ok(DenseMatrix {
            inner: Array2::from_shape_vec((rows, cols), data)?,
        })
    }

    /// Write the matrix in the layout read by `DenseMatrix::read`.
    pub fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: Write,
    {
        writer
            .write_i64::<LittleEndian>(self.inner.nrows() as i64)
            .map_err(|e| Error::write_error("Cannot write number of embedding matrix rows", e))?;
        writer
            .write_i64::<LittleEndian>(self.inner.ncols() as i64)
            .map_err(|e| {
                Error::write_error("Cannot write number of embedding matrix columns", e)
            })?;

        for &component in self.inner.iter() {
            writer
                .write_f32::<LittleEndian>(component)
                .map_err(|e| Error::write_error("Cannot write embedding matrix component", e))?;
        }

        Ok(())
    }
}

impl From<Array2<f32>> for DenseMatrix {
    fn from(arr: Array2<f32>) -> Self {
        DenseMatrix::new(arr)
    }
}

impl From<DenseMatrix> for Array2<f32> {
    fn from(arr: DenseMatrix) -> Self {
        arr.inner
    }
}

impl Storage for DenseMatrix {
    fn add_row_into(&self, mut vec: ArrayViewMut1<f32>, idx: usize, scale: f32) {
        vec.scaled_add(scale, &self.inner.row(idx));
    }

    fn shape(&self) -> (usize, usize) {
        self.inner.dim()
    }

    fn embedding(&self, idx: usize) -> Array1<f32> {
        self.inner.row(idx).to_owned()
    }
}
