use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, CowArray};
use rand::{RngCore, SeedableRng};
use rand_xorshift::XorShiftRng;
use reductive::pq::{QuantizeVector, ReconstructVector, TrainPQ, PQ};

use super::{DenseMatrix, Storage};
use crate::error::{Error, Result};
use crate::util::{l2_normalize, read_bytes, read_f32s, to_usize};

/// Number of centroids per subquantizer in the fastText format.
pub const N_CENTROIDS: usize = 256;

/// fastText product quantizer.
///
/// The vector space is split into `nsubq` subspaces of `dsub`
/// components, the last subspace has `lastdsub` components. Each
/// subspace has 256 centroids, so a vector is encoded as one byte
/// per subspace.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductQuantizer {
    dim: usize,
    nsubq: usize,
    dsub: usize,
    lastdsub: usize,
    centroids: Vec<f32>,
}

impl ProductQuantizer {
    /// Construct a quantizer for `dim`-dimensional vectors with
    /// subspaces of `dsub` components.
    ///
    /// `centroids` must contain `dim * 256` components: for each
    /// subspace, 256 centroids of the subspace length.
    pub fn new(dim: usize, dsub: usize, centroids: Vec<f32>) -> Result<Self> {
        if dim == 0 || dsub == 0 {
            return Err(Error::Precondition(format!(
                "Product quantizer needs non-zero dimensions, got dim: {}, dsub: {}",
                dim, dsub
            )));
        }

        let (nsubq, lastdsub) = match dim % dsub {
            0 => (dim / dsub, dsub),
            rest => (dim / dsub + 1, rest),
        };

        Self::from_parts(dim, nsubq, dsub, lastdsub, centroids)
    }

    fn from_parts(
        dim: usize,
        nsubq: usize,
        dsub: usize,
        lastdsub: usize,
        centroids: Vec<f32>,
    ) -> Result<Self> {
        if nsubq == 0 || (nsubq - 1) * dsub + lastdsub != dim {
            return Err(Error::Format(format!(
                "Inconsistent product quantizer: dim: {}, nsubq: {}, dsub: {}, lastdsub: {}",
                dim, nsubq, dsub, lastdsub
            )));
        }

        if centroids.len() != dim * N_CENTROIDS {
            return Err(Error::Format(format!(
                "Product quantizer has {} centroid components, expected: {}",
                centroids.len(),
                dim * N_CENTROIDS
            )));
        }

        Ok(ProductQuantizer {
            dim,
            nsubq,
            dsub,
            lastdsub,
            centroids,
        })
    }

    /// Convert a trained `reductive` quantizer.
    ///
    /// Subquantizers with fewer than 256 centroids are padded with
    /// zero centroids, which are never referenced by codes.
    fn from_pq(pq: &PQ<f32>) -> Result<Self> {
        if pq.projection().is_some() {
            return Err(Error::Precondition(String::from(
                "Quantizers with a projection cannot be stored in fastText models",
            )));
        }

        let n_centroids = pq.n_quantizer_centroids();
        if n_centroids > N_CENTROIDS {
            return Err(Error::Precondition(format!(
                "Quantizer has {} centroids per subquantizer, at most {} are supported",
                n_centroids, N_CENTROIDS
            )));
        }

        let nsubq = pq.quantized_len();
        let dim = pq.reconstructed_len();
        let dsub = dim / nsubq;
        let subquantizers = pq.subquantizers();

        let mut centroids = vec![0f32; dim * N_CENTROIDS];
        for m in 0..nsubq {
            for c in 0..n_centroids {
                for n in 0..dsub {
                    centroids[(m * N_CENTROIDS + c) * dsub + n] = subquantizers[[m, c, n]];
                }
            }
        }

        Self::from_parts(dim, nsubq, dsub, dsub, centroids)
    }

    /// Length of the reconstructed vectors.
    pub fn dims(&self) -> usize {
        self.dim
    }

    /// Number of subquantizers, which is also the code length.
    pub fn n_subquantizers(&self) -> usize {
        self.nsubq
    }

    fn centroid(&self, m: usize, code: u8) -> &[f32] {
        let code = code as usize;
        let (start, len) = if m == self.nsubq - 1 {
            (
                m * N_CENTROIDS * self.dsub + code * self.lastdsub,
                self.lastdsub,
            )
        } else {
            ((m * N_CENTROIDS + code) * self.dsub, self.dsub)
        };

        &self.centroids[start..start + len]
    }

    /// Add `alpha` times the vector reconstructed from `code` to `vec`.
    pub fn add_code(&self, mut vec: ArrayViewMut1<f32>, code: ArrayView1<u8>, alpha: f32) {
        for (m, &c) in code.iter().enumerate() {
            let offset = m * self.dsub;
            for (n, &component) in self.centroid(m, c).iter().enumerate() {
                vec[offset + n] += alpha * component;
            }
        }
    }

    /// Read a quantizer that reconstructs `dims`-dimensional vectors.
    fn read<R>(reader: &mut R, dims: usize) -> Result<Self>
    where
        R: Read,
    {
        let dim = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read quantizer dimensionality", e))?;
        let nsubq = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of subquantizers", e))?;
        let dsub = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read subquantizer length", e))?;
        let lastdsub = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read last subquantizer length", e))?;

        let dim = to_usize(dim, "quantizer dimensionality")?;
        if dim != dims {
            return Err(Error::Format(format!(
                "Quantizer reconstructs {} components, expected: {}",
                dim, dims
            )));
        }

        let len = dim.checked_mul(N_CENTROIDS).ok_or(Error::Overflow)?;
        let centroids = read_f32s(reader, len, "Cannot read quantizer centroids")?;

        Self::from_parts(
            dim,
            to_usize(nsubq, "number of subquantizers")?,
            to_usize(dsub, "subquantizer length")?,
            to_usize(lastdsub, "last subquantizer length")?,
            centroids,
        )
    }

    fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: Write,
    {
        let fields = [
            (self.dim, "quantizer dimensionality"),
            (self.nsubq, "number of subquantizers"),
            (self.dsub, "subquantizer length"),
            (self.lastdsub, "last subquantizer length"),
        ];
        for &(value, desc) in &fields {
            writer
                .write_i32::<LittleEndian>(value as i32)
                .map_err(|e| Error::write_error(format!("Cannot write {}", desc), e))?;
        }

        for &component in &self.centroids {
            writer
                .write_f32::<LittleEndian>(component)
                .map_err(|e| Error::write_error("Cannot write quantizer centroid component", e))?;
        }

        Ok(())
    }
}

/// Quantized l2 norms of the rows of a quantized matrix.
#[derive(Clone, Debug, PartialEq)]
struct QuantizedNorms {
    quantizer: ProductQuantizer,
    codes: Array1<u8>,
}

impl QuantizedNorms {
    fn norm(&self, idx: usize) -> f32 {
        self.quantizer.centroid(0, self.codes[idx])[0]
    }
}

/// fastText quantized embedding matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizedMatrix {
    quantizer: ProductQuantizer,
    codes: Array2<u8>,
    norms: Option<QuantizedNorms>,
}

impl QuantizedMatrix {
    /// Construct a quantized matrix.
    ///
    /// `codes` has one row per embedding and one column per
    /// subquantizer. If `norms` is given, the reconstructed rows are
    /// scaled by the norm centroid of the norm code of the row. The
    /// norm quantizer must be one-dimensional.
    pub fn new(
        quantizer: ProductQuantizer,
        codes: Array2<u8>,
        norms: Option<(ProductQuantizer, Array1<u8>)>,
    ) -> Result<Self> {
        if codes.ncols() != quantizer.n_subquantizers() {
            return Err(Error::Format(format!(
                "Code length {} does not match the number of subquantizers {}",
                codes.ncols(),
                quantizer.n_subquantizers()
            )));
        }

        let norms = match norms {
            Some((norm_quantizer, norm_codes)) => {
                if norm_quantizer.dims() != 1 {
                    return Err(Error::Format(format!(
                        "Norm quantizer should be one-dimensional, has {} dimensions",
                        norm_quantizer.dims()
                    )));
                }

                if norm_codes.len() != codes.nrows() {
                    return Err(Error::Format(format!(
                        "Number of norm codes {} does not match the number of rows {}",
                        norm_codes.len(),
                        codes.nrows()
                    )));
                }

                Some(QuantizedNorms {
                    quantizer: norm_quantizer,
                    codes: norm_codes,
                })
            }
            None => None,
        };

        Ok(QuantizedMatrix {
            quantizer,
            codes,
            norms,
        })
    }

    /// Get the quantizer.
    pub fn quantizer(&self) -> &ProductQuantizer {
        &self.quantizer
    }

    /// Returns `true` if the row norms are quantized separately.
    pub fn has_norms(&self) -> bool {
        self.norms.is_some()
    }

    /// Read a quantized matrix.
    ///
    /// The shape in the file must be `shape`.
    pub fn read<R>(reader: &mut R, shape: (usize, usize)) -> Result<Self>
    where
        R: Read,
    {
        let qnorm = reader
            .read_u8()
            .map_err(|e| Error::read_error("Cannot read norm quantization flag", e))?
            != 0;
        let rows = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of quantized rows", e))?;
        let cols = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of quantized columns", e))?;
        let code_size = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read code size", e))?;

        let rows = to_usize(rows, "number of quantized rows")?;
        let cols = to_usize(cols, "number of quantized columns")?;
        let code_size = to_usize(code_size, "code size")?;
        if (rows, cols) != shape {
            return Err(Error::Format(format!(
                "Quantized matrix has shape {:?}, expected: {:?}",
                (rows, cols),
                shape
            )));
        }

        // There are at most as many subquantizers as columns.
        let max_code_size = rows.checked_mul(cols).ok_or(Error::Overflow)?;
        if code_size > max_code_size {
            return Err(Error::Format(format!(
                "Code size {} is too large for a {} x {} matrix",
                code_size, rows, cols
            )));
        }

        let codes = read_bytes(reader, code_size, "Cannot read quantized embeddings")?;
        let quantizer = ProductQuantizer::read(reader, cols)?;

        if rows.checked_mul(quantizer.n_subquantizers()) != Some(code_size) {
            return Err(Error::Format(format!(
                "Code size {} does not match {} rows of {} codes",
                code_size,
                rows,
                quantizer.n_subquantizers()
            )));
        }
        let codes = Array2::from_shape_vec((rows, quantizer.n_subquantizers()), codes)?;

        let norms = if qnorm {
            let norm_codes = read_bytes(reader, rows, "Cannot read norm codes")?;
            let norm_quantizer = ProductQuantizer::read(reader, 1)?;
            Some((norm_quantizer, Array1::from(norm_codes)))
        } else {
            None
        };

        QuantizedMatrix::new(quantizer, codes, norms)
    }

    /// Write the matrix in the layout read by `QuantizedMatrix::read`.
    pub fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: Write,
    {
        writer
            .write_u8(self.norms.is_some() as u8)
            .map_err(|e| Error::write_error("Cannot write norm quantization flag", e))?;
        writer
            .write_i64::<LittleEndian>(self.codes.nrows() as i64)
            .map_err(|e| Error::write_error("Cannot write number of quantized rows", e))?;
        writer
            .write_i64::<LittleEndian>(self.quantizer.dims() as i64)
            .map_err(|e| Error::write_error("Cannot write number of quantized columns", e))?;
        writer
            .write_i32::<LittleEndian>(self.codes.len() as i32)
            .map_err(|e| Error::write_error("Cannot write code size", e))?;

        for &code in self.codes.iter() {
            writer
                .write_u8(code)
                .map_err(|e| Error::write_error("Cannot write quantized embeddings", e))?;
        }

        self.quantizer.write(writer)?;

        if let Some(ref norms) = self.norms {
            for &code in norms.codes.iter() {
                writer
                    .write_u8(code)
                    .map_err(|e| Error::write_error("Cannot write norm codes", e))?;
            }
            norms.quantizer.write(writer)?;
        }

        Ok(())
    }
}

impl Storage for QuantizedMatrix {
    fn add_row_into(&self, vec: ArrayViewMut1<f32>, idx: usize, scale: f32) {
        let norm = self.norms.as_ref().map(|norms| norms.norm(idx)).unwrap_or(1.);
        self.quantizer
            .add_code(vec, self.codes.row(idx), scale * norm);
    }

    fn shape(&self) -> (usize, usize) {
        (self.codes.nrows(), self.quantizer.dims())
    }
}

/// Quantizable embedding matrix.
pub trait Quantize {
    /// Quantize the embedding matrix.
    ///
    /// This method trains a quantizer for the embedding matrix and
    /// then quantizes the matrix using this quantizer.
    ///
    /// The xorshift PRNG is used for picking the initial quantizer
    /// centroids.
    fn quantize<T>(
        &self,
        n_subquantizers: usize,
        n_subquantizer_bits: u32,
        n_iterations: usize,
        n_attempts: usize,
        normalize: bool,
    ) -> Result<QuantizedMatrix>
    where
        T: TrainPQ<f32>,
    {
        self.quantize_using::<T, _>(
            n_subquantizers,
            n_subquantizer_bits,
            n_iterations,
            n_attempts,
            normalize,
            XorShiftRng::from_entropy(),
        )
    }

    /// Quantize the embedding matrix using the provided RNG.
    ///
    /// If `normalize` is `true`, the quantizer is trained on unit
    /// vectors and the norms are quantized separately with a
    /// one-dimensional quantizer.
    fn quantize_using<T, R>(
        &self,
        n_subquantizers: usize,
        n_subquantizer_bits: u32,
        n_iterations: usize,
        n_attempts: usize,
        normalize: bool,
        rng: R,
    ) -> Result<QuantizedMatrix>
    where
        T: TrainPQ<f32>,
        R: RngCore + SeedableRng + Send;
}

impl Quantize for DenseMatrix {
    fn quantize_using<T, R>(
        &self,
        n_subquantizers: usize,
        n_subquantizer_bits: u32,
        n_iterations: usize,
        n_attempts: usize,
        normalize: bool,
        mut rng: R,
    ) -> Result<QuantizedMatrix>
    where
        T: TrainPQ<f32>,
        R: RngCore + SeedableRng + Send,
    {
        let (rows, cols) = self.shape();

        if n_subquantizer_bits == 0 || n_subquantizer_bits > 8 {
            return Err(Error::Precondition(format!(
                "Subquantizers must use 1 to 8 bits, got: {}",
                n_subquantizer_bits
            )));
        }

        if n_subquantizers == 0 || cols % n_subquantizers != 0 {
            return Err(Error::Precondition(format!(
                "{} columns cannot be split in {} subquantizers",
                cols, n_subquantizers
            )));
        }

        if rows < 1 << n_subquantizer_bits {
            return Err(Error::Precondition(format!(
                "{} rows are too few to train {} centroids",
                rows,
                1 << n_subquantizer_bits
            )));
        }

        let norm_rng = R::seed_from_u64(rng.next_u64());

        let (embeds, norms) = if normalize {
            let mut normalized = self.view().to_owned();
            let norms: Array1<f32> = normalized.outer_iter_mut().map(l2_normalize).collect();
            (CowArray::from(normalized), Some(norms))
        } else {
            (CowArray::from(self.view()), None)
        };

        let pq = T::train_pq_using(
            n_subquantizers,
            n_subquantizer_bits,
            n_iterations,
            n_attempts,
            embeds.view(),
            rng,
        );
        let codes: Array2<u8> = pq.quantize_batch(embeds.view());
        let quantizer = ProductQuantizer::from_pq(&pq)?;

        let norms = match norms {
            Some(norms) => {
                let norms = norms.into_shape((rows, 1))?;
                let norm_pq = T::train_pq_using(
                    1,
                    n_subquantizer_bits,
                    n_iterations,
                    n_attempts,
                    norms.view(),
                    norm_rng,
                );
                let norm_codes: Array2<u8> = norm_pq.quantize_batch(norms.view());
                Some((
                    ProductQuantizer::from_pq(&norm_pq)?,
                    norm_codes.column(0).to_owned(),
                ))
            }
            None => None,
        };

        QuantizedMatrix::new(quantizer, codes, norms)
    }
}
