use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array1;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use reductive::pq::PQ;
use tracing::{info, warn};

use crate::args::{Args, ModelKind};
use crate::dictionary::{Dictionary, EntryType};
use crate::error::{Error, Result};
use crate::io::{ReadFastText, WriteFastText, FASTTEXT_VERSION};
use crate::model::Model;
use crate::storage::{DenseMatrix, Quantize, Storage, StorageWrap};
use crate::text;

/// A loaded fastText model.
///
/// `FastText` combines the model configuration, the dictionary and the
/// model that owns the input matrix. Word vectors are the average of
/// the input rows of a word and its character n-grams.
#[derive(Clone, Debug)]
pub struct FastText {
    args: Args,
    dict: Dictionary,
    model: Model,
    version: i32,
}

impl FastText {
    /// Construct a model from its parts.
    ///
    /// The shape of the input matrix must agree with the configuration
    /// and the dictionary. A pruned dictionary requires a quantized
    /// input matrix.
    pub fn new(args: Args, dict: Dictionary, input: StorageWrap) -> Result<Self> {
        Self::from_parts(args, dict, input, FASTTEXT_VERSION)
    }

    pub(crate) fn from_parts(
        args: Args,
        dict: Dictionary,
        input: StorageWrap,
        version: i32,
    ) -> Result<Self> {
        check_pruned_storage(&dict, input.is_quantized())?;

        let expected_shape = input_shape(&args, &dict)?;
        if input.shape() != expected_shape {
            return Err(Error::Format(format!(
                "Input matrix has shape {:?}, expected: {:?}",
                input.shape(),
                expected_shape
            )));
        }

        let model = Model::new(input, args.seed);

        Ok(FastText {
            args,
            dict,
            model,
            version,
        })
    }

    /// Load a model from a file.
    pub fn load_model(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| Error::open_error(path, e))?;
        let mut reader = BufReader::new(f);
        Self::read_fasttext(&mut reader)
    }

    /// Save the model.
    ///
    /// The model is written to the output prefix with the `.ftz`
    /// extension for quantized models and `.bin` otherwise. Returns
    /// the path of the model file.
    pub fn save_model(&self) -> Result<PathBuf> {
        let extension = if self.is_quantized() { "ftz" } else { "bin" };
        let path = self.output_path(extension);
        self.write_file(&path, |writer| self.write_fasttext(writer))?;
        Ok(path)
    }

    /// Get the vector of a word.
    ///
    /// The vector is the average of the input rows of the word's
    /// subword units. A word without subword units gets the zero
    /// vector.
    pub fn word_vector(&self, word: &str) -> Result<Array1<f32>> {
        let mut vector = Array1::zeros(self.dims());
        let subwords = self.dict.subwords(word);
        if !subwords.is_empty() {
            self.model.compute_hidden(&subwords, vector.view_mut())?;
        }

        Ok(vector)
    }

    /// Store the unit vectors of all words in `matrix`.
    ///
    /// Row `i` is the vector of word `i`. Words with a zero vector get
    /// a zero row.
    pub fn precompute_word_vectors(&self, matrix: &mut DenseMatrix) -> Result<()> {
        let expected_shape = (self.dict.nwords(), self.dims());
        if matrix.shape() != expected_shape {
            return Err(Error::Precondition(format!(
                "Word vector matrix has shape {:?}, expected: {:?}",
                matrix.shape(),
                expected_shape
            )));
        }

        info!("Precomputing {} word vectors", self.dict.nwords());

        matrix.zero();
        for (idx, word) in self.dict.words().enumerate() {
            let vector = self.word_vector(word)?;
            let norm = vector.dot(&vector).sqrt();
            if norm > 0. {
                matrix.add_to_row(vector.view(), idx, 1. / norm);
            }
        }

        Ok(())
    }

    /// Write the vectors of all words in the text format.
    pub fn write_vectors(&self, writer: &mut impl Write) -> Result<()> {
        text::write_header(writer, self.dict.nwords(), self.dims())?;
        for word in self.dict.words() {
            text::write_vector(writer, word, self.word_vector(word)?.view())?;
        }

        Ok(())
    }

    /// Save the vectors of all words to the output prefix with the
    /// `.vec` extension.
    pub fn save_vectors(&self) -> Result<PathBuf> {
        let path = self.output_path("vec");
        self.write_file(&path, |writer| self.write_vectors(writer))?;
        Ok(path)
    }

    /// Write the output vectors in the text format.
    ///
    /// Supervised models have one output per label, other models one
    /// output per word. Model files do not contain the output matrix,
    /// so all output vectors are zero.
    ///
    /// The outputs of quantized models cannot be written, in that case
    /// nothing is written and `false` is returned.
    pub fn write_output(&self, writer: &mut impl Write) -> Result<bool> {
        if self.is_quantized() {
            warn!("Output vectors of quantized models are not supported");
            return Ok(false);
        }

        let outputs: Vec<&str> = if self.args.model == ModelKind::Supervised {
            self.dict.labels().collect()
        } else {
            self.dict.words().collect()
        };

        let zeros = Array1::zeros(self.dims());
        text::write_header(writer, outputs.len(), self.dims())?;
        for output in outputs {
            text::write_vector(writer, output, zeros.view())?;
        }

        Ok(true)
    }

    /// Save the output vectors to the output prefix with the `.output`
    /// extension.
    ///
    /// Returns `false` without creating a file for quantized models.
    pub fn save_output(&self) -> Result<bool> {
        if self.is_quantized() {
            warn!("Output vectors of quantized models are not supported");
            return Ok(false);
        }

        let path = self.output_path("output");
        let mut written = false;
        self.write_file(&path, |writer| {
            written = self.write_output(writer)?;
            Ok(())
        })?;

        Ok(written)
    }

    /// Read pretrained vectors in the text format.
    ///
    /// The words of the vectors are added to the dictionary, which is
    /// then thresholded. The input matrix is replaced by a dense matrix
    /// that is initialized uniformly in *[-1/dim, 1/dim)*. The rows of
    /// words that are in the dictionary are set to the pretrained
    /// vectors.
    pub fn read_vectors(&mut self, reader: &mut impl BufRead) -> Result<()> {
        let (count, dims) = text::read_header(reader)?;
        if dims != self.args.dims() {
            return Err(Error::DimensionMismatch {
                expected: self.args.dims(),
                got: dims,
            });
        }
        if dims == 0 {
            return Err(Error::Precondition(String::from(
                "Cannot read vectors into a model without dimensions",
            )));
        }

        let (words, vectors) = text::read_vectors(reader, count, dims)?;
        info!("Read {} pretrained vectors", words.len());

        // The model is only updated once the new input matrix is built.
        let mut dict = self.dict.clone();
        if dict.is_pruned() {
            warn!("Pretrained vectors replace pruned n-gram buckets");
            dict.clear_pruning();
        }
        for word in &words {
            dict.add(word);
        }
        dict.threshold(1, 0);

        let mut rng = XorShiftRng::seed_from_u64(self.args.seed);
        let (rows, cols) = input_shape(&self.args, &dict)?;
        let mut input = DenseMatrix::uniform(rows, cols, 1. / dims as f32, &mut rng)?;

        let nwords = dict.nwords();
        for (word, vector) in words.iter().zip(vectors.outer_iter()) {
            // Words that were thresholded away are skipped.
            if let Some(idx) = dict.id(word).filter(|&idx| idx < nwords) {
                input.view_mut().row_mut(idx).assign(&vector);
            }
        }

        self.dict = dict;
        self.model.set_input(input.into());

        Ok(())
    }

    /// Load pretrained vectors from a file in the text format.
    ///
    /// See `read_vectors`.
    pub fn load_vectors(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| Error::open_error(path, e))?;
        self.read_vectors(&mut BufReader::new(f))
    }

    /// Write the vector of every whitespace-separated token of `reader`.
    ///
    /// Invalid UTF-8 sequences are replaced by U+FFFD.
    pub fn write_word_vectors(
        &self,
        mut reader: impl BufRead,
        writer: &mut impl Write,
    ) -> Result<()> {
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| Error::read_error("Cannot read line", e))?;
            if n == 0 {
                return Ok(());
            }

            for word in String::from_utf8_lossy(&line).split_whitespace() {
                text::write_vector(writer, word, self.word_vector(word)?.view())?;
            }
        }
    }

    /// Quantize the input matrix.
    ///
    /// The input matrix is replaced by a product-quantized matrix with
    /// `n_subquantizers` subquantizers of `n_subquantizer_bits` bits.
    /// If `normalize` is `true`, vector norms are quantized separately.
    pub fn quantize(
        &mut self,
        n_subquantizers: usize,
        n_subquantizer_bits: u32,
        n_iterations: usize,
        n_attempts: usize,
        normalize: bool,
    ) -> Result<()> {
        let dense = match self.model.input() {
            StorageWrap::Dense(dense) => dense,
            StorageWrap::Quantized(_) => {
                return Err(Error::Precondition(String::from(
                    "Input matrix is already quantized",
                )))
            }
        };

        info!(
            "Quantizing {} x {} matrix using {} subquantizers of {} bits",
            dense.shape().0,
            dense.shape().1,
            n_subquantizers,
            n_subquantizer_bits
        );

        let quantized = dense.quantize_using::<PQ<f32>, _>(
            n_subquantizers,
            n_subquantizer_bits,
            n_iterations,
            n_attempts,
            normalize,
            XorShiftRng::seed_from_u64(self.args.seed),
        )?;

        self.model.set_input(quantized.into());

        Ok(())
    }

    /// Build the output coding of the model.
    ///
    /// Counts are taken from the labels of supervised models and from
    /// the words of other models.
    pub fn init_output_coding(&mut self) -> Result<()> {
        let entry_type = if self.args.model == ModelKind::Supervised {
            EntryType::Label
        } else {
            EntryType::Word
        };

        let counts = self.dict.counts(entry_type);
        self.model.set_target_counts(&counts, self.args.loss)
    }

    /// Set the output prefix used by the `save_*` methods.
    pub fn set_output(&mut self, output: impl Into<String>) {
        self.args.output = output.into();
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable access to the model, e.g. to draw negatives.
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn dims(&self) -> usize {
        self.args.dims()
    }

    pub fn is_quantized(&self) -> bool {
        self.model.is_quantized()
    }

    /// File format version of the file that the model was read from.
    pub fn version(&self) -> i32 {
        self.version
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.args.output, extension))
    }

    fn write_file<F>(&self, path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let f = File::create(path).map_err(|e| Error::open_error(path, e))?;
        let mut writer = BufWriter::new(f);
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|e| Error::write_error(format!("Cannot write {}", path.display()), e))
    }
}

/// Shape of the input matrix of a model with `args` and `dict`.
///
/// The matrix has a row for every word, followed by a row for every
/// (retained) n-gram bucket.
pub(crate) fn input_shape(args: &Args, dict: &Dictionary) -> Result<(usize, usize)> {
    let n_buckets = dict.prune_idx_size().unwrap_or(args.bucket as usize);
    let rows = dict.nwords().checked_add(n_buckets).ok_or(Error::Overflow)?;
    Ok((rows, args.dims()))
}

/// Check that a pruned dictionary is paired with a quantized matrix.
pub(crate) fn check_pruned_storage(dict: &Dictionary, quantized: bool) -> Result<()> {
    if !quantized && dict.is_pruned() {
        return Err(Error::Format(String::from(
            "Pruned dictionaries can only be used with quantized input matrices",
        )));
    }

    Ok(())
}
