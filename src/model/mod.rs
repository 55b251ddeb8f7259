//! Model: input matrix aggregation and output coding.

use ndarray::ArrayViewMut1;

use crate::args::Loss;
use crate::error::{Error, Result};
use crate::storage::{Storage, StorageWrap};

mod negatives;
pub use self::negatives::{NegativeTable, NEGATIVE_TABLE_SIZE};

mod tables;
pub use self::tables::{LookupTables, LOG_TABLE_SIZE, MAX_SIGMOID, SIGMOID_TABLE_SIZE};

mod tree;
pub use self::tree::{Node, SoftmaxTree, TieBreak};

/// fastText model.
///
/// The model owns the input matrix. The output coding structures (the
/// hierarchical softmax tree or the negative sampling table) are only
/// present after `set_target_counts` or the more specific builders
/// were called.
#[derive(Clone, Debug)]
pub struct Model {
    input: StorageWrap,
    tables: LookupTables,
    tree: Option<SoftmaxTree>,
    negatives: Option<NegativeTable>,
    seed: u64,
    loss: f32,
    n_examples: u64,
}

impl Model {
    /// Construct a model for the given input matrix.
    ///
    /// `seed` is used to shuffle the negative sampling table.
    pub fn new(input: StorageWrap, seed: u64) -> Self {
        Model {
            input,
            tables: LookupTables::new(),
            tree: None,
            negatives: None,
            seed,
            loss: 0.,
            n_examples: 1,
        }
    }

    pub fn input(&self) -> &StorageWrap {
        &self.input
    }

    /// Replace the input matrix.
    pub fn set_input(&mut self, input: StorageWrap) {
        self.input = input;
    }

    /// Number of embedding dimensions.
    pub fn dims(&self) -> usize {
        self.input.shape().1
    }

    pub fn is_quantized(&self) -> bool {
        self.input.is_quantized()
    }

    /// Compute the average of the input rows `ids` into `hidden`.
    pub fn compute_hidden(&self, ids: &[usize], mut hidden: ArrayViewMut1<f32>) -> Result<()> {
        let (rows, dims) = self.input.shape();

        if hidden.len() != dims {
            return Err(Error::Precondition(format!(
                "Hidden vector has length {}, model has {} dimensions",
                hidden.len(),
                dims
            )));
        }

        if ids.is_empty() {
            return Err(Error::Precondition(String::from(
                "Cannot compute a hidden vector without input ids",
            )));
        }

        if let Some(&id) = ids.iter().find(|&&id| id >= rows) {
            return Err(Error::Precondition(format!(
                "Input id {} is out of bounds for a matrix with {} rows",
                id, rows
            )));
        }

        hidden.fill(0.);
        for &id in ids {
            self.input.add_row_into(hidden.view_mut(), id, 1.);
        }
        hidden *= 1. / ids.len() as f32;

        Ok(())
    }

    /// Build the output coding for the given loss.
    ///
    /// Hierarchical softmax builds the softmax tree, negative sampling
    /// builds the negative sampling table. Softmax needs neither.
    pub fn set_target_counts(&mut self, counts: &[u64], loss: Loss) -> Result<()> {
        match loss {
            Loss::HierarchicalSoftmax => self.build_tree(counts, TieBreak::default()),
            Loss::NegativeSampling => self.init_negatives(counts),
            Loss::Softmax => Ok(()),
        }
    }

    /// Build the hierarchical softmax tree.
    pub fn build_tree(&mut self, counts: &[u64], tie_break: TieBreak) -> Result<()> {
        self.tree = Some(SoftmaxTree::new(counts, tie_break)?);
        Ok(())
    }

    /// Build the negative sampling table.
    pub fn init_negatives(&mut self, counts: &[u64]) -> Result<()> {
        self.negatives = Some(NegativeTable::new(counts, self.seed)?);
        Ok(())
    }

    /// Draw a negative that differs from `target`.
    pub fn negative(&mut self, target: usize) -> Result<usize> {
        match self.negatives.as_mut() {
            Some(negatives) => Ok(negatives.negative(target)),
            None => Err(Error::Precondition(String::from(
                "Negative sampling table was not built",
            ))),
        }
    }

    pub fn tree(&self) -> Option<&SoftmaxTree> {
        self.tree.as_ref()
    }

    pub fn negatives(&self) -> Option<&NegativeTable> {
        self.negatives.as_ref()
    }

    pub fn sigmoid(&self, x: f32) -> f32 {
        self.tables.sigmoid(x)
    }

    pub fn log(&self, x: f32) -> f32 {
        self.tables.log(x)
    }

    /// Average loss per example.
    ///
    /// Always zero for a loaded model, since the model is not trained.
    pub fn loss(&self) -> f32 {
        self.loss / self.n_examples as f32
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    use super::Model;
    use crate::args::Loss;
    use crate::error::Error;
    use crate::storage::DenseMatrix;

    fn test_model() -> Model {
        let input = DenseMatrix::new(Array2::from_shape_fn((4, 3), |(r, c)| (r * 3 + c) as f32));
        Model::new(input.into(), 42)
    }

    #[test]
    fn compute_hidden_averages_rows() {
        let model = test_model();
        let mut hidden = Array1::from(vec![9f32; 3]);
        model.compute_hidden(&[0, 2, 3], hidden.view_mut()).unwrap();
        for (&v, &check) in hidden.iter().zip(&[5f32, 6., 7.]) {
            assert_abs_diff_eq!(v, check, epsilon = 1e-6);
        }
    }

    #[test]
    fn compute_hidden_checks_preconditions() {
        let model = test_model();
        let mut hidden = Array1::zeros(3);
        assert!(matches!(
            model.compute_hidden(&[], hidden.view_mut()),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            model.compute_hidden(&[4], hidden.view_mut()),
            Err(Error::Precondition(_))
        ));

        let mut short = Array1::zeros(2);
        assert!(matches!(
            model.compute_hidden(&[0], short.view_mut()),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn target_counts_follow_loss() {
        let mut model = test_model();
        model.set_target_counts(&[3, 2, 1], Loss::Softmax).unwrap();
        assert!(model.tree().is_none());
        assert!(model.negatives().is_none());
        assert!(model.negative(0).is_err());

        model
            .set_target_counts(&[3, 2, 1], Loss::HierarchicalSoftmax)
            .unwrap();
        assert_eq!(model.tree().unwrap().n_leaves(), 3);

        model
            .set_target_counts(&[3, 2, 1], Loss::NegativeSampling)
            .unwrap();
        for _ in 0..100 {
            assert_ne!(model.negative(2).unwrap(), 2);
        }
    }

    #[test]
    fn loaded_model_has_no_loss() {
        let model = test_model();
        assert_eq!(model.loss(), 0.);
        assert_eq!(model.dims(), 3);
        assert!(!model.is_quantized());
        assert_eq!(model.sigmoid(0.), 0.5);
    }
}
