//! Reader, writer and vector lookup for fastText models.
//!
//! This crate reads fastText model files (`.bin` and quantized `.ftz`),
//! computes word vectors from the input matrix and the hashed
//! character n-grams of words, and writes models and vectors back.
//!
//! ```no_run
//! use ftvec::prelude::*;
//!
//! let model = FastText::load_model("model.bin").unwrap();
//! let vector = model.word_vector("Berlin").unwrap();
//! assert_eq!(vector.len(), model.dims());
//! ```

pub mod args;

pub mod dictionary;

pub mod error;

pub mod fasttext;

pub mod io;

pub mod model;

pub mod prelude;

pub mod storage;

pub mod subword;

pub(crate) mod text;

pub(crate) mod util;
