//! Prelude exports the most commonly-used types and traits.

pub use crate::args::{Args, Loss, ModelKind};

pub use crate::dictionary::{Dictionary, EntryType};

pub use crate::error::{Error, Result};

pub use crate::fasttext::FastText;

pub use crate::io::{ReadFastText, WriteFastText};

pub use crate::model::{Model, TieBreak};

pub use crate::storage::{DenseMatrix, Quantize, QuantizedMatrix, Storage, StorageWrap};
