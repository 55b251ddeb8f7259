//! Model hyperparameters.
//!
//! The `Args` block is the first part of a fastText model after the
//! signature. Only the fields that fastText serializes are read and
//! written; `output`, `label` and `seed` are runtime settings.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use toml::Value;

use crate::error::{Error, Result};

/// fastText model configuration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Args {
    pub dim: u32,
    pub ws: u32,
    pub epoch: u32,
    pub min_count: u32,
    pub neg: u32,
    pub word_ngrams: u32,
    pub loss: Loss,
    pub model: ModelKind,
    pub bucket: u32,
    pub min_n: u32,
    pub max_n: u32,
    pub lr_update_rate: u32,
    pub t: f64,

    /// Output prefix used by the `save_*` methods.
    #[serde(skip)]
    pub output: String,

    /// Prefix that marks labels in the dictionary.
    #[serde(skip)]
    pub label: String,

    /// Seed for the random number generators.
    #[serde(skip)]
    pub seed: u64,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            dim: 100,
            ws: 5,
            epoch: 5,
            min_count: 5,
            neg: 5,
            word_ngrams: 1,
            loss: Loss::NegativeSampling,
            model: ModelKind::SkipGram,
            bucket: 2_000_000,
            min_n: 3,
            max_n: 6,
            lr_update_rate: 100,
            t: 1e-4,
            output: String::new(),
            label: String::from("__label__"),
            seed: 0,
        }
    }
}

impl Args {
    /// Read the configuration block of a model.
    pub fn read<R>(reader: &mut R) -> Result<Args>
    where
        R: Read,
    {
        let dim = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of dimensions", e))?;
        let ws = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read window size", e))?;
        let epoch = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of epochs", e))?;
        let min_count = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read minimum count", e))?;
        let neg = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read negative samples", e))?;
        let word_ngrams = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read word n-gram length", e))?;
        let loss = Loss::read(reader)?;
        let model = ModelKind::read(reader)?;
        let bucket = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of buckets", e))?;
        let min_n = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read minimum subword length", e))?;
        let max_n = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read maximum subword length", e))?;
        let lr_update_rate = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read LR update rate", e))?;
        let t = reader
            .read_f64::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read sampling threshold", e))?;

        if bucket > i32::MAX as u32 {
            return Err(Error::Format(format!(
                "Number of buckets too large: {}",
                bucket
            )));
        }

        Ok(Args {
            dim,
            ws,
            epoch,
            min_count,
            neg,
            word_ngrams,
            loss,
            model,
            bucket,
            min_n,
            max_n,
            lr_update_rate,
            t,
            ..Args::default()
        })
    }

    /// Write the configuration block of a model.
    pub fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: Write,
    {
        let fields = [
            (self.dim, "number of dimensions"),
            (self.ws, "window size"),
            (self.epoch, "number of epochs"),
            (self.min_count, "minimum count"),
            (self.neg, "negative samples"),
            (self.word_ngrams, "word n-gram length"),
            (self.loss as u32, "loss type"),
            (self.model as u32, "model type"),
            (self.bucket, "number of buckets"),
            (self.min_n, "minimum subword length"),
            (self.max_n, "maximum subword length"),
            (self.lr_update_rate, "LR update rate"),
        ];

        for &(value, desc) in &fields {
            writer
                .write_u32::<LittleEndian>(value)
                .map_err(|e| Error::write_error(format!("Cannot write {}", desc), e))?;
        }

        writer
            .write_f64::<LittleEndian>(self.t)
            .map_err(|e| Error::write_error("Cannot write sampling threshold", e))?;

        Ok(())
    }

    /// Number of vector components.
    pub fn dims(&self) -> usize {
        self.dim as usize
    }

    /// Render the serialized fields as TOML metadata.
    pub fn to_toml(&self) -> Result<Value> {
        Value::try_from(self).map_err(|e| {
            Error::Format(format!("Cannot serialize model metadata to TOML: {}", e))
        })
    }
}

/// fastText loss type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[repr(u32)]
pub enum Loss {
    HierarchicalSoftmax = 1,
    NegativeSampling = 2,
    Softmax = 3,
}

impl Loss {
    fn read<R>(reader: &mut R) -> Result<Loss>
    where
        R: Read,
    {
        let loss = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read loss type", e))?;

        use self::Loss::*;
        match loss {
            1 => Ok(HierarchicalSoftmax),
            2 => Ok(NegativeSampling),
            3 => Ok(Softmax),
            l => Err(Error::Format(format!("Unknown loss: {}", l))),
        }
    }
}

/// fastText model type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[repr(u32)]
pub enum ModelKind {
    Cbow = 1,
    SkipGram = 2,
    Supervised = 3,
}

impl ModelKind {
    fn read<R>(reader: &mut R) -> Result<ModelKind>
    where
        R: Read,
    {
        let model = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read model type", e))?;

        use self::ModelKind::*;
        match model {
            1 => Ok(Cbow),
            2 => Ok(SkipGram),
            3 => Ok(Supervised),
            m => Err(Error::Format(format!("Unknown model: {}", m))),
        }
    }
}
