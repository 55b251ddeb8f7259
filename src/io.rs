//! Reading and writing fastText model files.
//!
//! A model file consists of a signature (magic number and format
//! version), the model configuration, the dictionary and the input
//! matrix. The input matrix is preceded by a flag that indicates
//! whether the matrix is quantized.

use std::io::{BufRead, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::args::{Args, ModelKind};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::fasttext::{check_pruned_storage, input_shape, FastText};
use crate::storage::{Storage, StorageWrap};

/// fastText file format magic number.
pub const FASTTEXT_FILEFORMAT_MAGIC: i32 = 793_712_314;

/// The most recent file format version, which is also used for writing.
pub const FASTTEXT_VERSION: i32 = 12;

/// Compatibility fixups for older file format versions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Fixup {
    /// Supervised models did not use character n-grams.
    NoSupervisedSubwords,
}

impl Fixup {
    fn apply(self, args: &mut Args) {
        match self {
            Fixup::NoSupervisedSubwords => {
                if args.model == ModelKind::Supervised {
                    args.max_n = 0;
                }
            }
        }
    }
}

const FIXUPS: &[(i32, &[Fixup])] = &[(11, &[Fixup::NoSupervisedSubwords])];

fn apply_fixups(version: i32, args: &mut Args) {
    for (_, fixups) in FIXUPS.iter().filter(|(v, _)| *v == version) {
        for &fixup in fixups.iter() {
            debug!("Applying {:?} for version {}", fixup, version);
            fixup.apply(args);
        }
    }
}

/// Read a model in the fastText format.
pub trait ReadFastText
where
    Self: Sized,
{
    /// Read a model in the fastText format.
    fn read_fasttext(reader: &mut impl BufRead) -> Result<Self>;
}

/// Write a model in the fastText format.
pub trait WriteFastText {
    /// Write a model in the fastText format.
    fn write_fasttext(&self, writer: &mut impl Write) -> Result<()>;
}

impl ReadFastText for FastText {
    fn read_fasttext(reader: &mut impl BufRead) -> Result<Self> {
        let version = read_signature(reader)?;
        debug!("Read signature, format version {}", version);

        let mut args = Args::read(reader)?;
        apply_fixups(version, &mut args);
        debug!(
            "Read configuration: {} dimensions, {} buckets, n-grams {}-{}",
            args.dim, args.bucket, args.min_n, args.max_n
        );

        let dict = Dictionary::read(reader, &args)?;
        debug!(
            "Read dictionary: {} words, {} labels",
            dict.nwords(),
            dict.nlabels()
        );

        let quantized = reader
            .read_u8()
            .map_err(|e| Error::read_error("Cannot read quantization flag", e))?
            != 0;
        check_pruned_storage(&dict, quantized)?;
        let input = StorageWrap::read(reader, quantized, input_shape(&args, &dict)?)?;
        let (rows, cols) = input.shape();
        debug!(
            "Read {} input matrix: {} x {}",
            if quantized { "quantized" } else { "dense" },
            rows,
            cols
        );

        FastText::from_parts(args, dict, input, version)
    }
}

impl WriteFastText for FastText {
    fn write_fasttext(&self, writer: &mut impl Write) -> Result<()> {
        write_signature(writer)?;
        self.args().write(writer)?;
        debug!("Wrote signature and configuration");

        self.dictionary().write(writer)?;
        debug!("Wrote dictionary");

        let input = self.model().input();
        writer
            .write_u8(input.is_quantized() as u8)
            .map_err(|e| Error::write_error("Cannot write quantization flag", e))?;
        input.write(writer)?;
        debug!("Wrote input matrix");

        Ok(())
    }
}

/// Read and check the signature, returning the format version.
fn read_signature(reader: &mut impl BufRead) -> Result<i32> {
    let magic = reader
        .read_i32::<LittleEndian>()
        .map_err(|e| Error::read_error("Cannot read fastText magic", e))?;
    if magic != FASTTEXT_FILEFORMAT_MAGIC {
        return Err(Error::Format(format!(
            "Expected {} as magic, got: {}",
            FASTTEXT_FILEFORMAT_MAGIC, magic
        )));
    }

    let version = reader
        .read_i32::<LittleEndian>()
        .map_err(|e| Error::read_error("Cannot read fastText version", e))?;
    if version > FASTTEXT_VERSION {
        return Err(Error::Format(format!(
            "Expected version {} or older, got: {}",
            FASTTEXT_VERSION, version
        )));
    }

    Ok(version)
}

fn write_signature(writer: &mut impl Write) -> Result<()> {
    writer
        .write_i32::<LittleEndian>(FASTTEXT_FILEFORMAT_MAGIC)
        .map_err(|e| Error::write_error("Cannot write fastText magic", e))?;
    writer
        .write_i32::<LittleEndian>(FASTTEXT_VERSION)
        .map_err(|e| Error::write_error("Cannot write fastText version", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_fixups, FASTTEXT_VERSION};
    use crate::args::{Args, ModelKind};

    #[test]
    fn old_supervised_models_lose_subwords() {
        let mut args = Args {
            model: ModelKind::Supervised,
            ..Args::default()
        };
        apply_fixups(11, &mut args);
        assert_eq!(args.max_n, 0);
        assert_eq!(args.min_n, 3);
    }

    #[test]
    fn fixups_are_version_gated() {
        let mut args = Args {
            model: ModelKind::Supervised,
            ..Args::default()
        };
        apply_fixups(FASTTEXT_VERSION, &mut args);
        assert_eq!(args.max_n, 6);

        let mut args = Args::default();
        apply_fixups(11, &mut args);
        assert_eq!(args.max_n, 6);
    }
}
