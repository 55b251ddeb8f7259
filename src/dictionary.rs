//! fastText dictionary.
//!
//! The dictionary maps words and labels to row indices of the input
//! matrix. Words occupy ids `[0, nwords)`, labels follow them. Rows
//! from `nwords` onwards hold the embeddings of hashed character
//! n-grams.

use std::borrow::Cow;
use std::io::{BufRead, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fnv::FnvHashMap;

use crate::args::Args;
use crate::error::{Error, Result};
use crate::subword::{FastTextIndexer, NGrams};
use crate::util::{read_string, to_usize};

/// End-of-sentence marker. It does not get subword units.
pub const EOS: &str = "</s>";

const BOW: char = '<';
const EOW: char = '>';

/// Dictionary entry type.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum EntryType {
    Word = 0,
    Label = 1,
}

impl EntryType {
    fn from_u8(entry_type: u8) -> Result<Self> {
        match entry_type {
            0 => Ok(EntryType::Word),
            1 => Ok(EntryType::Label),
            t => Err(Error::Format(format!("Unknown entry type: {}", t))),
        }
    }
}

/// Dictionary entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    word: String,
    count: u64,
    entry_type: EntryType,
    subwords: Vec<usize>,
}

impl Entry {
    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }
}

/// fastText dictionary.
#[derive(Clone, Debug, PartialEq)]
pub struct Dictionary {
    entries: Vec<Entry>,
    indices: FnvHashMap<String, usize>,
    nwords: usize,
    nlabels: usize,
    ntokens: u64,

    // fastText stores -1 for dictionaries that were never pruned.
    prune_idx_size: i64,
    prune_idx: Vec<(usize, usize)>,
    prune_map: FnvHashMap<usize, usize>,

    min_n: usize,
    max_n: usize,
    indexer: FastTextIndexer,
    label: String,
}

impl Dictionary {
    /// Construct an empty dictionary with the subword settings and
    /// label prefix of `args`.
    pub fn new(args: &Args) -> Self {
        Dictionary {
            entries: Vec::new(),
            indices: FnvHashMap::default(),
            nwords: 0,
            nlabels: 0,
            ntokens: 0,
            prune_idx_size: -1,
            prune_idx: Vec::new(),
            prune_map: FnvHashMap::default(),
            min_n: args.min_n as usize,
            max_n: args.max_n as usize,
            indexer: FastTextIndexer::new(args.bucket),
            label: args.label.clone(),
        }
    }

    /// Read a dictionary block.
    ///
    /// The subword units of every entry are computed with the n-gram
    /// lengths and bucket count of `args`.
    pub fn read<R>(reader: &mut R, args: &Args) -> Result<Self>
    where
        R: BufRead,
    {
        let size = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read dictionary size", e))?;
        let nwords = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of words", e))?;
        let nlabels = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of labels", e))?;
        let ntokens = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read number of tokens", e))?;
        let prune_idx_size = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| Error::read_error("Cannot read pruned vocabulary size", e))?;

        let size = to_usize(size, "dictionary size")?;
        let nwords = to_usize(nwords, "number of words")?;
        let nlabels = to_usize(nlabels, "number of labels")?;
        if nwords.checked_add(nlabels) != Some(size) {
            return Err(Error::Format(format!(
                "Dictionary size {} is not the sum of {} words and {} labels",
                size, nwords, nlabels
            )));
        }

        let mut dict = Dictionary {
            nwords,
            nlabels,
            ntokens: to_u64(ntokens, "number of tokens")?,
            prune_idx_size,
            ..Dictionary::new(args)
        };

        for idx in 0..size {
            let word = read_string(reader, 0, false)?;
            let count = reader
                .read_i64::<LittleEndian>()
                .map_err(|e| Error::read_error("Cannot read word frequency", e))?;
            let entry_type = reader
                .read_u8()
                .map_err(|e| Error::read_error("Cannot read entry type", e))?;
            let entry_type = EntryType::from_u8(entry_type)?;

            let expected_type = if idx < nwords {
                EntryType::Word
            } else {
                EntryType::Label
            };
            if entry_type != expected_type {
                return Err(Error::Format(format!(
                    "Entry {} ('{}') should be a {:?}",
                    idx, word, expected_type
                )));
            }

            dict.indices.insert(word.clone(), idx);
            dict.entries.push(Entry {
                word,
                count: to_u64(count, "word frequency")?,
                entry_type,
                subwords: Vec::new(),
            });
        }

        if dict.indices.len() != size {
            return Err(Error::Format(String::from(
                "Dictionary contains duplicate entries",
            )));
        }

        for _ in 0..prune_idx_size.max(0) {
            let bucket = reader
                .read_i32::<LittleEndian>()
                .map_err(|e| Error::read_error("Cannot read pruned bucket", e))?;
            let remapped = reader
                .read_i32::<LittleEndian>()
                .map_err(|e| Error::read_error("Cannot read remapped bucket", e))?;
            let pair = (
                to_usize(bucket, "pruned bucket")?,
                to_usize(remapped, "remapped bucket")?,
            );
            if pair.1 as i64 >= prune_idx_size {
                return Err(Error::Format(format!(
                    "Bucket {} is remapped to {}, but only {} buckets were retained",
                    pair.0, pair.1, prune_idx_size
                )));
            }
            dict.prune_idx.push(pair);
            dict.prune_map.insert(pair.0, pair.1);
        }

        dict.init_subwords();

        Ok(dict)
    }

    /// Write the dictionary block.
    pub fn write<W>(&self, writer: &mut W) -> Result<()>
    where
        W: Write,
    {
        let sizes = [
            (self.entries.len(), "dictionary size"),
            (self.nwords, "number of words"),
            (self.nlabels, "number of labels"),
        ];
        for &(value, desc) in &sizes {
            writer
                .write_i32::<LittleEndian>(value as i32)
                .map_err(|e| Error::write_error(format!("Cannot write {}", desc), e))?;
        }
        writer
            .write_i64::<LittleEndian>(self.ntokens as i64)
            .map_err(|e| Error::write_error("Cannot write number of tokens", e))?;
        writer
            .write_i64::<LittleEndian>(self.prune_idx_size)
            .map_err(|e| Error::write_error("Cannot write pruned vocabulary size", e))?;

        for entry in &self.entries {
            writer
                .write_all(entry.word.as_bytes())
                .map_err(|e| Error::write_error("Cannot write word", e))?;
            writer
                .write_u8(0)
                .map_err(|e| Error::write_error("Cannot write word terminator", e))?;
            writer
                .write_i64::<LittleEndian>(entry.count as i64)
                .map_err(|e| Error::write_error("Cannot write word frequency", e))?;
            writer
                .write_u8(entry.entry_type as u8)
                .map_err(|e| Error::write_error("Cannot write entry type", e))?;
        }

        for &(bucket, remapped) in &self.prune_idx {
            writer
                .write_i32::<LittleEndian>(bucket as i32)
                .map_err(|e| Error::write_error("Cannot write pruned bucket", e))?;
            writer
                .write_i32::<LittleEndian>(remapped as i32)
                .map_err(|e| Error::write_error("Cannot write remapped bucket", e))?;
        }

        Ok(())
    }

    /// Register an occurrence of `word`.
    ///
    /// Unknown words are appended with count 1, words that start with
    /// the label prefix become labels. Entries added this way only get
    /// their final id and subword units after `threshold` renumbers
    /// the dictionary.
    pub fn add(&mut self, word: &str) {
        self.ntokens += 1;

        match self.indices.get(word) {
            Some(&idx) => self.entries[idx].count += 1,
            None => {
                let entry_type = if word.starts_with(&self.label) {
                    EntryType::Label
                } else {
                    EntryType::Word
                };

                self.indices.insert(word.to_owned(), self.entries.len());
                self.entries.push(Entry {
                    word: word.to_owned(),
                    count: 1,
                    entry_type,
                    subwords: Vec::new(),
                });
            }
        }
    }

    /// Remove words with a count below `t` and labels with a count
    /// below `tl`.
    ///
    /// The remaining entries are renumbered: words first, ordered by
    /// descending count, then labels.
    pub fn threshold(&mut self, t: u64, tl: u64) {
        // Stable sort, entries with equal counts keep their order.
        self.entries.sort_by(|a, b| {
            (a.entry_type as u8)
                .cmp(&(b.entry_type as u8))
                .then_with(|| b.count.cmp(&a.count))
        });

        self.entries.retain(|entry| match entry.entry_type {
            EntryType::Word => entry.count >= t,
            EntryType::Label => entry.count >= tl,
        });
        self.entries.shrink_to_fit();

        self.indices.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            self.indices.insert(entry.word.clone(), idx);
        }

        self.nwords = self
            .entries
            .iter()
            .filter(|entry| entry.entry_type == EntryType::Word)
            .count();
        self.nlabels = self.entries.len() - self.nwords;

        self.init_subwords();
    }

    /// Discard the n-gram bucket pruning.
    ///
    /// Subword units are recomputed by the next `threshold`.
    pub(crate) fn clear_pruning(&mut self) {
        self.prune_idx_size = -1;
        self.prune_idx.clear();
        self.prune_map.clear();
    }

    fn init_subwords(&mut self) {
        for idx in 0..self.entries.len() {
            let mut subwords = vec![idx];
            if self.entries[idx].word != EOS {
                self.push_ngrams(&self.entries[idx].word, &mut subwords);
            }
            self.entries[idx].subwords = subwords;
        }
    }

    fn push_ngrams(&self, word: &str, subwords: &mut Vec<usize>) {
        let bracketed = format!("{}{}{}", BOW, word, EOW);
        for ngram in NGrams::new(&bracketed, self.min_n, self.max_n) {
            if let Some(bucket) = self.indexer.index_ngram(ngram) {
                self.push_bucket(bucket, subwords);
            }
        }
    }

    fn push_bucket(&self, bucket: usize, subwords: &mut Vec<usize>) {
        let bucket = match self.prune_idx_size {
            0 => return,
            size if size > 0 => match self.prune_map.get(&bucket) {
                Some(&remapped) => remapped,
                None => return,
            },
            _ => bucket,
        };

        subwords.push(self.nwords + bucket);
    }

    /// Get the input matrix rows of `word`.
    ///
    /// For a known entry, the list starts with the entry's own id,
    /// followed by the rows of its n-grams. For an unknown word, only
    /// the n-gram rows are returned.
    pub fn subwords(&self, word: &str) -> Cow<'_, [usize]> {
        if let Some(&idx) = self.indices.get(word) {
            return Cow::Borrowed(&self.entries[idx].subwords);
        }

        let mut subwords = Vec::new();
        if word != EOS {
            self.push_ngrams(word, &mut subwords);
        }

        Cow::Owned(subwords)
    }

    /// Get the id of an entry.
    pub fn id(&self, word: &str) -> Option<usize> {
        self.indices.get(word).cloned()
    }

    /// Get the word with id `idx`.
    pub fn word(&self, idx: usize) -> Option<&str> {
        if idx < self.nwords {
            Some(&self.entries[idx].word)
        } else {
            None
        }
    }

    /// Get the `idx`-th label.
    pub fn label(&self, idx: usize) -> Option<&str> {
        if idx < self.nlabels {
            Some(&self.entries[self.nwords + idx].word)
        } else {
            None
        }
    }

    /// Iterate over the words, in id order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries[..self.nwords]
            .iter()
            .map(|entry| entry.word.as_str())
    }

    /// Iterate over the labels, in id order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries[self.nwords..]
            .iter()
            .map(|entry| entry.word.as_str())
    }

    /// Get the counts of all entries of the given type, in id order.
    pub fn counts(&self, entry_type: EntryType) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|entry| entry.entry_type == entry_type)
            .map(Entry::count)
            .collect()
    }

    /// Get all entries, in id order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn nwords(&self) -> usize {
        self.nwords
    }

    pub fn nlabels(&self) -> usize {
        self.nlabels
    }

    pub fn ntokens(&self) -> u64 {
        self.ntokens
    }

    /// Number of entries, including labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the n-gram buckets were pruned.
    pub fn is_pruned(&self) -> bool {
        self.prune_idx_size >= 0
    }

    /// Number of n-gram buckets retained by pruning.
    ///
    /// Returns `None` if the dictionary was not pruned.
    pub fn prune_idx_size(&self) -> Option<usize> {
        if self.prune_idx_size >= 0 {
            Some(self.prune_idx_size as usize)
        } else {
            None
        }
    }
}

fn to_u64(n: i64, desc: &str) -> Result<u64> {
    if n < 0 {
        return Err(Error::Format(format!("Invalid {}: {}", desc, n)));
    }

    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::{LittleEndian, WriteBytesExt};

    use super::{Dictionary, EntryType, EOS};
    use crate::args::Args;
    use crate::error::Error;
    use crate::subword::fasttext_hash;

    // Verified against fastText output.
    const DANIEL_NGRAMS: &[usize] = &[
        69886, 84537, 338340, 441697, 448390, 468430, 504093, 573175, 749365, 804851, 811506,
        991985, 1022467, 1105725, 1249224, 1418443, 1493412, 1880616,
    ];

    fn test_dictionary() -> Dictionary {
        let mut dict = Dictionary::new(&Args::default());
        for &word in &[
            "de", "het", "de", "__label__a", "een", "de", "het", "__label__b", "__label__a",
        ] {
            dict.add(word);
        }
        dict.threshold(1, 1);
        dict
    }

    fn pruned_dictionary_data(args: &Args, prune_idx: &[(i32, i32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.write_i32::<LittleEndian>(1).unwrap();
        data.write_i32::<LittleEndian>(1).unwrap();
        data.write_i32::<LittleEndian>(0).unwrap();
        data.write_i64::<LittleEndian>(10).unwrap();
        data.write_i64::<LittleEndian>(prune_idx.len() as i64).unwrap();
        data.extend_from_slice(b"ab\0");
        data.write_i64::<LittleEndian>(10).unwrap();
        data.write_u8(0).unwrap();
        for &(bucket, remapped) in prune_idx {
            data.write_i32::<LittleEndian>(bucket).unwrap();
            data.write_i32::<LittleEndian>(remapped).unwrap();
        }

        // Sanity check of the fixture.
        assert!(Dictionary::read(&mut Cursor::new(&data), args).is_ok());

        data
    }

    #[test]
    fn oov_subwords_match_fasttext() {
        let dict = Dictionary::new(&Args::default());
        let mut subwords = dict.subwords("Daniël").into_owned();
        subwords.sort_unstable();
        assert_eq!(subwords, DANIEL_NGRAMS);
    }

    #[test]
    fn known_word_subwords_start_with_id() {
        let mut dict = Dictionary::new(&Args::default());
        dict.add("Daniël");
        dict.threshold(1, 0);

        let subwords = dict.subwords("Daniël");
        assert_eq!(subwords[0], 0);
        let mut ngrams = subwords[1..].to_vec();
        ngrams.sort_unstable();
        let check: Vec<_> = DANIEL_NGRAMS.iter().map(|&idx| idx + 1).collect();
        assert_eq!(ngrams, check);
    }

    #[test]
    fn eos_has_no_ngrams() {
        let mut dict = Dictionary::new(&Args::default());
        dict.add(EOS);
        dict.threshold(1, 0);
        assert_eq!(&*dict.subwords(EOS), &[0]);
    }

    #[test]
    fn threshold_orders_and_filters() {
        let dict = test_dictionary();
        assert_eq!(dict.nwords(), 3);
        assert_eq!(dict.nlabels(), 2);
        assert_eq!(dict.ntokens(), 9);
        assert_eq!(dict.words().collect::<Vec<_>>(), vec!["de", "het", "een"]);
        assert_eq!(
            dict.labels().collect::<Vec<_>>(),
            vec!["__label__a", "__label__b"]
        );
        assert_eq!(dict.counts(EntryType::Word), vec![3, 2, 1]);
        assert_eq!(dict.counts(EntryType::Label), vec![2, 1]);
        assert_eq!(dict.id("__label__b"), Some(4));
        assert_eq!(dict.label(1), Some("__label__b"));
        assert_eq!(dict.word(3), None);

        let mut dict = dict;
        dict.threshold(2, 2);
        assert_eq!(dict.words().collect::<Vec<_>>(), vec!["de", "het"]);
        assert_eq!(dict.labels().collect::<Vec<_>>(), vec!["__label__a"]);
        assert_eq!(dict.id("een"), None);
        assert_eq!(dict.subwords("__label__a")[0], 2);
    }

    #[test]
    fn dictionary_write_read_roundtrip() {
        let args = Args::default();
        let check = test_dictionary();
        let mut cursor = Cursor::new(Vec::new());
        check.write(&mut cursor).unwrap();
        cursor.set_position(0);
        let dict = Dictionary::read(&mut cursor, &args).unwrap();
        assert_eq!(dict, check);
        assert!(!dict.is_pruned());
    }

    #[test]
    fn pruned_buckets_are_remapped() {
        let args = Args {
            bucket: 100,
            min_n: 3,
            max_n: 3,
            ..Args::default()
        };
        let bucket = (fasttext_hash("<ab") % 100) as i32;
        let data = pruned_dictionary_data(&args, &[(bucket, 0)]);

        let dict = Dictionary::read(&mut Cursor::new(&data), &args).unwrap();
        assert!(dict.is_pruned());
        assert_eq!(dict.prune_idx_size(), Some(1));
        assert_eq!(&*dict.subwords("ab"), &[0, 1]);
        assert_eq!(&*dict.subwords("abc"), &[1]);

        let mut cursor = Cursor::new(Vec::new());
        dict.write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner(), data);
    }

    #[test]
    fn fully_pruned_buckets_are_dropped() {
        let args = Args::default();
        let data = pruned_dictionary_data(&args, &[]);
        let dict = Dictionary::read(&mut Cursor::new(&data), &args).unwrap();
        assert!(dict.is_pruned());
        assert_eq!(&*dict.subwords("ab"), &[0]);
        assert!(dict.subwords("xyz").is_empty());
    }

    #[test]
    fn misplaced_label_is_rejected() {
        let mut data = Vec::new();
        data.write_i32::<LittleEndian>(1).unwrap();
        data.write_i32::<LittleEndian>(1).unwrap();
        data.write_i32::<LittleEndian>(0).unwrap();
        data.write_i64::<LittleEndian>(1).unwrap();
        data.write_i64::<LittleEndian>(-1).unwrap();
        data.extend_from_slice(b"__label__x\0");
        data.write_i64::<LittleEndian>(1).unwrap();
        data.write_u8(1).unwrap();

        assert!(matches!(
            Dictionary::read(&mut Cursor::new(data), &Args::default()),
            Err(Error::Format(_))
        ));
    }
}
