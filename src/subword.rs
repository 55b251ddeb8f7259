//! fastText subword units.
//!
//! fastText represents a word by its own embedding plus the embeddings
//! of its character n-grams. N-grams are extracted from the word with
//! boundary markers (`<word>`), hashed with a variant of FNV-1a and
//! mapped to a fixed number of buckets.

/// Iterator over the character n-grams of a word.
///
/// N-grams are produced in the order in which fastText produces them:
/// by start position, then by increasing length. Single-character
/// n-grams at the start or the end of the word (the boundary markers)
/// are skipped.
pub struct NGrams<'a> {
    word: &'a str,
    boundaries: Vec<usize>,
    min_n: usize,
    max_n: usize,
    start: usize,
    n: usize,
}

impl<'a> NGrams<'a> {
    /// Create a new n-gram iterator.
    ///
    /// The iterator will create n-grams of length *[min_n, max_n]*,
    /// where length is measured in characters.
    pub fn new(word: &'a str, min_n: usize, max_n: usize) -> Self {
        let mut boundaries: Vec<_> = word.char_indices().map(|(idx, _)| idx).collect();
        boundaries.push(word.len());

        NGrams {
            word,
            boundaries,
            min_n,
            max_n,
            start: 0,
            n: 1,
        }
    }

    fn n_chars(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl<'a> Iterator for NGrams<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let n_chars = self.n_chars();

        loop {
            if self.start >= n_chars {
                return None;
            }

            if self.n > self.max_n || self.start + self.n > n_chars {
                self.start += 1;
                self.n = 1;
                continue;
            }

            let n = self.n;
            self.n += 1;

            if n < self.min_n || (n == 1 && (self.start == 0 || self.start + 1 == n_chars)) {
                continue;
            }

            return Some(&self.word[self.boundaries[self.start]..self.boundaries[self.start + n]]);
        }
    }
}

/// fastText-compatible subword indexer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FastTextIndexer {
    // fastText is inconsistent with types when it comes to buckets,
    // the data types are:
    //
    // - buckets: int
    // - hash: uint32_t
    // - bucket: int32_t
    //
    // The number of buckets is validated against i32::MAX when the
    // model configuration is read.
    buckets: u32,
}

impl FastTextIndexer {
    /// Construct a `FastTextIndexer` with `buckets` buckets.
    pub fn new(buckets: u32) -> Self {
        FastTextIndexer { buckets }
    }

    /// Get the number of buckets.
    pub fn buckets(&self) -> usize {
        self.buckets as usize
    }

    /// Map an n-gram to its bucket.
    ///
    /// Returns `None` when the indexer has no buckets.
    pub fn index_ngram(&self, ngram: &str) -> Option<usize> {
        if self.buckets == 0 {
            return None;
        }

        Some((fasttext_hash(ngram) % self.buckets) as usize)
    }
}

/// fastText FNV-1a implementation.
///
/// The fastText implementation of FNV-1a has a bug caused
/// by sign extension on compilers where char is signed:
///
/// https://github.com/facebookresearch/fastText/issues/539
///
/// This implementation 'emulates' the bug for compatibility
/// with pretrained fastText models.
pub fn fasttext_hash(ngram: &str) -> u32 {
    let mut h: u32 = 2_166_136_261;

    for byte in ngram.bytes() {
        // Cast bytes to i8, so that sign-extension is applied when
        // widening to u32.
        h ^= (byte as i8) as u32;
        h = h.wrapping_mul(16_777_619);
    }

    h
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use lazy_static::lazy_static;
    use maplit::hashmap;

    use super::{fasttext_hash, FastTextIndexer, NGrams};

    lazy_static! {
        // Subword indices were verified against fastText output.
        static ref SUBWORD_TESTS_3_6: HashMap<&'static str, Vec<usize>> = hashmap! {
            "<Daniël>" =>
                vec![
                    69886, 84537, 338340, 441697, 448390, 468430, 504093, 573175, 749365, 804851,
                    811506, 991985, 1022467, 1105725, 1249224, 1418443, 1493412, 1880616
                ],
            "<überspringen>" =>
                vec![
                    79599, 119685, 255527, 263610, 352266, 385524, 403356, 421853, 485366, 488156,
                    586161, 619228, 629649, 642367, 716781, 751724, 754367, 771707, 799583, 887882,
                    894109, 904527, 908492, 978563, 991164, 992241, 1142035, 1230973, 1278156,
                    1350653, 1414694, 1513262, 1533308, 1607098, 1607788, 1664269, 1712300,
                    1749574, 1793082, 1891605, 1934955, 1992797
                ],
        };

        // Subword indices were verified against fastText output.
        static ref SUBWORD_TESTS_5_5: HashMap<&'static str, Vec<usize>> = hashmap! {
            "<Daniël>" => vec![441697, 749365, 1105725, 1880616],
            "<überspringen>" =>
                vec![
                    79599, 352266, 385524, 629649, 716781, 978563, 991164, 1230973, 1350653,
                    1992797
                ],
        };
    }

    fn subword_indices(word: &str, min_n: usize, max_n: usize) -> Vec<usize> {
        let indexer = FastTextIndexer::new(2_000_000);
        let mut indices: Vec<_> = NGrams::new(word, min_n, max_n)
            .filter_map(|ngram| indexer.index_ngram(ngram))
            .collect();
        indices.sort_unstable();
        indices
    }

    #[test]
    fn ngrams_follow_fasttext_order() {
        let ngrams: Vec<_> = NGrams::new("<ab>", 1, 3).collect();
        assert_eq!(ngrams, vec!["<a", "<ab", "a", "ab", "ab>", "b", "b>"]);
    }

    #[test]
    fn ngrams_respect_char_boundaries() {
        let ngrams: Vec<_> = NGrams::new("<ö>", 2, 2).collect();
        assert_eq!(ngrams, vec!["<ö", "ö>"]);
    }

    #[test]
    fn no_ngrams_with_zero_max_n() {
        assert_eq!(NGrams::new("<hallo>", 0, 0).count(), 0);
        assert_eq!(NGrams::new("", 1, 3).count(), 0);
    }

    #[test]
    fn subword_indices_3_6() {
        for (word, indices_check) in SUBWORD_TESTS_3_6.iter() {
            assert_eq!(indices_check, &subword_indices(word, 3, 6));
        }
    }

    #[test]
    fn subword_indices_5_5() {
        for (word, indices_check) in SUBWORD_TESTS_5_5.iter() {
            assert_eq!(indices_check, &subword_indices(word, 5, 5));
        }
    }

    #[test]
    fn hash_sign_extends_bytes() {
        // Without sign extension, 'ö' would hash differently from the
        // fastText implementation.
        assert_ne!(fasttext_hash("ö"), {
            let mut h: u32 = 2_166_136_261;
            for byte in "ö".bytes() {
                h ^= u32::from(byte);
                h = h.wrapping_mul(16_777_619);
            }
            h
        });
    }

    #[test]
    fn indexer_without_buckets() {
        assert_eq!(FastTextIndexer::new(0).index_ngram("<ab"), None);
    }
}
