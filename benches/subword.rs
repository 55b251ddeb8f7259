use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use ftvec::subword::{FastTextIndexer, NGrams};

const MIN_N: usize = 3;
const MAX_N: usize = 6;
const WORD_LENGTH: usize = 10;

fn subwords(string: &str, min_n: usize, max_n: usize, indexer: &FastTextIndexer) -> usize {
    // Sum the subword indices, to ensure that the benchmark
    // evaluates them.
    NGrams::new(string, min_n, max_n)
        .filter_map(|ngram| indexer.index_ngram(ngram))
        .fold(0, |sum, v| sum.wrapping_add(v))
}

fn ngrams_benchmark(c: &mut Criterion) {
    let rng = thread_rng();
    let string = format!(
        "<{}>",
        String::from_utf8(rng.sample_iter(&Alphanumeric).take(WORD_LENGTH).collect()).unwrap()
    );

    let indexer = FastTextIndexer::new(2_000_000);

    c.bench_function("subwords-len-10-minn-3-maxn-6", move |b| {
        b.iter(|| subwords(&string, black_box(MIN_N), black_box(MAX_N), &indexer))
    });
}

criterion_group!(benches, ngrams_benchmark);
criterion_main!(benches);
