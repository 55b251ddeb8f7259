use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use ftvec::prelude::*;

const BUCKETS: u32 = 100_000;
const DIMS: u32 = 100;
const N_WORDS: usize = 1000;
const WORD_LENGTH: usize = 10;

fn random_word(rng: &mut impl Rng) -> String {
    String::from_utf8(rng.sample_iter(&Alphanumeric).take(WORD_LENGTH).collect()).unwrap()
}

fn test_model(rng: &mut XorShiftRng) -> (FastText, Vec<String>) {
    let args = Args {
        dim: DIMS,
        bucket: BUCKETS,
        ..Args::default()
    };

    let words: Vec<_> = (0..N_WORDS).map(|_| random_word(rng)).collect();
    let mut dict = Dictionary::new(&args);
    for word in &words {
        dict.add(word);
    }
    dict.threshold(1, 0);

    let rows = dict.nwords() + BUCKETS as usize;
    let input = DenseMatrix::new(Array2::from_shape_fn((rows, DIMS as usize), |_| {
        rng.gen_range(-0.1..0.1)
    }));

    (FastText::new(args, dict, input.into()).unwrap(), words)
}

fn word_vector_benchmark(c: &mut Criterion) {
    let mut rng = XorShiftRng::seed_from_u64(42);
    let (model, words) = test_model(&mut rng);
    let unknown = random_word(&mut rng);

    c.bench_function("word-vector-known", |b| {
        b.iter(|| model.word_vector(black_box(&words[0])).unwrap())
    });

    c.bench_function("word-vector-unknown", |b| {
        b.iter(|| model.word_vector(black_box(&unknown)).unwrap())
    });
}

fn quantized_word_vector_benchmark(c: &mut Criterion) {
    let mut rng = XorShiftRng::seed_from_u64(42);
    let (mut model, words) = test_model(&mut rng);
    model.quantize(50, 8, 5, 1, true).unwrap();

    c.bench_function("word-vector-known-quantized", |b| {
        b.iter(|| model.word_vector(black_box(&words[0])).unwrap())
    });
}

criterion_group!(benches, word_vector_benchmark, quantized_word_vector_benchmark);
criterion_main!(benches);
