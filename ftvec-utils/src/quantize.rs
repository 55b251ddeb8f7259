use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;

use clap::{App, Arg, ArgMatches, SubCommand};
use ftvec::prelude::*;
use ndarray::ArrayView1;
use stdinout::OrExit;

pub const NAME: &str = "quantize";

// Option constants
static N_ATTEMPTS: &str = "n_attempts";
static N_ITERATIONS: &str = "n_iterations";
static N_SUBQUANTIZERS: &str = "n_subquantizers";
static NO_NORMALIZE: &str = "no_normalize";
static QUANTIZER_BITS: &str = "quantizer_bits";

// Argument constants
static INPUT: &str = "INPUT";
static OUTPUT: &str = "OUTPUT";

struct Config {
    input_filename: String,
    output_filename: String,
    n_attempts: usize,
    n_iterations: usize,
    n_subquantizers: Option<usize>,
    normalize: bool,
    quantizer_bits: u32,
}

pub fn app() -> App<'static, 'static> {
    SubCommand::with_name(NAME)
        .about("Quantize the input matrix of a model")
        .arg(
            Arg::with_name(INPUT)
                .help("fastText model")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .help("Quantized model")
                .index(2)
                .required(true),
        )
        .arg(
            Arg::with_name(N_ATTEMPTS)
                .short("a")
                .long("attempts")
                .value_name("N")
                .help("Number of quantization attempts (default: 1)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(QUANTIZER_BITS)
                .short("b")
                .long("bits")
                .value_name("N")
                .help("Number of quantizer bits (default: 8, max: 8)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(N_ITERATIONS)
                .short("i")
                .long("iter")
                .value_name("N")
                .help("Number of iterations (default: 100)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(NO_NORMALIZE)
                .long("no-normalize")
                .help("Do not quantize vector norms separately"),
        )
        .arg(
            Arg::with_name(N_SUBQUANTIZERS)
                .short("s")
                .long("subquantizers")
                .value_name("N")
                .help("Number of subquantizers (default: d/2)")
                .takes_value(true),
        )
}

fn config_from_matches(matches: &ArgMatches) -> Config {
    // Arguments
    let input_filename = matches.value_of(INPUT).unwrap().to_owned();
    let output_filename = matches.value_of(OUTPUT).unwrap().to_owned();

    // Options
    let n_attempts = matches
        .value_of(N_ATTEMPTS)
        .map(|a| a.parse().or_exit("Cannot parse number of attempts", 1))
        .unwrap_or(1);
    let n_iterations = matches
        .value_of(N_ITERATIONS)
        .map(|a| a.parse().or_exit("Cannot parse number of iterations", 1))
        .unwrap_or(100);
    let n_subquantizers = matches
        .value_of(N_SUBQUANTIZERS)
        .map(|a| a.parse().or_exit("Cannot parse number of subquantizers", 1));
    let quantizer_bits = matches
        .value_of(QUANTIZER_BITS)
        .map(|a| {
            a.parse()
                .or_exit("Cannot parse number of quantizer bits", 1)
        })
        .unwrap_or(8);
    if quantizer_bits > 8 {
        eprintln!(
            "Maximum number of quantizer bits: 8, was: {}",
            quantizer_bits
        );
        process::exit(1);
    }

    Config {
        input_filename,
        output_filename,
        n_attempts,
        n_iterations,
        n_subquantizers,
        normalize: !matches.is_present(NO_NORMALIZE),
        quantizer_bits,
    }
}

fn cosine_similarity(u: ArrayView1<f32>, v: ArrayView1<f32>) -> f32 {
    let u_norm = u.dot(&u).sqrt();
    let v_norm = v.dot(&v).sqrt();
    u.dot(&v) / (u_norm * v_norm)
}

fn euclidean_distance(u: ArrayView1<f32>, v: ArrayView1<f32>) -> f32 {
    let dist_vec = &u - &v;
    dist_vec.dot(&dist_vec).sqrt()
}

fn print_loss(storage: &StorageWrap, quantized_storage: &StorageWrap) {
    let mut cosine_similarity_sum = 0f32;
    let mut euclidean_distance_sum = 0f32;

    let rows = storage.shape().0;
    for idx in 0..rows {
        let embedding = storage.embedding(idx);
        let reconstruction = quantized_storage.embedding(idx);
        cosine_similarity_sum += cosine_similarity(embedding.view(), reconstruction.view());
        euclidean_distance_sum += euclidean_distance(embedding.view(), reconstruction.view());
    }

    eprintln!(
        "Average cosine similarity: {}",
        cosine_similarity_sum / rows as f32
    );

    eprintln!(
        "Average euclidean distance: {}",
        euclidean_distance_sum / rows as f32
    );
}

pub fn run(matches: &ArgMatches) {
    let config = config_from_matches(matches);

    let mut model = FastText::load_model(&config.input_filename).or_exit("Cannot read model", 1);
    let dense = model.model().input().clone();

    let n_subquantizers = config.n_subquantizers.unwrap_or(model.dims() / 2);
    model
        .quantize(
            n_subquantizers,
            config.quantizer_bits,
            config.n_iterations,
            config.n_attempts,
            config.normalize,
        )
        .or_exit("Cannot quantize model", 1);

    print_loss(&dense, model.model().input());

    let f = File::create(&config.output_filename).or_exit("Cannot create model file", 1);
    let mut writer = BufWriter::new(f);
    model
        .write_fasttext(&mut writer)
        .or_exit("Cannot write model", 1);
    writer.flush().or_exit("Cannot flush model", 1);
}
