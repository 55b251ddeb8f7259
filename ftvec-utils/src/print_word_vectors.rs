use std::io::{BufWriter, Write};

use clap::{App, Arg, ArgMatches, SubCommand};
use ftvec::prelude::*;
use stdinout::{Input, OrExit, Output};

pub const NAME: &str = "print-word-vectors";

// Argument constants
static MODEL: &str = "MODEL";
static INPUT: &str = "INPUT";
static OUTPUT: &str = "OUTPUT";

struct Config {
    model_filename: String,
    input_filename: Option<String>,
    output_filename: Option<String>,
}

pub fn app() -> App<'static, 'static> {
    SubCommand::with_name(NAME)
        .about("Print the vector of every whitespace-separated token of the input")
        .arg(
            Arg::with_name(MODEL)
                .help("fastText model")
                .index(1)
                .required(true),
        )
        .arg(Arg::with_name(INPUT).help("Input text (default: stdin)").index(2))
        .arg(
            Arg::with_name(OUTPUT)
                .help("Output file (default: stdout)")
                .index(3),
        )
}

fn config_from_matches(matches: &ArgMatches) -> Config {
    let model_filename = matches.value_of(MODEL).unwrap().to_owned();
    let input_filename = matches.value_of(INPUT).map(ToOwned::to_owned);
    let output_filename = matches.value_of(OUTPUT).map(ToOwned::to_owned);

    Config {
        model_filename,
        input_filename,
        output_filename,
    }
}

pub fn run(matches: &ArgMatches) {
    let config = config_from_matches(matches);

    let model = FastText::load_model(&config.model_filename).or_exit("Cannot read model", 1);

    let input = Input::from(config.input_filename);
    let reader = input.buf_read().or_exit("Cannot open input for reading", 1);

    let output = Output::from(config.output_filename);
    let mut writer = BufWriter::new(output.write().or_exit("Cannot open output for writing", 1));

    model
        .write_word_vectors(reader, &mut writer)
        .or_exit("Cannot write word vectors", 1);
    writer.flush().or_exit("Cannot flush output", 1);
}
