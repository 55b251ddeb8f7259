use clap::{App, Arg, ArgMatches, SubCommand};
use ftvec::prelude::*;
use stdinout::OrExit;

pub const NAME: &str = "export-vectors";

// Option constants
static OUTPUT_VECTORS: &str = "output_vectors";

// Argument constants
static MODEL: &str = "MODEL";
static PREFIX: &str = "PREFIX";

struct Config {
    model_filename: String,
    output_prefix: String,
    output_vectors: bool,
}

pub fn app() -> App<'static, 'static> {
    SubCommand::with_name(NAME)
        .about("Write the vectors of all words to PREFIX.vec")
        .arg(
            Arg::with_name(MODEL)
                .help("fastText model")
                .index(1)
                .required(true),
        )
        .arg(
            Arg::with_name(PREFIX)
                .help("Output prefix")
                .index(2)
                .required(true),
        )
        .arg(
            Arg::with_name(OUTPUT_VECTORS)
                .short("o")
                .long("output")
                .help("Also write the output vectors to PREFIX.output"),
        )
}

fn config_from_matches(matches: &ArgMatches) -> Config {
    let model_filename = matches.value_of(MODEL).unwrap().to_owned();
    let output_prefix = matches.value_of(PREFIX).unwrap().to_owned();

    Config {
        model_filename,
        output_prefix,
        output_vectors: matches.is_present(OUTPUT_VECTORS),
    }
}

pub fn run(matches: &ArgMatches) {
    let config = config_from_matches(matches);

    let mut model = FastText::load_model(&config.model_filename).or_exit("Cannot read model", 1);
    model.set_output(config.output_prefix);

    let path = model.save_vectors().or_exit("Cannot write word vectors", 1);
    eprintln!("Wrote word vectors to {}", path.display());

    if config.output_vectors
        && !model
            .save_output()
            .or_exit("Cannot write output vectors", 1)
    {
        eprintln!("Output vectors of quantized models cannot be written");
    }
}
