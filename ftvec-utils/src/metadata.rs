use std::io::{BufWriter, Write};

use clap::{App, Arg, ArgMatches, SubCommand};
use ftvec::prelude::*;
use stdinout::{OrExit, Output};
use toml::ser::to_string_pretty;
use toml::Value;

pub const NAME: &str = "metadata";

// Argument constants
static INPUT: &str = "INPUT";
static OUTPUT: &str = "OUTPUT";

struct Config {
    input_filename: String,
    output_filename: Option<String>,
}

pub fn app() -> App<'static, 'static> {
    SubCommand::with_name(NAME)
        .about("Print the hyperparameters and dictionary sizes of a model as TOML")
        .arg(
            Arg::with_name(INPUT)
                .help("fastText model")
                .index(1)
                .required(true),
        )
        .arg(Arg::with_name(OUTPUT).help("Output file").index(2))
}

fn config_from_matches(matches: &ArgMatches) -> Config {
    let input_filename = matches.value_of(INPUT).unwrap().to_owned();
    let output_filename = matches.value_of(OUTPUT).map(ToOwned::to_owned);

    Config {
        input_filename,
        output_filename,
    }
}

fn model_metadata(model: &FastText) -> Result<Value> {
    let mut metadata = model.args().to_toml()?;

    if let Some(table) = metadata.as_table_mut() {
        let dict = model.dictionary();
        table.insert("version".to_owned(), i64::from(model.version()).into());
        table.insert("quantized".to_owned(), model.is_quantized().into());
        table.insert("nwords".to_owned(), (dict.nwords() as i64).into());
        table.insert("nlabels".to_owned(), (dict.nlabels() as i64).into());
        table.insert("ntokens".to_owned(), (dict.ntokens() as i64).into());
        if let Some(size) = dict.prune_idx_size() {
            table.insert("prune_idx_size".to_owned(), (size as i64).into());
        }
    }

    Ok(metadata)
}

pub fn run(matches: &ArgMatches) {
    let config = config_from_matches(matches);

    let model = FastText::load_model(&config.input_filename).or_exit("Cannot read model", 1);
    let metadata = model_metadata(&model).or_exit("Cannot convert metadata to TOML", 1);

    let output = Output::from(config.output_filename);
    let mut writer = BufWriter::new(output.write().or_exit("Cannot open output for writing", 1));
    writer
        .write_all(
            to_string_pretty(&metadata)
                .or_exit("Cannot serialize metadata to TOML", 1)
                .as_bytes(),
        )
        .or_exit("Cannot write metadata", 1);
    writer.flush().or_exit("Cannot flush output", 1);
}
