use std::io;

use clap::{App, AppSettings, Arg, ArgMatches};
use tracing::Level;

mod export_vectors;

mod metadata;

mod print_word_vectors;

mod quantize;

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
];

// Option constants
static VERBOSE: &str = "verbose";

fn parse_args() -> ArgMatches<'static> {
    App::new("ftvec")
        .settings(DEFAULT_CLAP_SETTINGS)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .about("Word vectors from fastText models")
        .arg(
            Arg::with_name(VERBOSE)
                .short("v")
                .long("verbose")
                .global(true)
                .help("Log model reading and writing"),
        )
        .subcommand(export_vectors::app())
        .subcommand(metadata::app())
        .subcommand(print_word_vectors::app())
        .subcommand(quantize::app())
        .get_matches()
}

/// Log to stderr, debug messages are only shown when `verbose` is set.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn main() {
    let matches = parse_args();

    let (name, sub_matches) = matches.subcommand();
    let verbose = matches.is_present(VERBOSE)
        || sub_matches.map(|m| m.is_present(VERBOSE)).unwrap_or(false);
    init_logging(verbose);

    match (name, sub_matches) {
        (export_vectors::NAME, Some(m)) => export_vectors::run(m),
        (metadata::NAME, Some(m)) => metadata::run(m),
        (print_word_vectors::NAME, Some(m)) => print_word_vectors::run(m),
        (quantize::NAME, Some(m)) => quantize::run(m),
        _ => unreachable!(),
    }
}
