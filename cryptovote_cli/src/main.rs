use clap::{App, Arg, SubCommand};
use env_logger::{Builder, Target};
use log::LevelFilter;

mod command_count;
mod command_keygen_check;
mod config;

use command_count::command_count;
use command_keygen_check::command_keygen_check;

fn main() {
    let matches = App::new("CryptoVote CLI")
        .version("0.1")
        .about("Counts threshold-encrypted STV elections")
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("count")
                .about("Encrypt the ballots of an election file and count them round by round")
                .arg(
                    Arg::with_name("ELECTION")
                        .index(1)
                        .required(true)
                        .help("Election file in JSON format"),
                )
                .arg(
                    Arg::with_name("dump-ballots")
                        .long("dump-ballots")
                        .takes_value(true)
                        .value_name("FILE")
                        .help("Write the final encrypted ballot pool to FILE as JSON"),
                ),
        )
        .subcommand(
            SubCommand::with_name("keygen-check")
                .about("Validate key generation parameters - key size can also be set with CRYPTOVOTE_KEY_BITS")
                .arg(
                    Arg::with_name("bits")
                        .long("bits")
                        .takes_value(true)
                        .help("Size of each safe prime"),
                )
                .arg(
                    Arg::with_name("s")
                        .long("s")
                        .takes_value(true)
                        .help("Damgard-Jurik exponent"),
                )
                .arg(
                    Arg::with_name("threshold")
                        .long("threshold")
                        .takes_value(true)
                        .help("Authorities needed to decrypt"),
                )
                .arg(
                    Arg::with_name("shares")
                        .long("shares")
                        .takes_value(true)
                        .help("Number of authorities"),
                )
                .arg(
                    Arg::with_name("generate")
                        .long("generate")
                        .help("Also generate a key and print its fingerprint"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG, when set, takes precedence over -v
    let mut builder = Builder::new();
    builder.filter(None, level);
    builder.target(Target::Stderr);
    builder.parse_default_env();
    builder.init();

    // Subcommands
    if let Some(matches) = matches.subcommand_matches("count") {
        command_count(matches);
    } else if let Some(matches) = matches.subcommand_matches("keygen-check") {
        command_keygen_check(matches);
    } else {
        eprintln!("cryptovote: no subcommand given, see --help");
        std::process::exit(1);
    }
}

/// Expand `~` and environment variables in a user supplied path
pub fn expand(input: &str) -> String {
    match shellexpand::full(input) {
        Ok(expanded) => expanded.to_string(),
        Err(e) => {
            eprintln!("cryptovote: unable to expand {}: {}", input, e);
            std::process::exit(1);
        }
    }
}
