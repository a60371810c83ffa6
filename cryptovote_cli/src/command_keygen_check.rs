use crate::config::env_key_bits;
use cryptovote::*;
use rand::rngs::OsRng;
use std::str::FromStr;

pub fn command_keygen_check(matches: &clap::ArgMatches) {
    let mut params = KeygenParams::default();

    match env_key_bits() {
        Ok(Some(bits)) => params.bit_length = bits,
        Ok(None) => {}
        Err(e) => {
            eprintln!("cryptovote keygen-check: {}", e);
            std::process::exit(1);
        }
    }

    // Flags win over the environment
    if let Some(bits) = parse_arg(matches, "bits") {
        params.bit_length = bits;
    }
    if let Some(s) = parse_arg(matches, "s") {
        params.s = s;
    }
    if let Some(threshold) = parse_arg(matches, "threshold") {
        params.threshold = threshold;
    }
    if let Some(shares) = parse_arg(matches, "shares") {
        params.num_shares = shares;
    }

    if let Err(e) = params.validate() {
        eprintln!("cryptovote keygen-check: {}", e);
        std::process::exit(1);
    }
    println!(
        "> {}-of-{} key with {} bit primes and s = {} is valid",
        params.threshold, params.num_shares, params.bit_length, params.s
    );

    if matches.is_present("generate") {
        let (public_key, shares) = match keygen(&mut OsRng, &params) {
            Ok(key) => key,
            Err(e) => {
                eprintln!("cryptovote keygen-check: {}", e);
                std::process::exit(1);
            }
        };
        println!("public-key: {}", hex::encode(public_key.fingerprint()));
        println!("plaintext-bits: {}", public_key.n_s().bits());
        println!("shares: {}", shares.len());
    }
}

fn parse_arg<T: FromStr>(matches: &clap::ArgMatches, name: &str) -> Option<T> {
    let value = matches.value_of(name)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            eprintln!("cryptovote keygen-check: invalid value for --{}: {}", name, value);
            std::process::exit(1);
        }
    }
}
