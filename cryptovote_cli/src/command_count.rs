use crate::config::ElectionConfig;
use cryptovote::*;
use indexmap::IndexMap;
use log::info;
use num_bigint::BigUint;
use rand::rngs::OsRng;
use std::collections::BTreeSet;

pub fn command_count(matches: &clap::ArgMatches) {
    let filename = match matches.value_of("ELECTION") {
        Some(filename) => crate::expand(filename),
        None => {
            eprintln!("cryptovote count: election filename required");
            std::process::exit(1);
        }
    };

    let file_bytes = match std::fs::read(&filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("cryptovote count: unable to read {}: {}", filename, e);
            std::process::exit(1);
        }
    };

    let config = ElectionConfig::from_json(&file_bytes).unwrap_or_else(|e| {
        eprintln!("cryptovote count: invalid election {}: {}", filename, e);
        std::process::exit(1);
    });

    let params = config.keygen_params().unwrap_or_else(|e| {
        eprintln!("cryptovote count: {}", e);
        std::process::exit(1);
    });

    let pool = match count(&config, &params) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("cryptovote count: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(output) = matches.value_of("dump-ballots") {
        let output = crate::expand(output);
        let pool: Vec<Ballot> = pool.into_iter().map(Ballot::from).collect();
        let json = serde_json::to_vec_pretty(&pool).unwrap_or_else(|e| {
            eprintln!("cryptovote count: unable to serialize ballots: {}", e);
            std::process::exit(1);
        });
        if let Err(e) = std::fs::write(&output, json) {
            eprintln!("cryptovote count: unable to write {}: {}", output, e);
            std::process::exit(1);
        }
    }
}

/// Run the whole election and return the final ballot pool.
fn count(config: &ElectionConfig, params: &KeygenParams) -> Result<Vec<CandidateOrderBallot>, Error> {
    let mut rng = OsRng;

    info!(
        "generating a {}-of-{} key with {} bit primes",
        params.threshold, params.num_shares, params.bit_length
    );
    let (public_key, shares) = keygen(&mut rng, params)?;
    println!("> Election key {}", hex::encode(public_key.fingerprint()));

    let mut ballots = Vec::with_capacity(config.ballots.len());
    for ballot in &config.ballots {
        ballots.push(CandidateOrderBallot::encrypt(
            &public_key,
            &mut rng,
            &config.candidates,
            &ballot.ranks,
            ballot.weight,
        )?);
    }
    println!("> Encrypted {} ballots", ballots.len());

    if ballots.is_empty() {
        println!("> Nothing to count");
        return Ok(ballots);
    }

    // The first `threshold` authorities take part in every decryption
    let quorum = Quorum::new(&shares[..params.threshold]);

    let mut eliminated = BTreeSet::new();
    let mut round_number = 1;
    loop {
        let round = count_round(&public_key, &quorum, &mut rng, &ballots, &eliminated)?;
        print_round(round_number, &round.totals, &round.exhausted);
        ballots = round.ballots;

        if round.totals.len() <= config.seats {
            let elected: Vec<String> = round.totals.keys().map(|c| c.to_string()).collect();
            println!("> Elected: {}", elected.join(", "));
            return Ok(ballots);
        }

        match lowest(&round.totals) {
            Some(candidate) => {
                println!("> Eliminating candidate {}", candidate);
                eliminated.insert(candidate);
            }
            None => return Ok(ballots),
        }
        round_number += 1;
    }
}

/// Candidate with the lowest total, lowest id among ties
fn lowest(totals: &IndexMap<CandidateId, BigUint>) -> Option<CandidateId> {
    totals
        .iter()
        .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
        .map(|(candidate, _)| *candidate)
}

fn print_round(round_number: usize, totals: &IndexMap<CandidateId, BigUint>, exhausted: &BigUint) {
    println!("Round {}:", round_number);
    for (candidate, total) in totals {
        println!("  candidate {} has {} votes", candidate, total);
    }
    if *exhausted != BigUint::from(0u32) {
        println!("  exhausted: {}", exhausted);
    }
}
